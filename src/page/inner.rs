//! Inner node `NodeIo`: `count` routing keys plus `count + 1` child
//! pointers (spec section 3, "Inner node"; section 6, page layout).
//!
//! Layout after the common [`super::PageHeader`]: a contiguous array of
//! `max_count + 1` child page ids (`u64` each), followed by a contiguous
//! array of `max_count` items (`key_size` bytes, plus `value_size` more
//! when `can_get_row_from_inner` lets the inner node carry a full row).
//! Key slot `i`'s left child is `children[i]`, right child `children[i +
//! 1]` -- an inner page with zero keys (a *routing page*) still owns
//! `children[0]`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::io::{KeyComparator, NodeIo};
use crate::page::{PageHeader, PageId, PageKind, HEADER_SIZE};
use crate::wal::Delta;

pub const INNER_IO_VERSION: u16 = 1;
const CHILD_SIZE: usize = 8;

#[derive(Clone)]
pub struct InnerIo {
    pub key_size: usize,
    /// Extra row bytes carried alongside the key when
    /// `can_get_row_from_inner` is enabled for the tree; 0 otherwise.
    pub inline_value_size: usize,
    max_count: u16,
}

impl InnerIo {
    pub fn new(key_size: usize, inline_value_size: usize, page_size: usize) -> Arc<Self> {
        let item_size = key_size + inline_value_size;
        let per_entry = item_size + CHILD_SIZE;
        let available = page_size.saturating_sub(HEADER_SIZE + CHILD_SIZE);
        let max_count = (available / per_entry) as u16;
        Arc::new(InnerIo { key_size, inline_value_size, max_count })
    }

    fn item_size(&self) -> usize {
        self.key_size + self.inline_value_size
    }

    fn children_off(&self) -> usize {
        HEADER_SIZE
    }

    fn keys_off(&self) -> usize {
        HEADER_SIZE + (self.max_count as usize + 1) * CHILD_SIZE
    }

    fn child_off(&self, i: i32) -> usize {
        self.children_off() + i as usize * CHILD_SIZE
    }

    fn key_off(&self, idx: i32) -> usize {
        self.keys_off() + idx as usize * self.item_size()
    }

    pub fn init(&self, addr: &mut [u8], page_id: PageId) {
        let header = PageHeader::new(page_id, PageKind::Inner, self.version());
        header.encode(addr);
    }

    /// Initializes a brand-new routing page (0 keys, 1 child) pointing at
    /// `child`. Used when a structural change needs a single-child
    /// intermediary, e.g. bridging levels during a cut-root.
    pub fn init_routing(&self, addr: &mut [u8], page_id: PageId, child: PageId) {
        self.init(addr, page_id);
        self.set_count(addr, 0);
        let off = self.child_off(0);
        addr[off..off + CHILD_SIZE].copy_from_slice(&child.to_le_bytes());
    }

    fn read_child(&self, addr: &[u8], i: i32) -> PageId {
        let off = self.child_off(i);
        PageId::from_le_bytes(addr[off..off + CHILD_SIZE].try_into().unwrap())
    }

    fn write_child(&self, addr: &mut [u8], i: i32, pid: PageId) {
        let off = self.child_off(i);
        addr[off..off + CHILD_SIZE].copy_from_slice(&pid.to_le_bytes());
    }
}

impl NodeIo for InnerIo {
    fn kind(&self) -> PageKind {
        PageKind::Inner
    }

    fn version(&self) -> u16 {
        INNER_IO_VERSION
    }

    fn max_count(&self, _page_size: usize) -> u16 {
        self.max_count
    }

    fn count(&self, addr: &[u8]) -> u16 {
        PageHeader::decode(addr).count
    }

    fn set_count(&self, addr: &mut [u8], count: u16) {
        let off = 8 + 2 + 2 + 8 + 8;
        addr[off..off + 2].copy_from_slice(&count.to_le_bytes());
    }

    fn forward(&self, addr: &[u8]) -> PageId {
        PageHeader::decode(addr).forward
    }

    fn set_forward(&self, addr: &mut [u8], forward: PageId) {
        let off = 8 + 2 + 2 + 8;
        addr[off..off + 8].copy_from_slice(&forward.to_le_bytes());
    }

    fn removal_counter(&self, addr: &[u8]) -> u64 {
        PageHeader::decode(addr).removal_counter
    }

    fn set_removal_counter(&self, addr: &mut [u8], value: u64) {
        let off = 8 + 2 + 2;
        addr[off..off + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn page_id(&self, addr: &[u8]) -> PageId {
        PageHeader::decode(addr).page_id
    }

    fn compare(&self, addr: &[u8], idx: i32, key: &[u8], cmp: &dyn KeyComparator) -> Ordering {
        let off = self.key_off(idx);
        let item_key = &addr[off..off + self.key_size];
        cmp.compare(item_key, key)
    }

    fn lookup_key(&self, addr: &[u8], idx: i32) -> Vec<u8> {
        let off = self.key_off(idx);
        addr[off..off + self.key_size].to_vec()
    }

    fn get_row(&self, addr: &[u8], idx: i32) -> Option<Vec<u8>> {
        if self.inline_value_size == 0 {
            return None;
        }
        let off = self.key_off(idx);
        Some(addr[off..off + self.item_size()].to_vec())
    }

    fn insert(
        &self,
        addr: &mut [u8],
        idx: i32,
        key: &[u8],
        value: Option<&[u8]>,
        right_child: Option<PageId>,
        need_wal: bool,
    ) -> Option<Delta> {
        let right_child = right_child.expect("inner insert always names the new right child");
        let count = self.count(addr);
        let item_size = self.item_size();

        let key_from = self.key_off(idx);
        let key_tail = (count as i32 - idx) as usize * item_size;
        if key_tail > 0 {
            addr.copy_within(key_from..key_from + key_tail, key_from + item_size);
        }
        addr[key_from..key_from + self.key_size].copy_from_slice(key);
        if let Some(v) = value {
            addr[key_from + self.key_size..key_from + item_size].copy_from_slice(v);
        }

        // children[idx + 1 ..= count] shift right by one; the new right
        // child lands at idx + 1.
        let child_from = self.child_off(idx + 1);
        let child_tail = (count as i32 - idx) as usize * CHILD_SIZE;
        if child_tail > 0 {
            addr.copy_within(child_from..child_from + child_tail, child_from + CHILD_SIZE);
        }
        self.write_child(addr, idx + 1, right_child);

        self.set_count(addr, count + 1);
        log::debug!("inner insert idx={idx} right_child={right_child} count={}", count + 1);

        if need_wal {
            Some(Delta::Insert { idx, key_bytes: key.to_vec(), right_child })
        } else {
            None
        }
    }

    fn store(&self, addr: &mut [u8], idx: i32, key: &[u8], value: Option<&[u8]>, need_wal: bool) -> Option<Delta> {
        let off = self.key_off(idx);
        addr[off..off + self.key_size].copy_from_slice(key);
        if let Some(v) = value {
            addr[off + self.key_size..off + self.item_size()].copy_from_slice(v);
        }
        if need_wal {
            Some(Delta::Replace { idx, key_bytes: key.to_vec() })
        } else {
            None
        }
    }

    fn remove(&self, addr: &mut [u8], idx: i32, count: u16, need_wal: bool) -> Option<Delta> {
        // Removing key slot `idx` also removes its *right* child
        // (`children[idx + 1]`); callers that want to keep the right
        // subtree and drop the left one instead pre-rotate children
        // before calling this (see `ops::remove`'s left-delete path).
        let total = self.count(addr);
        let item_size = self.item_size();

        let key_from = self.key_off(idx + count as i32);
        let key_to = self.key_off(idx);
        let key_tail = (total as i32 - idx - count as i32) as usize * item_size;
        if key_tail > 0 {
            addr.copy_within(key_from..key_from + key_tail, key_to);
        }

        let child_from = self.child_off(idx + 1 + count as i32);
        let child_to = self.child_off(idx + 1);
        let child_tail = (total as i32 - idx - count as i32) as usize * CHILD_SIZE;
        if child_tail > 0 {
            addr.copy_within(child_from..child_from + child_tail, child_to);
        }

        self.set_count(addr, total - count);
        if need_wal {
            Some(Delta::Remove { idx, count })
        } else {
            None
        }
    }

    fn split_forward_page(&self, back: &mut [u8], forward: &mut [u8], mid: u16, forward_id: PageId) -> Vec<u8> {
        let count = self.count(back);
        let item_size = self.item_size();

        // The move-up key is the key at `mid`; it is excluded from both
        // resulting pages and promoted to the parent (spec section 4.4).
        let move_up = self.lookup_key(back, mid as i32);

        let moved_keys = (count - mid - 1) as usize;
        if moved_keys > 0 {
            let from = self.key_off(mid as i32 + 1);
            forward[self.keys_off()..self.keys_off() + moved_keys * item_size]
                .copy_from_slice(&back[from..from + moved_keys * item_size]);
        }

        let moved_children = (count - mid) as usize;
        let cfrom = self.child_off(mid as i32 + 1);
        forward[self.children_off()..self.children_off() + moved_children * CHILD_SIZE]
            .copy_from_slice(&back[cfrom..cfrom + moved_children * CHILD_SIZE]);

        self.set_count(forward, moved_keys as u16);
        self.set_forward(forward, self.forward(back));

        self.set_count(back, mid);
        self.set_forward(back, forward_id);

        move_up
    }

    fn split_existing_page(&self, back: &mut [u8], mid: u16) -> Delta {
        self.set_count(back, mid);
        Delta::SplitExistingPage { mid, forward_id: self.forward(back) }
    }

    fn merge(
        &self,
        parent_io: &dyn NodeIo,
        parent_addr: &mut [u8],
        prnt_idx: i32,
        left: &mut [u8],
        right: &[u8],
        empty_branch: bool,
        page_size: usize,
    ) -> bool {
        let left_count = self.count(left);
        let right_count = self.count(right);

        if empty_branch {
            debug_assert!(
                left_count == 0 || right_count == 0,
                "empty-branch merge requires one side to be truly empty (spec section 9)"
            );
        }

        // The separator key demoted from the parent joins the two key
        // arrays: left has `left_count` keys + 1 demoted key + right's
        // `right_count` keys.
        let combined = left_count as usize + 1 + right_count as usize;
        if combined > self.max_count(page_size) as usize {
            return false;
        }
        let item_size = self.item_size();

        let demoted_key = parent_io.lookup_key(parent_addr, prnt_idx);
        let demoted_off = self.key_off(left_count as i32);
        left[demoted_off..demoted_off + self.key_size].copy_from_slice(&demoted_key);

        if right_count > 0 {
            let right_keys_from = self.keys_off();
            let right_keys_len = right_count as usize * item_size;
            let left_keys_to = self.key_off(left_count as i32 + 1);
            left[left_keys_to..left_keys_to + right_keys_len]
                .copy_from_slice(&right[right_keys_from..right_keys_from + right_keys_len]);
        }

        let right_children_len = (right_count as usize + 1) * CHILD_SIZE;
        let left_children_to = self.child_off(left_count as i32 + 1);
        left[left_children_to..left_children_to + right_children_len]
            .copy_from_slice(&right[self.children_off()..self.children_off() + right_children_len]);

        self.set_count(left, combined as u16);
        self.set_forward(left, self.forward(right));
        true
    }

    fn init_new_root(&self, addr: &mut [u8], page_id: PageId, left: PageId, key: &[u8], right: PageId) {
        self.init(addr, page_id);
        self.set_count(addr, 1);
        self.write_child(addr, 0, left);
        self.write_child(addr, 1, right);
        let off = self.key_off(0);
        addr[off..off + self.key_size].copy_from_slice(key);
    }

    fn left(&self, addr: &[u8], i: i32) -> PageId {
        self.read_child(addr, i)
    }

    fn right(&self, addr: &[u8], i: i32) -> PageId {
        self.read_child(addr, i + 1)
    }

    fn set_left(&self, addr: &mut [u8], i: i32, pid: PageId) {
        self.write_child(addr, i, pid);
    }

    fn set_right(&self, addr: &mut [u8], i: i32, pid: PageId) {
        self.write_child(addr, i + 1, pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_new_root_wires_single_entry() {
        let io = InnerIo::new(4, 0, 256);
        let mut buf = vec![0u8; 256];
        io.init_new_root(&mut buf, 7, 1, &3u32.to_be_bytes(), 2);
        assert_eq!(io.count(&buf), 1);
        assert_eq!(io.left(&buf, 0), 1);
        assert_eq!(io.right(&buf, 0), 2);
        assert_eq!(io.lookup_key(&buf, 0), 3u32.to_be_bytes().to_vec());
    }

    #[test]
    fn insert_shifts_keys_and_children() {
        let io = InnerIo::new(4, 0, 256);
        let mut buf = vec![0u8; 256];
        io.init_routing(&mut buf, 1, 100);
        io.insert(&mut buf, 0, &5u32.to_be_bytes(), None, Some(101), false);
        io.insert(&mut buf, 1, &10u32.to_be_bytes(), None, Some(102), false);
        assert_eq!(io.count(&buf), 2);
        assert_eq!(io.left(&buf, 0), 100);
        assert_eq!(io.right(&buf, 0), 101);
        assert_eq!(io.left(&buf, 1), 101);
        assert_eq!(io.right(&buf, 1), 102);
    }
}
