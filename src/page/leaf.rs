//! Leaf node `NodeIo`: a dense, sorted array of fixed-size key/value items
//! (spec section 3, "Leaf node"; section 6, page layout).
//!
//! Layout after the common [`super::PageHeader`]:
//! `count` items of `key_size + value_size` bytes each, contiguous,
//! sorted by key.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::io::{binary_search_page, KeyComparator, NodeIo, SearchHit};
use crate::page::{PageHeader, PageId, PageKind, HEADER_SIZE};
use crate::wal::Delta;

pub const LEAF_IO_VERSION: u16 = 1;

/// Leaf IO descriptor. `key_size`/`value_size` are fixed per tree,
/// supplied by the embedder at construction (spec section 3, "Item").
#[derive(Clone)]
pub struct LeafIo {
    pub key_size: usize,
    pub value_size: usize,
}

impl LeafIo {
    pub fn new(key_size: usize, value_size: usize) -> Arc<Self> {
        Arc::new(LeafIo { key_size, value_size })
    }

    fn item_size(&self) -> usize {
        self.key_size + self.value_size
    }

    fn item_off(&self, idx: i32) -> usize {
        HEADER_SIZE + idx as usize * self.item_size()
    }

    pub fn init(&self, addr: &mut [u8], page_id: PageId) {
        let header = PageHeader::new(page_id, PageKind::Leaf, self.version());
        header.encode(addr);
    }
}

impl NodeIo for LeafIo {
    fn kind(&self) -> PageKind {
        PageKind::Leaf
    }

    fn version(&self) -> u16 {
        LEAF_IO_VERSION
    }

    fn max_count(&self, page_size: usize) -> u16 {
        ((page_size - HEADER_SIZE) / self.item_size()) as u16
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
        let off = self.item_off(idx);
        let item_key = &addr[off..off + self.key_size];
        cmp.compare(item_key, key)
    }

    fn lookup_key(&self, addr: &[u8], idx: i32) -> Vec<u8> {
        let off = self.item_off(idx);
        addr[off..off + self.key_size].to_vec()
    }

    fn get_row(&self, addr: &[u8], idx: i32) -> Option<Vec<u8>> {
        let off = self.item_off(idx);
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
        debug_assert!(right_child.is_none(), "leaves carry no child pointers");
        let count = self.count(addr);
        let item_size = self.item_size();
        let from = self.item_off(idx);
        let tail_len = (count as i32 - idx) as usize * item_size;
        if tail_len > 0 {
            addr.copy_within(from..from + tail_len, from + item_size);
        }
        addr[from..from + self.key_size].copy_from_slice(key);
        if let Some(v) = value {
            addr[from + self.key_size..from + item_size].copy_from_slice(v);
        }
        self.set_count(addr, count + 1);

        log::debug!("leaf insert idx={idx} count={}", count + 1);

        if need_wal {
            Some(Delta::Insert {
                idx,
                key_bytes: key.to_vec(),
                right_child: 0,
            })
        } else {
            None
        }
    }

    fn store(&self, addr: &mut [u8], idx: i32, key: &[u8], value: Option<&[u8]>, need_wal: bool) -> Option<Delta> {
        let off = self.item_off(idx);
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
        let total = self.count(addr);
        let item_size = self.item_size();
        let from = self.item_off(idx + count as i32);
        let to = self.item_off(idx);
        let tail_len = (total as i32 - idx - count as i32) as usize * item_size;
        if tail_len > 0 {
            addr.copy_within(from..from + tail_len, to);
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
        let moved = (count - mid) as usize;
        let from = self.item_off(mid as i32);
        forward[HEADER_SIZE..HEADER_SIZE + moved * item_size]
            .copy_from_slice(&back[from..from + moved * item_size]);
        self.set_count(forward, moved as u16);
        self.set_forward(forward, self.forward(back));

        self.set_count(back, mid);
        self.set_forward(back, forward_id);

        self.lookup_key(back, mid as i32 - 1)
    }

    fn split_existing_page(&self, back: &mut [u8], mid: u16) -> Delta {
        // Leaves never need this path: a leaf split is always into a
        // brand-new forward page. Kept for trait symmetry with inner
        // splits, which do re-derive bookkeeping after an ascent.
        self.set_count(back, mid);
        Delta::SplitExistingPage { mid, forward_id: self.forward(back) }
    }

    fn merge(
        &self,
        _parent_io: &dyn NodeIo,
        _parent_addr: &mut [u8],
        _prnt_idx: i32,
        left: &mut [u8],
        right: &[u8],
        _empty_branch: bool,
        page_size: usize,
    ) -> bool {
        let left_count = self.count(left);
        let right_count = self.count(right);
        if (left_count + right_count) as usize > self.max_count(page_size) as usize {
            return false;
        }
        let item_size = self.item_size();
        let left_off = self.item_off(left_count as i32);
        let right_bytes = right_count as usize * item_size;
        left[left_off..left_off + right_bytes]
            .copy_from_slice(&right[HEADER_SIZE..HEADER_SIZE + right_bytes]);
        self.set_count(left, left_count + right_count);
        self.set_forward(left, self.forward(right));
        true
    }

    fn init_new_root(&self, _addr: &mut [u8], _page_id: PageId, _left: PageId, _key: &[u8], _right: PageId) {
        panic!("a leaf can never be a freshly split root; only InnerIo::init_new_root is used");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteLexComparator;

    fn leaf_with(keys: &[u32], page_size: usize) -> (Arc<LeafIo>, Vec<u8>) {
        let io = LeafIo::new(4, 4);
        let mut buf = vec![0u8; page_size];
        io.init(&mut buf, 1);
        for (i, k) in keys.iter().enumerate() {
            io.insert(&mut buf, i as i32, &k.to_be_bytes(), Some(&k.to_be_bytes()), None, false);
        }
        (io, buf)
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let (io, buf) = leaf_with(&[1, 2, 3, 4], 256);
        assert_eq!(io.count(&buf), 4);
        for i in 0..4 {
            assert_eq!(io.lookup_key(&buf, i), (i as u32 + 1).to_be_bytes().to_vec());
        }
    }

    #[test]
    fn compare_matches_comparator() {
        let (io, buf) = leaf_with(&[10, 20, 30], 256);
        let cmp = ByteLexComparator;
        assert_eq!(io.compare(&buf, 1, &20u32.to_be_bytes(), &cmp), Ordering::Equal);
        assert_eq!(io.compare(&buf, 0, &20u32.to_be_bytes(), &cmp), Ordering::Less);
    }

    #[test]
    fn remove_shifts_tail() {
        let (io, mut buf) = leaf_with(&[1, 2, 3], 256);
        io.remove(&mut buf, 1, 1, false);
        assert_eq!(io.count(&buf), 2);
        assert_eq!(io.lookup_key(&buf, 0), 1u32.to_be_bytes().to_vec());
        assert_eq!(io.lookup_key(&buf, 1), 3u32.to_be_bytes().to_vec());
    }

    #[test]
    fn binary_search_finds_existing_key() {
        let (io, buf) = leaf_with(&[1, 2, 3, 4, 5], 256);
        let cmp = ByteLexComparator;
        let key = 3u32.to_be_bytes();
        let hit = binary_search_page(io.count(&buf), |idx| io.compare(&buf, idx, &key, &cmp));
        assert_eq!(hit, SearchHit::Found(2));
    }
}
