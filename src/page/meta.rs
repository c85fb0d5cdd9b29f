//! The meta page: root level, per-level leftmost page id, and the inline
//! size hint (spec section 3, "Meta page"; section 4.8; section 6).
//!
//! Layout: `version(u16) root_level(u32) inline_size(u16) flags(u16)
//! level_count(u16)` followed by `level_count` `u64` leftmost-page ids,
//! index 0 being the leaf level.

use crate::page::PageId;

pub const META_VERSION: u16 = 1;
const META_HEADER: usize = 2 + 4 + 2 + 2 + 2;

#[derive(Debug, Clone)]
pub struct MetaPage {
    pub version: u16,
    pub root_level: i32,
    pub inline_size: u16,
    pub flags: u16,
    /// `first_page_id[level]`, level 0 = leaves.
    pub first_page_id: Vec<PageId>,
    pub destroyed: bool,
}

impl MetaPage {
    pub fn new_empty(first_leaf: PageId, inline_size: u16, flags: u16) -> Self {
        MetaPage {
            version: META_VERSION,
            root_level: 0,
            inline_size,
            flags,
            first_page_id: vec![first_leaf],
            destroyed: false,
        }
    }

    pub fn root_level(&self) -> i32 {
        self.root_level
    }

    pub fn first_page_id(&self, level: i32) -> Option<PageId> {
        self.first_page_id.get(level as usize).copied()
    }

    /// Records a brand new root one level above the current one
    /// (`AddRoot` delta, logged by the caller under the meta page's
    /// write latch).
    pub fn add_root(&mut self, new_root: PageId) {
        self.root_level += 1;
        self.first_page_id.push(new_root);
    }

    /// Collapses the root down one level after the old root became a
    /// single-child routing page with nothing left to route (`CutRoot`).
    pub fn cut_root(&mut self) {
        debug_assert!(self.root_level > 0, "cannot cut the leaf-only root");
        self.first_page_id.pop();
        self.root_level -= 1;
    }

    /// Fixes the leftmost pointer for `level` after a leftmost-page split
    /// or merge changed which page is actually leftmost there.
    pub fn set_first_page_id(&mut self, level: i32, page_id: PageId) {
        self.first_page_id[level as usize] = page_id;
    }

    pub fn encode(&self, page_size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; page_size];
        let mut off = 0;
        buf[off..off + 2].copy_from_slice(&self.version.to_le_bytes());
        off += 2;
        buf[off..off + 4].copy_from_slice(&self.root_level.to_le_bytes());
        off += 4;
        buf[off..off + 2].copy_from_slice(&self.inline_size.to_le_bytes());
        off += 2;
        let flags = if self.destroyed { self.flags | 0x8000 } else { self.flags };
        buf[off..off + 2].copy_from_slice(&flags.to_le_bytes());
        off += 2;
        buf[off..off + 2].copy_from_slice(&(self.first_page_id.len() as u16).to_le_bytes());
        off += 2;
        for pid in &self.first_page_id {
            buf[off..off + 8].copy_from_slice(&pid.to_le_bytes());
            off += 8;
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut off = 0;
        let version = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let root_level = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let inline_size = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let raw_flags = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let level_count = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let mut first_page_id = Vec::with_capacity(level_count as usize);
        for _ in 0..level_count {
            first_page_id.push(PageId::from_le_bytes(buf[off..off + 8].try_into().unwrap()));
            off += 8;
        }
        MetaPage {
            version,
            root_level,
            inline_size,
            flags: raw_flags & !0x8000,
            first_page_id,
            destroyed: raw_flags & 0x8000 != 0,
        }
    }

    pub fn byte_size(&self) -> usize {
        META_HEADER + self.first_page_id.len() * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut meta = MetaPage::new_empty(11, 64, 7);
        meta.add_root(22);
        meta.add_root(33);
        let buf = meta.encode(128);
        let back = MetaPage::decode(&buf);
        assert_eq!(back.root_level, 2);
        assert_eq!(back.first_page_id, vec![11, 22, 33]);
        assert_eq!(back.inline_size, 64);
        assert!(!back.destroyed);
    }

    #[test]
    fn destroyed_flag_survives_round_trip() {
        let mut meta = MetaPage::new_empty(1, 0, 0);
        meta.destroyed = true;
        let buf = meta.encode(64);
        let back = MetaPage::decode(&buf);
        assert!(back.destroyed);
    }
}
