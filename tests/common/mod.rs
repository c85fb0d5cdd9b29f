//! Shared test scaffolding for the integration suite, mirroring the
//! teacher's `tests/integretions/test_utils.rs` split between a small
//! setup helper and tree-construction shorthands.

use std::sync::Arc;

use crabtree::io::ByteLexComparator;
use crabtree::mem::MemPageMemory;
use crabtree::{Tree, TreeConfig};

/// A page size that forces splits after a handful of 8-byte items, so
/// integration tests can exercise multi-level trees without inserting
/// thousands of rows.
pub const SMALL_PAGE: usize = 64 + crabtree::page::HEADER_SIZE;

pub fn new_tree(page_size: usize) -> Tree {
    let mem = MemPageMemory::new(page_size);
    Tree::create("it", mem, Arc::new(ByteLexComparator), 4, 4, TreeConfig::default()).unwrap()
}

pub fn new_tree_with_config(page_size: usize, config: TreeConfig) -> Tree {
    let mem = MemPageMemory::new(page_size);
    Tree::create("it", mem, Arc::new(ByteLexComparator), 4, 4, config).unwrap()
}

pub fn key(k: u32) -> Vec<u8> {
    k.to_be_bytes().to_vec()
}

pub fn row_of(k: u32) -> Vec<u8> {
    k.to_be_bytes().to_vec()
}

pub fn value_of(row: &[u8]) -> u32 {
    u32::from_be_bytes(row[4..8].try_into().unwrap())
}
