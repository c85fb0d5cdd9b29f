//! Offline invariant checker (spec section 3's five invariants). Not on
//! the hot path -- meant for tests and an embedder's consistency-check
//! tooling, the way the teacher's `BTreeChecker` walks a whole file to
//! assert page-level and tree-level invariants outside of normal query
//! execution.
//!
//! Every check here read-latches pages one at a time and releases before
//! moving on; it does not hold the tree locked against concurrent
//! writers, so it is meant to run against a quiescent tree (no writers),
//! matching the teacher's checker's own assumption.

use std::collections::HashSet;

use crate::error::{TreeError, TreeResult};
use crate::page::{PageId, NO_PAGE};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationReport {
    /// Number of levels walked, including the leaf level.
    pub levels: i32,
    /// Total pages visited across every level.
    pub pages_checked: u64,
}

/// Walks every level from the root down to the leaves, checking:
/// - the forward-pointer chain at each level terminates (no cycle),
/// - every key within a page is strictly increasing,
/// - the triangle invariant (`forward(left(i)) == right(i)`) at every
///   inner page's routing slot,
/// - every child referenced by an inner page is reachable by walking the
///   forward chain of the level below, and vice versa (level discipline:
///   no page at a level is unreachable from its parent level, and no
///   inner page points at a page outside the child level's forward
///   chain).
pub fn check_tree(tree: &Tree) -> TreeResult<ValidationReport> {
    let meta = tree.read_meta()?;
    let root_level = meta.root_level();

    let mut report = ValidationReport { levels: root_level + 1, pages_checked: 0 };
    // Children referenced by the level just processed (one above the one
    // about to be walked); checked against that level's actual page set
    // once we've walked it.
    let mut expected_from_parent: Option<HashSet<PageId>> = None;

    for level in (0..=root_level).rev() {
        let first = meta
            .first_page_id(level)
            .ok_or_else(|| TreeError::corrupted("meta page missing level entry", [tree.meta_page_id()]))?;

        let mut pages_at_level = HashSet::new();
        let mut referenced_children = HashSet::new();
        let mut page_id = first;
        let mut guard_count = 0u64;
        let max_pages = 10_000_000u64;

        while page_id != NO_PAGE {
            guard_count += 1;
            if guard_count > max_pages {
                return Err(TreeError::corrupted("forward-pointer chain did not terminate (cycle?)", [page_id]));
            }
            if !pages_at_level.insert(page_id) {
                return Err(TreeError::corrupted("forward-pointer chain revisited a page (cycle)", [page_id]));
            }
            report.pages_checked += 1;

            let handle = tree.mem().acquire(page_id)?;
            let addr = handle
                .read_latch()
                .ok_or_else(|| TreeError::corrupted("validate: stale latch mid-walk", [page_id]))?;
            let io = crate::ops::node_io_for(tree, &addr)?;
            let count = io.count(&addr);

            check_sorted_keys(tree, io.as_ref(), &addr, count, page_id)?;

            if level > 0 {
                for i in 0..=count as i32 {
                    referenced_children.insert(crate::ops::child_at(io.as_ref(), &addr, i, count));
                }
                for i in 0..count as i32 {
                    let left = io.left(&addr, i);
                    let right = io.right(&addr, i);
                    let left_fwd = read_forward_of(tree, left)?;
                    if left_fwd != right {
                        handle.read_unlatch(addr);
                        tree.mem().release(handle);
                        return Err(TreeError::corrupted(
                            format!("triangle invariant violated at page {page_id} slot {i}: forward({left})={left_fwd} != right={right}"),
                            [page_id, left, right],
                        ));
                    }
                }
            }

            let forward = io.forward(&addr);
            handle.read_unlatch(addr);
            tree.mem().release(handle);
            page_id = forward;
        }

        if let Some(expected) = &expected_from_parent {
            if &pages_at_level != expected {
                let missing: Vec<PageId> = expected.difference(&pages_at_level).copied().collect();
                let extra: Vec<PageId> = pages_at_level.difference(expected).copied().collect();
                let mut implicated = missing.clone();
                implicated.extend(&extra);
                return Err(TreeError::corrupted(
                    format!("level discipline violated at level {level}: missing={missing:?} extra={extra:?}"),
                    implicated,
                ));
            }
        }

        expected_from_parent = if level > 0 { Some(referenced_children) } else { None };
    }

    Ok(report)
}

fn check_sorted_keys(tree: &Tree, io: &dyn crate::io::NodeIo, addr: &[u8], count: u16, page_id: PageId) -> TreeResult<()> {
    for i in 1..count as i32 {
        let ord = io.compare(addr, i - 1, &io.lookup_key(addr, i), tree.comparator());
        if ord != std::cmp::Ordering::Less {
            return Err(TreeError::corrupted(format!("keys out of order at page {page_id} slot {i}"), [page_id]));
        }
    }
    Ok(())
}

fn read_forward_of(tree: &Tree, page_id: PageId) -> TreeResult<PageId> {
    if page_id == NO_PAGE {
        return Ok(NO_PAGE);
    }
    let handle = tree.mem().acquire(page_id)?;
    let addr = handle
        .read_latch()
        .ok_or_else(|| TreeError::corrupted("validate: stale latch reading neighbor", [page_id]))?;
    let io = crate::ops::node_io_for(tree, &addr)?;
    let forward = io.forward(&addr);
    handle.read_unlatch(addr);
    tree.mem().release(handle);
    Ok(forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::io::ByteLexComparator;
    use crate::mem::MemPageMemory;
    use std::sync::Arc;

    fn new_tree(page_size: usize) -> Tree {
        let mem = MemPageMemory::new(page_size);
        Tree::create("t", mem, Arc::new(ByteLexComparator), 4, 4, TreeConfig::default()).unwrap()
    }

    #[test]
    fn empty_tree_passes_validation() {
        let tree = new_tree(256);
        let report = check_tree(&tree).unwrap();
        assert_eq!(report.levels, 1);
        assert_eq!(report.pages_checked, 1);
    }

    #[test]
    fn tree_with_several_splits_passes_validation() {
        let tree = new_tree(64 + crate::page::HEADER_SIZE);
        for k in 0u32..200 {
            tree.put(&k.to_be_bytes(), &k.to_be_bytes()).unwrap();
        }
        let report = check_tree(&tree).unwrap();
        assert!(report.levels >= 2);
        assert!(report.pages_checked > 1);
    }

    #[test]
    fn tree_after_many_removes_still_passes_validation() {
        let tree = new_tree(64 + crate::page::HEADER_SIZE);
        for k in 0u32..200 {
            tree.put(&k.to_be_bytes(), &k.to_be_bytes()).unwrap();
        }
        for k in 0u32..150 {
            tree.remove(&k.to_be_bytes()).unwrap();
        }
        check_tree(&tree).unwrap();
    }
}
