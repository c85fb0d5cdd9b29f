//! `invoke`: an atomic read-modify-write against a single key, driven by
//! an embedder-supplied closure (spec section 4.6).
//!
//! The closure sees the current row (or `None`) exactly once per logical
//! attempt and decides what happens next; `Retry`-triggering staleness
//! checks all happen *before* the closure runs, so a retried attempt
//! never double-invokes it for the same logical call. This mirrors the
//! teacher's `BTreeTable::insert_tuple`/`delete_tuple` pair by reusing
//! the exact same pinned-leaf helpers `ops::insert` and `ops::remove`
//! already use for their single-key paths.

use crate::error::TreeResult;
use crate::io::{binary_search_page, SearchHit};
use crate::tree::{Row, Tree};

use super::insert::descend_to_level;
use super::insert::put_into_pinned_leaf;
use super::remove::remove_from_pinned_leaf;
use super::{capture_root, run_with_retries, Loop};

/// What an `invoke` closure decides to do with the row it was shown.
#[derive(Debug, Clone)]
pub enum InvokeAction {
    /// Leave the tree unchanged.
    Noop,
    /// Insert (if absent) or replace (if present) with this row.
    Put(Row),
    /// Remove the key, if present. A no-op if the key was absent.
    Remove,
    /// Replace an existing row in place without altering tree structure.
    /// Only valid when the key is present; treated as `Noop` on a miss.
    InPlace(Row),
}

pub fn invoke(tree: &Tree, key: &[u8], mut closure: impl FnMut(Option<&Row>) -> InvokeAction) -> TreeResult<()> {
    run_with_retries(tree, "invoke", || attempt_invoke(tree, key, &mut closure))
}

fn attempt_invoke(tree: &Tree, key: &[u8], closure: &mut impl FnMut(Option<&Row>) -> InvokeAction) -> TreeResult<Loop<()>> {
    let root = capture_root(tree)?;
    let target = match descend_to_level(tree, root, key, 0)? {
        Some(t) => t,
        None => return Ok(Loop::Retry),
    };
    let mut pin = match super::write_pin(tree, target.page_id)? {
        Some(p) => p,
        None => return Ok(Loop::Retry),
    };
    if pin.io.forward(pin.addr()) != target.expected_fwd {
        pin.release(tree);
        return Ok(Loop::Retry);
    }
    if pin.io.removal_counter(pin.addr()) > root.removal_counter {
        pin.release(tree);
        return Ok(Loop::Retry);
    }

    let count = pin.io.count(pin.addr());
    let hit = binary_search_page(count, |i| pin.io.compare(pin.addr(), i, key, tree.comparator()));
    let current = match hit {
        SearchHit::Found(idx) => pin.io.get_row(pin.addr(), idx),
        SearchHit::NotFound(_) => None,
    };

    let action = closure(current.as_ref());

    match action {
        InvokeAction::Noop => {
            pin.release(tree);
        }
        InvokeAction::Put(row) => {
            put_into_pinned_leaf(tree, pin, key, &row)?;
        }
        InvokeAction::Remove => match hit {
            SearchHit::Found(idx) => {
                remove_from_pinned_leaf(tree, pin, idx, key, count)?;
            }
            SearchHit::NotFound(_) => {
                pin.release(tree);
            }
        },
        InvokeAction::InPlace(row) => match hit {
            SearchHit::Found(idx) => {
                let page_id = pin.page_id();
                let delta = pin.io.store(pin.addr_mut(), idx, key, Some(&row), true);
                pin.release(tree);
                if let Some(d) = delta {
                    tree.log_delta(crate::wal::DeltaRecord { group_id: tree.next_group_id(), page_id, delta: d })?;
                }
            }
            SearchHit::NotFound(_) => {
                pin.release(tree);
            }
        },
    }

    Ok(Loop::Done(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::io::ByteLexComparator;
    use crate::mem::MemPageMemory;
    use std::sync::Arc;

    fn new_tree() -> Tree {
        let mem = MemPageMemory::new(256);
        Tree::create("t", mem, Arc::new(ByteLexComparator), 4, 4, TreeConfig::default()).unwrap()
    }

    #[test]
    fn invoke_put_on_missing_key_inserts() {
        let tree = new_tree();
        tree.invoke(&1u32.to_be_bytes(), |cur| {
            assert!(cur.is_none());
            InvokeAction::Put(5u32.to_be_bytes().to_vec())
        })
        .unwrap();
        let row = tree.find_one(&1u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &5u32.to_be_bytes());
    }

    #[test]
    fn invoke_noop_leaves_tree_untouched() {
        let tree = new_tree();
        tree.put(&1u32.to_be_bytes(), &9u32.to_be_bytes()).unwrap();
        tree.invoke(&1u32.to_be_bytes(), |_cur| InvokeAction::Noop).unwrap();
        let row = tree.find_one(&1u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &9u32.to_be_bytes());
    }

    #[test]
    fn invoke_remove_on_present_key_deletes_it() {
        let tree = new_tree();
        tree.put(&1u32.to_be_bytes(), &9u32.to_be_bytes()).unwrap();
        tree.invoke(&1u32.to_be_bytes(), |cur| {
            assert!(cur.is_some());
            InvokeAction::Remove
        })
        .unwrap();
        assert_eq!(tree.find_one(&1u32.to_be_bytes()).unwrap(), None);
    }

    #[test]
    fn invoke_in_place_replaces_without_changing_key() {
        let tree = new_tree();
        tree.put(&1u32.to_be_bytes(), &9u32.to_be_bytes()).unwrap();
        tree.invoke(&1u32.to_be_bytes(), |_cur| InvokeAction::InPlace(42u32.to_be_bytes().to_vec())).unwrap();
        let row = tree.find_one(&1u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &42u32.to_be_bytes());
    }

    #[test]
    fn invoke_closure_runs_exactly_once() {
        let tree = new_tree();
        tree.put(&1u32.to_be_bytes(), &9u32.to_be_bytes()).unwrap();
        let mut calls = 0;
        tree.invoke(&1u32.to_be_bytes(), |_cur| {
            calls += 1;
            InvokeAction::Noop
        })
        .unwrap();
        assert_eq!(calls, 1);
    }
}
