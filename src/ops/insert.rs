//! Insert, including split and root growth (spec section 4.4).
//!
//! `put` descends under a single write latch to the target leaf, inserts
//! or overwrites in place when there's room, and otherwise splits the
//! leaf and ascends to wire the new routing key into the parent. The
//! descent-and-leaf-mutation is the operation's single retried attempt
//! (`run_with_retries`); once the leaf mutation has committed, ascending
//! to place the routing key runs its own smaller, separately bounded
//! retry loop (`find_parent_write_pin`) so a transient contention failure
//! during ascent can never cause the already-committed leaf insert to be
//! redone.

use crate::error::{TreeError, TreeResult};
use crate::io::{binary_search_page, SearchHit};
use crate::page::{PageId, NO_PAGE};
use crate::tree::{Row, Tree};
use crate::wal::{Delta, DeltaRecord};

use super::{capture_root, child_at, expected_child_forward, landing_index, read_pin, run_with_retries, Loop, RootCapture, WritePin};

pub fn put(tree: &Tree, key: &[u8], row: &[u8]) -> TreeResult<Option<Row>> {
    run_with_retries(tree, "put", || attempt_put(tree, key, row))
}

fn attempt_put(tree: &Tree, key: &[u8], row: &[u8]) -> TreeResult<Loop<Option<Row>>> {
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

    insert_new_into_pinned_leaf(tree, pin, key, row)?;
    Ok(Loop::Done(None))
}

/// Inserts `key`/`row` into a leaf already write-latched and verified
/// valid by the caller, rejecting an existing key with `DuplicateKey`
/// (spec section 4.4: "Binary-search. If key exists, fail with
/// DuplicateKey"). Handles both the in-place insert case and, when the
/// leaf is full, the split-and-ascend case -- by the time this returns,
/// every structural change it started has fully completed.
///
/// This is the plain `put()` entry point's helper; `invoke`'s `Put`
/// action wants upsert semantics instead and uses
/// [`put_into_pinned_leaf`] below.
fn insert_new_into_pinned_leaf(tree: &Tree, mut pin: WritePin, key: &[u8], row: &[u8]) -> TreeResult<()> {
    let count = pin.io.count(pin.addr());
    let hit = binary_search_page(count, |i| pin.io.compare(pin.addr(), i, key, tree.comparator()));

    match hit {
        SearchHit::Found(_) => {
            pin.release(tree);
            Err(TreeError::DuplicateKey)
        }
        SearchHit::NotFound(idx) => {
            let max_count = pin.io.max_count(tree.page_size());
            if count < max_count {
                let page_id = pin.page_id();
                let delta = pin.io.insert(pin.addr_mut(), idx, key, Some(row), None, true);
                pin.release(tree);
                if let Some(d) = delta {
                    tree.log_delta(DeltaRecord { group_id: tree.next_group_id(), page_id, delta: d })?;
                }
                Ok(())
            } else {
                split_leaf_and_ascend(tree, pin, idx, key, row)?;
                Ok(())
            }
        }
    }
}

/// Upserts `key`/`row` into a leaf already write-latched and verified
/// valid by the caller: replaces in place if the key is present, inserts
/// (splitting if full) otherwise. Used only by [`super::invoke`]'s `Put`
/// action (spec section 4.6), whose closure-driven upsert is a distinct
/// contract from `put()`'s reject-on-duplicate (spec section 4.4).
pub(crate) fn put_into_pinned_leaf(tree: &Tree, mut pin: WritePin, key: &[u8], row: &[u8]) -> TreeResult<Option<Row>> {
    let count = pin.io.count(pin.addr());
    let hit = binary_search_page(count, |i| pin.io.compare(pin.addr(), i, key, tree.comparator()));

    match hit {
        SearchHit::Found(idx) => {
            let old = pin.io.get_row(pin.addr(), idx);
            let page_id = pin.page_id();
            let delta = pin.io.store(pin.addr_mut(), idx, key, Some(row), true);
            pin.release(tree);
            if let Some(d) = delta {
                tree.log_delta(DeltaRecord { group_id: tree.next_group_id(), page_id, delta: d })?;
            }
            Ok(old)
        }
        SearchHit::NotFound(idx) => {
            let max_count = pin.io.max_count(tree.page_size());
            if count < max_count {
                let page_id = pin.page_id();
                let delta = pin.io.insert(pin.addr_mut(), idx, key, Some(row), None, true);
                pin.release(tree);
                if let Some(d) = delta {
                    tree.log_delta(DeltaRecord { group_id: tree.next_group_id(), page_id, delta: d })?;
                }
                Ok(None)
            } else {
                split_leaf_and_ascend(tree, pin, idx, key, row)?;
                Ok(None)
            }
        }
    }
}

/// A descent target anywhere up to the root: the page reached at `level`,
/// and its expected forward pointer at the moment it was chosen (spec
/// section 4.3 step 6). `level == root.root_level` returns the root
/// itself, still passing it through the same forward check -- a nonzero
/// forward pointer there means a concurrent root split raced us and we
/// should restart.
pub(super) struct LevelTarget {
    pub page_id: PageId,
    pub expected_fwd: PageId,
}

pub(super) fn descend_to_level(tree: &Tree, root: RootCapture, key: &[u8], target_level: i32) -> TreeResult<Option<LevelTarget>> {
    let mut page_id = root.root_id;
    let mut level = root.root_level;
    let mut expected_fwd = NO_PAGE;

    loop {
        let pin = match read_pin(tree, page_id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        if pin.io.forward(pin.addr()) != expected_fwd {
            pin.release(tree.mem());
            return Ok(None);
        }
        if level == target_level {
            let pid = pin.page_id();
            pin.release(tree.mem());
            return Ok(Some(LevelTarget { page_id: pid, expected_fwd }));
        }

        let count = pin.io.count(pin.addr());
        let hit = binary_search_page(count, |i| pin.io.compare(pin.addr(), i, key, tree.comparator()));
        let idx = landing_index(hit);
        let child = child_at(pin.io.as_ref(), pin.addr(), idx, count);
        let child_fwd = match expected_child_forward(tree, pin.io.as_ref(), pin.addr(), idx, count)? {
            Some(f) => f,
            None => {
                pin.release(tree.mem());
                return Ok(None);
            }
        };
        pin.release(tree.mem());
        page_id = child;
        level -= 1;
        expected_fwd = child_fwd;
    }
}

/// Chooses the split point for a page currently holding `count` items
/// that an item landing at `insertion_idx` is about to overflow (spec
/// section 4.4): half-and-half normally, biased 85/15 toward the back
/// page in sequential-write mode, bumped by one when the new item would
/// land in the forward page so the two resulting pages end up balanced.
pub(super) fn split_midpoint(tree: &Tree, count: u16, insertion_idx: i32) -> u16 {
    let mut mid = if tree.sequential_write_enabled() {
        ((count as f64) * 0.85) as u16
    } else {
        count >> 1
    };
    if mid == 0 && count > 1 {
        mid = 1;
    }
    if insertion_idx as u16 >= mid && mid < count {
        mid += 1;
    }
    mid
}

fn split_leaf_and_ascend(tree: &Tree, mut back: WritePin, idx: i32, key: &[u8], row: &[u8]) -> TreeResult<()> {
    let count = back.io.count(back.addr());
    let mid = split_midpoint(tree, count, idx);

    let forward_id = tree.allocate_page()?;
    let fwd_handle = tree.mem().acquire(forward_id)?;
    let mut fwd_guard = fwd_handle.write_latch().expect("freshly allocated page cannot be stale");
    tree.leaf_io().init(&mut fwd_guard, forward_id);

    let provisional_move_up = back.io.split_forward_page(back.addr_mut(), &mut fwd_guard, mid, forward_id);

    let move_up = if idx <= mid as i32 {
        tree.leaf_io().insert(back.addr_mut(), idx, key, Some(row), None, false);
        let new_back_count = back.io.count(back.addr());
        back.io.lookup_key(back.addr(), new_back_count as i32 - 1)
    } else {
        tree.leaf_io().insert(&mut fwd_guard, idx - mid as i32, key, Some(row), None, false);
        provisional_move_up
    };

    fwd_handle.write_unlatch(fwd_guard, tree.wal_policy());
    tree.mem().release(fwd_handle);

    let back_id = back.page_id();
    tree.log_delta(DeltaRecord {
        group_id: tree.next_group_id(),
        page_id: back_id,
        delta: Delta::SplitExistingPage { mid, forward_id },
    })?;
    back.release(tree);

    ascend(tree, 1, back_id, move_up, forward_id)
}

/// Propagates a move-up key from a just-split child at `level - 1`
/// upward, splitting ancestors as needed and growing the root when the
/// ascent runs off the top (spec section 4.4, "ascend"). Bounded
/// separately from the leaf mutation that produced the first move-up
/// key: this never retries that mutation, only the placement of the
/// routing entry.
fn ascend(tree: &Tree, mut level: i32, mut left_id: PageId, mut promote_key: Vec<u8>, mut right_id: PageId) -> TreeResult<()> {
    loop {
        let root_level = tree.root_level()?;
        if level > root_level {
            install_new_root(tree, left_id, &promote_key, right_id)?;
            return Ok(());
        }

        let mut parent = find_parent_write_pin(tree, level, left_id, &promote_key)?;
        let count = parent.io.count(parent.addr());
        let max_count = parent.io.max_count(tree.page_size());
        let idx = landing_index(binary_search_page(count, |i| {
            parent.io.compare(parent.addr(), i, &promote_key, tree.comparator())
        }));

        if count < max_count {
            let page_id = parent.page_id();
            let delta = parent.io.insert(parent.addr_mut(), idx, &promote_key, None, Some(right_id), true);
            parent.release(tree);
            if let Some(d) = delta {
                tree.log_delta(DeltaRecord { group_id: tree.next_group_id(), page_id, delta: d })?;
            }
            return Ok(());
        }

        let (new_move_up, forward_id) = split_inner_and_insert(tree, &mut parent, idx, &promote_key, right_id)?;
        let parent_id = parent.page_id();
        parent.release(tree);

        level += 1;
        left_id = parent_id;
        promote_key = new_move_up;
        right_id = forward_id;
    }
}

fn split_inner_and_insert(
    tree: &Tree,
    parent: &mut WritePin,
    idx: i32,
    promote_key: &[u8],
    right_child: PageId,
) -> TreeResult<(Vec<u8>, PageId)> {
    let count = parent.io.count(parent.addr());
    let mid = split_midpoint(tree, count, idx);

    let forward_id = tree.allocate_page()?;
    let fwd_handle = tree.mem().acquire(forward_id)?;
    let mut fwd_guard = fwd_handle.write_latch().expect("freshly allocated page cannot be stale");
    tree.inner_io().init(&mut fwd_guard, forward_id);

    let move_up = parent.io.split_forward_page(parent.addr_mut(), &mut fwd_guard, mid, forward_id);

    if idx <= mid as i32 {
        parent.io.insert(parent.addr_mut(), idx, promote_key, None, Some(right_child), false);
    } else {
        tree.inner_io().insert(&mut fwd_guard, idx - mid as i32 - 1, promote_key, None, Some(right_child), false);
    }

    fwd_handle.write_unlatch(fwd_guard, tree.wal_policy());
    tree.mem().release(fwd_handle);

    tree.log_delta(DeltaRecord {
        group_id: tree.next_group_id(),
        page_id: parent.page_id(),
        delta: Delta::SplitExistingPage { mid, forward_id },
    })?;

    Ok((move_up, forward_id))
}

/// Locates and write-latches the inner page at `level` whose child
/// pointer at the landing index for `key` is `child_id`, retrying the
/// whole find (from the meta page) on any staleness -- a concurrent
/// split elsewhere in the ancestor chain, or the candidate page no
/// longer pointing at `child_id` because it was itself split out from
/// under us.
pub(super) fn find_parent_write_pin(tree: &Tree, level: i32, child_id: PageId, key: &[u8]) -> TreeResult<WritePin> {
    run_with_retries(tree, "put-ascend", || {
        let root = capture_root(tree)?;
        if level > root.root_level {
            // The root grew out from under this ascent; the caller's
            // outer loop re-checks `root_level` on its next iteration.
            return Ok(Loop::Retry);
        }
        let target = match descend_to_level(tree, root, key, level)? {
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
        let count = pin.io.count(pin.addr());
        let idx = landing_index(binary_search_page(count, |i| pin.io.compare(pin.addr(), i, key, tree.comparator())));
        let found_child = child_at(pin.io.as_ref(), pin.addr(), idx, count);
        if found_child != child_id {
            pin.release(tree);
            return Ok(Loop::Retry);
        }
        Ok(Loop::Done(pin))
    })
}

fn install_new_root(tree: &Tree, left_id: PageId, key: &[u8], right_id: PageId) -> TreeResult<()> {
    let new_root_id = tree.allocate_page()?;
    let handle = tree.mem().acquire(new_root_id)?;
    let mut addr = handle.write_latch().expect("freshly allocated page cannot be stale");
    tree.inner_io().init_new_root(&mut addr, new_root_id, left_id, key, right_id);
    handle.write_unlatch(addr, tree.wal_policy());
    tree.mem().release(handle);

    tree.log_delta(DeltaRecord {
        group_id: tree.next_group_id(),
        page_id: new_root_id,
        delta: Delta::NewRootInit { root_id: new_root_id, left_child: left_id, key_bytes: key.to_vec(), right_child: right_id },
    })?;

    tree.mutate_meta(|m| m.add_root(new_root_id), Delta::MetaAddRoot { root_id: new_root_id })
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
    fn put_then_find_round_trips() {
        let tree = new_tree(256);
        assert_eq!(tree.put(&1u32.to_be_bytes(), &10u32.to_be_bytes()).unwrap(), None);
        let row = tree.find_one(&1u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &10u32.to_be_bytes());
    }

    #[test]
    fn put_on_existing_key_is_rejected_and_leaves_the_row_untouched() {
        let tree = new_tree(256);
        tree.put(&1u32.to_be_bytes(), &10u32.to_be_bytes()).unwrap();
        let err = tree.put(&1u32.to_be_bytes(), &20u32.to_be_bytes());
        assert!(matches!(err, Err(crate::error::TreeError::DuplicateKey)));
        let row = tree.find_one(&1u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &10u32.to_be_bytes());
    }

    /// A small page (room for 4 leaf items of an 8-byte item each) forces
    /// a split on the 5th insert, matching spec section 8's scenario 2.
    #[test]
    fn fifth_insert_splits_the_root_leaf() {
        let tree = new_tree(32 + crate::page::HEADER_SIZE);
        for k in 1u32..=4 {
            tree.put(&k.to_be_bytes(), &k.to_be_bytes()).unwrap();
        }
        assert_eq!(tree.root_level().unwrap(), 0);
        tree.put(&5u32.to_be_bytes(), &5u32.to_be_bytes()).unwrap();
        assert_eq!(tree.root_level().unwrap(), 1);
        for k in 1u32..=5 {
            let row = tree.find_one(&k.to_be_bytes()).unwrap().unwrap();
            assert_eq!(&row[4..8], &k.to_be_bytes());
        }
    }

    #[test]
    fn many_inserts_keep_every_key_findable() {
        let tree = new_tree(64 + crate::page::HEADER_SIZE);
        for k in 0u32..200 {
            tree.put(&k.to_be_bytes(), &(k * 2).to_be_bytes()).unwrap();
        }
        for k in 0u32..200 {
            let row = tree.find_one(&k.to_be_bytes()).unwrap().unwrap();
            assert_eq!(&row[4..8], &(k * 2).to_be_bytes());
        }
        assert_eq!(tree.find_one(&200u32.to_be_bytes()).unwrap(), None);
    }
}
