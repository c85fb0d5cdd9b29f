//! Range cursor (spec section 4.7). A cursor holds no latches between
//! `next()` calls: each call pins exactly the one leaf it needs, reads
//! whatever rows it can from the current position, and releases before
//! returning. This mirrors the teacher's `BTreeTableIterator`, which also
//! re-fetches its current page through the buffer pool rather than
//! pinning it for the iterator's whole lifetime.

use crate::error::TreeResult;
use crate::io::{binary_search_page, SearchHit};
use crate::page::{PageId, NO_PAGE};
use crate::tree::{Key, Row, Tree};

use super::insert::descend_to_level;
use super::search::{descend_apply, Seek};
use super::{capture_root, read_pin, run_with_retries, Loop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Unbounded,
    Inclusive,
    Exclusive,
}

/// A forward-only iterator over `[lower, upper]` (spec section 4.7).
/// `lower`/`upper` of `None` mean unbounded on that side.
pub struct Cursor {
    lower: Option<Key>,
    upper: Option<Key>,
    low_bound: Bound,
    up_bound: Bound,
    /// The leaf + offset to resume from on the next `next()` call, or
    /// `None` once the scan is freshly opened or exhausted and needs a
    /// fresh root descent.
    position: Option<(PageId, i32)>,
    last_key: Option<Key>,
    exhausted: bool,
}

pub fn open(tree: &Tree, lower: Option<&[u8]>, upper: Option<&[u8]>, low_incl: bool, up_incl: bool) -> TreeResult<Cursor> {
    let _ = tree;
    Ok(Cursor {
        lower: lower.map(|k| k.to_vec()),
        upper: upper.map(|k| k.to_vec()),
        low_bound: if lower.is_none() {
            Bound::Unbounded
        } else if low_incl {
            Bound::Inclusive
        } else {
            Bound::Exclusive
        },
        up_bound: if upper.is_none() {
            Bound::Unbounded
        } else if up_incl {
            Bound::Inclusive
        } else {
            Bound::Exclusive
        },
        position: None,
        last_key: None,
        exhausted: false,
    })
}

impl Cursor {
    /// Returns the next row in range, or `None` once the scan has
    /// exhausted `upper` (spec section 4.7's "end of range" condition).
    /// Re-seeks from the root whenever the page it expected to resume
    /// from was concurrently recycled (section 4.1's stale-latch
    /// sentinel) -- the re-seek lands just past `last_key`, so no row is
    /// ever repeated.
    pub fn next(&mut self, tree: &Tree) -> TreeResult<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }
        if tree.is_destroyed() {
            return Err(crate::error::TreeError::Destroyed);
        }

        loop {
            let fetched = match self.position {
                Some((page_id, idx)) => self.read_from_position(tree, page_id, idx)?,
                None => self.locate_and_fill(tree)?,
            };

            match fetched {
                FetchOutcome::Row { row, key, next_position } => {
                    self.last_key = Some(key);
                    self.position = next_position;
                    return Ok(Some(row));
                }
                FetchOutcome::End => {
                    self.exhausted = true;
                    return Ok(None);
                }
                FetchOutcome::Stale => {
                    self.position = None;
                    continue;
                }
            }
        }
    }

    fn past_upper(&self, tree: &Tree, key: &[u8]) -> bool {
        match (&self.upper, self.up_bound) {
            (None, _) => false,
            (Some(u), Bound::Inclusive) => tree.comparator().compare(key, u) == std::cmp::Ordering::Greater,
            (Some(u), Bound::Exclusive) => tree.comparator().compare(key, u) != std::cmp::Ordering::Less,
            (_, Bound::Unbounded) => false,
        }
    }

    /// Reads the next qualifying row starting at `(page_id, idx)`,
    /// following forward pointers across empty remainders. `idx ==
    /// NO_PAGE as page_id` signals end of chain (handled by caller
    /// falling through to `FetchOutcome::End`).
    fn read_from_position(&self, tree: &Tree, mut page_id: PageId, mut idx: i32) -> TreeResult<FetchOutcome> {
        loop {
            if page_id == NO_PAGE {
                return Ok(FetchOutcome::End);
            }
            let pin = match read_pin(tree, page_id)? {
                Some(p) => p,
                None => return Ok(FetchOutcome::Stale),
            };
            let count = pin.io.count(pin.addr());
            if idx >= count as i32 {
                let forward = pin.io.forward(pin.addr());
                pin.release(tree.mem());
                page_id = forward;
                idx = 0;
                continue;
            }
            let key = pin.io.lookup_key(pin.addr(), idx);
            if self.past_upper(tree, &key) {
                pin.release(tree.mem());
                return Ok(FetchOutcome::End);
            }
            let row = pin.io.get_row(pin.addr(), idx).expect("leaf item always has a row");
            let forward = pin.io.forward(pin.addr());
            pin.release(tree.mem());

            let next_position = if idx + 1 < count as i32 {
                Some((page_id, idx + 1))
            } else if forward != NO_PAGE {
                Some((forward, 0))
            } else {
                None
            };
            return Ok(FetchOutcome::Row { row, key, next_position });
        }
    }

    /// Descends from the root to locate the first qualifying item: by
    /// `lower` on a fresh open, or by `last_key` (exclusive) on a re-seek
    /// after a stale position (spec section 4.7, "reopen by key").
    fn locate_and_fill(&self, tree: &Tree) -> TreeResult<FetchOutcome> {
        run_with_retries(tree, "cursor-seek", || self.attempt_locate(tree))
    }

    fn attempt_locate(&self, tree: &Tree) -> TreeResult<Loop<FetchOutcome>> {
        let root = capture_root(tree)?;

        if self.last_key.is_some() {
            let key = self.last_key.clone().unwrap();
            let target = match descend_to_level(tree, root, &key, 0)? {
                Some(t) => t,
                None => return Ok(Loop::Retry),
            };
            let pin = match read_pin(tree, target.page_id)? {
                Some(p) => p,
                None => return Ok(Loop::Retry),
            };
            if pin.io.forward(pin.addr()) != target.expected_fwd {
                pin.release(tree.mem());
                return Ok(Loop::Retry);
            }
            let count = pin.io.count(pin.addr());
            let hit = binary_search_page(count, |i| pin.io.compare(pin.addr(), i, &key, tree.comparator()));
            let idx = match hit {
                SearchHit::Found(i) => i + 1,
                SearchHit::NotFound(_) => hit.insertion_point(),
            };
            pin.release(tree.mem());
            return match self.read_from_position(tree, target.page_id, idx)? {
                FetchOutcome::Stale => Ok(Loop::Retry),
                other => Ok(Loop::Done(other)),
            };
        }

        let seek = match self.lower.as_deref() {
            Some(k) => Seek::Key(k),
            None => Seek::First,
        };
        let outcome = descend_apply(tree, root, &seek, |_tree, pin, hit| {
            let count = pin.io.count(pin.addr());
            let start_idx = match hit {
                SearchHit::Found(idx) if self.low_bound == Bound::Exclusive => idx + 1,
                SearchHit::Found(idx) => idx,
                SearchHit::NotFound(_) => hit.insertion_point(),
            };
            Ok((pin.page_id(), start_idx, count))
        })?;

        match outcome {
            None => Ok(Loop::Retry),
            Some((page_id, idx, count)) => {
                if idx >= count as i32 {
                    let pin = match read_pin(tree, page_id)? {
                        Some(p) => p,
                        None => return Ok(Loop::Retry),
                    };
                    let forward = pin.io.forward(pin.addr());
                    pin.release(tree.mem());
                    match self.read_from_position(tree, forward, 0)? {
                        FetchOutcome::Stale => Ok(Loop::Retry),
                        other => Ok(Loop::Done(other)),
                    }
                } else {
                    match self.read_from_position(tree, page_id, idx)? {
                        FetchOutcome::Stale => Ok(Loop::Retry),
                        other => Ok(Loop::Done(other)),
                    }
                }
            }
        }
    }
}

enum FetchOutcome {
    Row { row: Row, key: Key, next_position: Option<(PageId, i32)> },
    End,
    Stale,
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
    fn full_scan_on_empty_tree_yields_nothing() {
        let tree = new_tree(256);
        let mut cursor = tree.find(None, None, true, true).unwrap();
        assert_eq!(cursor.next(&tree).unwrap(), None);
    }

    #[test]
    fn full_scan_visits_every_key_in_order() {
        let tree = new_tree(64 + crate::page::HEADER_SIZE);
        for k in (0u32..40).rev() {
            tree.put(&k.to_be_bytes(), &k.to_be_bytes()).unwrap();
        }
        let mut cursor = tree.find(None, None, true, true).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = cursor.next(&tree).unwrap() {
            seen.push(u32::from_be_bytes(row[4..8].try_into().unwrap()));
        }
        let expected: Vec<u32> = (0..40).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn bounded_scan_respects_inclusive_exclusive_edges() {
        let tree = new_tree(64 + crate::page::HEADER_SIZE);
        for k in 0u32..20 {
            tree.put(&k.to_be_bytes(), &k.to_be_bytes()).unwrap();
        }
        let mut cursor = tree.find(Some(&5u32.to_be_bytes()), Some(&10u32.to_be_bytes()), false, true).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = cursor.next(&tree).unwrap() {
            seen.push(u32::from_be_bytes(row[4..8].try_into().unwrap()));
        }
        assert_eq!(seen, vec![6, 7, 8, 9, 10]);
    }
}
