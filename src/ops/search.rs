//! Read-only descent: `find`, `find_one`, `find_first`, `find_last`
//! (spec section 4.3). Also the descent primitive `descend_apply`, shared
//! with [`super::cursor`] for locating the first page of a range scan.

use crate::error::TreeResult;
use crate::io::{binary_search_page, SearchHit};
use crate::page::NO_PAGE;
use crate::tree::{Row, Tree};

use super::{capture_root, child_at, expected_child_forward, landing_index, read_pin, run_with_retries, Loop, ReadPin, RootCapture};

/// What landed a descent at the leaf level: a key-based search hit, or a
/// direction (leftmost/rightmost item) for `find_first`/`find_last`.
pub(crate) enum Seek<'a> {
    Key(&'a [u8]),
    First,
    Last,
}

/// Descends from `root` to the leaf level along `seek`, then runs
/// `at_leaf` under the leaf's still-held read latch. Returns `Ok(None)`
/// when a concurrent structural change was detected anywhere along the
/// path (stale latch, triangle-invariant mismatch, or a leaf removal
/// counter newer than the one captured at the top of the operation) --
/// the caller should restart the whole attempt from the meta page.
pub(crate) fn descend_apply<T>(
    tree: &Tree,
    root: RootCapture,
    seek: &Seek,
    at_leaf: impl FnOnce(&Tree, &ReadPin, SearchHit) -> TreeResult<T>,
) -> TreeResult<Option<T>> {
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

        let count = pin.io.count(pin.addr());

        if level == 0 {
            if pin.io.removal_counter(pin.addr()) > root.removal_counter {
                pin.release(tree.mem());
                return Ok(None);
            }
            let hit = leaf_hit(tree, &pin, seek, count);
            let result = at_leaf(tree, &pin, hit)?;
            pin.release(tree.mem());
            return Ok(Some(result));
        }

        let idx = inner_landing(tree, &pin, seek, count);
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

fn leaf_hit(tree: &Tree, pin: &ReadPin, seek: &Seek, count: u16) -> SearchHit {
    match seek {
        Seek::Key(key) => binary_search_page(count, |idx| pin.io.compare(pin.addr(), idx, key, tree.comparator())),
        Seek::First => {
            if count == 0 {
                SearchHit::NotFound(-1)
            } else {
                SearchHit::Found(0)
            }
        }
        Seek::Last => {
            if count == 0 {
                SearchHit::NotFound(-1)
            } else {
                SearchHit::Found(count as i32 - 1)
            }
        }
    }
}

fn inner_landing(tree: &Tree, pin: &ReadPin, seek: &Seek, count: u16) -> i32 {
    match seek {
        Seek::Key(key) => {
            let hit = binary_search_page(count, |idx| pin.io.compare(pin.addr(), idx, key, tree.comparator()));
            landing_index(hit)
        }
        Seek::First => 0,
        Seek::Last => count as i32,
    }
}

pub fn find_one(tree: &Tree, key: &[u8]) -> TreeResult<Option<Row>> {
    run_with_retries(tree, "find", || {
        let root = capture_root(tree)?;
        let seek = Seek::Key(key);
        let outcome = descend_apply(tree, root, &seek, |_tree, pin, hit| {
            Ok(match hit {
                SearchHit::Found(idx) => pin.io.get_row(pin.addr(), idx),
                SearchHit::NotFound(_) => None,
            })
        })?;
        match outcome {
            Some(row) => Ok(Loop::Done(row)),
            None => Ok(Loop::Retry),
        }
    })
}

pub fn find_edge(tree: &Tree, first: bool) -> TreeResult<Option<Row>> {
    run_with_retries(tree, if first { "find_first" } else { "find_last" }, || {
        let root = capture_root(tree)?;
        let seek = if first { Seek::First } else { Seek::Last };
        let outcome = descend_apply(tree, root, &seek, |_tree, pin, hit| {
            Ok(match hit {
                SearchHit::Found(idx) => pin.io.get_row(pin.addr(), idx),
                SearchHit::NotFound(_) => None,
            })
        })?;
        match outcome {
            Some(row) => Ok(Loop::Done(row)),
            None => Ok(Loop::Retry),
        }
    })
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
    fn find_one_on_empty_tree_returns_none() {
        let tree = new_tree();
        assert_eq!(tree.find_one(&10u32.to_be_bytes()).unwrap(), None);
    }

    #[test]
    fn find_one_after_put_returns_row() {
        let tree = new_tree();
        tree.put(&10u32.to_be_bytes(), &99u32.to_be_bytes()).unwrap();
        let row = tree.find_one(&10u32.to_be_bytes()).unwrap().unwrap();
        assert_eq!(&row[4..8], &99u32.to_be_bytes());
    }

    #[test]
    fn find_first_and_last_on_empty_tree() {
        let tree = new_tree();
        assert_eq!(tree.find_first().unwrap(), None);
        assert_eq!(tree.find_last().unwrap(), None);
    }
}
