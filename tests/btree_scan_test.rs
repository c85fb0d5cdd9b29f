//! Cursor / range-scan behavior (spec section 4.7, section 8 scenario 6).

mod common;

use common::{key, new_tree, row_of, value_of, SMALL_PAGE};

fn collect(tree: &crabtree::Tree, lower: Option<u32>, upper: Option<u32>, low_incl: bool, up_incl: bool) -> Vec<u32> {
    let lower_bytes = lower.map(key);
    let upper_bytes = upper.map(key);
    let mut cursor = tree
        .find(lower_bytes.as_deref(), upper_bytes.as_deref(), low_incl, up_incl)
        .unwrap();
    let mut out = Vec::new();
    while let Some(row) = cursor.next(tree).unwrap() {
        out.push(value_of(&row));
    }
    out
}

#[test]
fn full_scan_returns_every_key_in_order() {
    let tree = new_tree(SMALL_PAGE);
    for k in 0u32..300 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    let all = collect(&tree, None, None, true, true);
    let expected: Vec<u32> = (0..300).collect();
    assert_eq!(all, expected);
}

#[test]
fn bounded_scan_respects_inclusive_and_exclusive_edges() {
    let tree = new_tree(SMALL_PAGE);
    for k in 0u32..300 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }

    assert_eq!(collect(&tree, Some(100), Some(110), true, true), (100..=110).collect::<Vec<_>>());
    assert_eq!(collect(&tree, Some(100), Some(110), false, true), (101..=110).collect::<Vec<_>>());
    assert_eq!(collect(&tree, Some(100), Some(110), true, false), (100..110).collect::<Vec<_>>());
    assert_eq!(collect(&tree, Some(100), Some(110), false, false), (101..110).collect::<Vec<_>>());
}

#[test]
fn scan_crosses_many_leaf_boundaries() {
    let tree = new_tree(SMALL_PAGE);
    for k in 0u32..2000 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    let mid = collect(&tree, Some(900), Some(1100), true, true);
    assert_eq!(mid, (900..=1100).collect::<Vec<_>>());
}

#[test]
fn scan_after_deletions_skips_removed_keys() {
    let tree = new_tree(SMALL_PAGE);
    for k in 0u32..200 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    for k in (0u32..200).step_by(2) {
        tree.remove(&key(k)).unwrap();
    }
    let scanned = collect(&tree, None, None, true, true);
    let expected: Vec<u32> = (0..200).filter(|k| k % 2 == 1).collect();
    assert_eq!(scanned, expected);
}

#[test]
fn empty_tree_scan_yields_nothing() {
    let tree = new_tree(256);
    assert_eq!(collect(&tree, None, None, true, true), Vec::<u32>::new());
}
