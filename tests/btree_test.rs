//! End-to-end exercises of the tree's external interface across a
//! single page and across a multi-level tree, matching the scenarios
//! named in spec section 8.

mod common;

use common::{key, new_tree, row_of, value_of, SMALL_PAGE};

#[test]
fn empty_tree_first_insert_is_a_single_level_root() {
    let tree = new_tree(256);
    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.put(&key(10), &row_of(10)).unwrap(), None);

    assert_eq!(tree.root_level().unwrap(), 0);
    let found = tree.find_one(&key(10)).unwrap().unwrap();
    assert_eq!(value_of(&found), 10);

    let first = tree.find_first().unwrap().unwrap();
    let last = tree.find_last().unwrap().unwrap();
    assert_eq!(value_of(&first), 10);
    assert_eq!(value_of(&last), 10);
}

#[test]
fn split_grows_root_and_links_leaves() {
    let tree = new_tree(SMALL_PAGE);
    for k in 1u32..=4 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    assert_eq!(tree.root_level().unwrap(), 0);

    tree.put(&key(5), &row_of(5)).unwrap();
    assert_eq!(tree.root_level().unwrap(), 1);

    for k in 1u32..=5 {
        let row = tree.find_one(&key(k)).unwrap().unwrap();
        assert_eq!(value_of(&row), k);
    }
    assert_eq!(tree.find_first().unwrap().map(|r| value_of(&r)), Some(1));
    assert_eq!(tree.find_last().unwrap().map(|r| value_of(&r)), Some(5));
}

#[test]
fn duplicate_insert_is_rejected() {
    let tree = new_tree(256);
    tree.put(&key(1), &row_of(1)).unwrap();
    let err = tree.put(&key(1), &row_of(2));
    assert!(matches!(err, Err(crabtree::TreeError::DuplicateKey)));
}

#[test]
fn put_x_and_remove_x_report_presence_without_the_row() {
    let tree = new_tree(256);
    assert!(!tree.put_x(&key(1), &row_of(1)).unwrap());
    assert!(tree.put_x(&key(1), &row_of(2)).unwrap());
    assert!(tree.remove_x(&key(1)).unwrap());
    assert!(!tree.remove_x(&key(1)).unwrap());
}

#[test]
fn size_counts_every_live_row() {
    let tree = new_tree(SMALL_PAGE);
    assert_eq!(tree.size().unwrap(), 0);
    for k in 0u32..300 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    assert_eq!(tree.size().unwrap(), 300);
    for k in 0u32..50 {
        tree.remove(&key(k)).unwrap();
    }
    assert_eq!(tree.size().unwrap(), 250);
}

#[test]
fn invoke_put_remove_and_noop_share_the_same_leaf_mutation_paths() {
    use crabtree::ops::invoke::InvokeAction;

    let tree = new_tree(256);
    tree.invoke(&key(1), |existing| {
        assert!(existing.is_none());
        InvokeAction::Put(row_of(1))
    })
    .unwrap();
    assert_eq!(tree.find_one(&key(1)).unwrap().map(|r| value_of(&r)), Some(1));

    tree.invoke(&key(1), |existing| {
        assert_eq!(existing.map(value_of), Some(1));
        InvokeAction::Noop
    })
    .unwrap();
    assert_eq!(tree.find_one(&key(1)).unwrap().map(|r| value_of(&r)), Some(1));

    tree.invoke(&key(1), |existing| {
        assert!(existing.is_some());
        InvokeAction::Remove
    })
    .unwrap();
    assert_eq!(tree.find_one(&key(1)).unwrap(), None);
}

#[test]
fn destroy_recycles_every_page_and_rejects_further_operations() {
    let tree = new_tree(SMALL_PAGE);
    for k in 0u32..200 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    let recycled = tree.destroy(false).unwrap();
    assert!(recycled.0 > 0);
    assert!(tree.is_destroyed());
    assert!(matches!(tree.find_one(&key(0)), Err(crabtree::TreeError::Destroyed)));
}

#[test]
fn sequential_write_mode_biases_splits_toward_the_back_page() {
    use crabtree::TreeConfig;
    let tree = common::new_tree_with_config(SMALL_PAGE, TreeConfig::default());
    tree.enable_sequential_write_mode();
    for k in 0u32..500 {
        tree.put(&key(k), &row_of(k)).unwrap();
    }
    for k in 0u32..500 {
        assert_eq!(tree.find_one(&key(k)).unwrap().map(|r| value_of(&r)), Some(k));
    }
}
