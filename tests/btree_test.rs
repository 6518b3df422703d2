//! B+ Tree Integration Tests
//!
//! End-to-end tests against the public tree API, exercising splits, merges,
//! redistribution, root growth/shrink, and persistence across reopen.

use arbordb::index::btree::BPlusTree;
use arbordb::{DeleteOutcome, InsertOutcome, Value};
use tempfile::tempdir;

fn create_tree(order_leaf: usize, order_internal: usize) -> (BPlusTree, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let tree = BPlusTree::create(&path, order_leaf, order_internal).unwrap();
    (tree, dir)
}

/// Value derived from a key, so lookups can verify payloads.
fn val(key: i64) -> Value {
    Value::from_u64((key as u64).wrapping_mul(31))
}

fn insert_all(tree: &mut BPlusTree, keys: impl IntoIterator<Item = i64>) {
    for k in keys {
        assert_eq!(tree.insert(k, val(k)).unwrap(), InsertOutcome::Inserted);
    }
}

fn collect_keys(tree: &mut BPlusTree) -> Vec<i64> {
    tree.scan()
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect()
}

// ============================================================================
// The order-4 walkthrough: one split, then a delete
// ============================================================================

#[test]
fn test_order_four_split_walkthrough() {
    let (mut tree, _dir) = create_tree(4, 4);

    // Three records fit in the root leaf.
    insert_all(&mut tree, [10, 20, 5]);
    assert_eq!(tree.height().unwrap(), 1);

    // The fourth insert overflows the leaf: split at ceil(4/2) = 2, so the
    // left leaf keeps {5, 10}, the right gets {15, 20}, and 15 is copied up
    // as the root separator.
    insert_all(&mut tree, [15]);
    assert_eq!(tree.height().unwrap(), 2);
    assert_eq!(collect_keys(&mut tree), vec![5, 10, 15, 20]);

    assert_eq!(tree.find(15).unwrap(), Some(val(15)));
    assert_eq!(tree.find(12).unwrap(), None);
    tree.validate().unwrap();

    // Both leaves sit at minimum occupancy afterward, so this delete leaves
    // {5} at exactly the minimum of one record; no repair needed.
    assert_eq!(tree.delete(10).unwrap(), DeleteOutcome::Deleted);
    assert_eq!(tree.find(10).unwrap(), None);
    assert_eq!(collect_keys(&mut tree), vec![5, 15, 20]);
    tree.validate().unwrap();
}

// ============================================================================
// Insertion
// ============================================================================

#[test]
fn test_duplicate_insert_is_rejected_unchanged() {
    let (mut tree, _dir) = create_tree(4, 4);

    assert_eq!(tree.insert(7, val(7)).unwrap(), InsertOutcome::Inserted);
    assert_eq!(
        tree.insert(7, Value::from_u64(999)).unwrap(),
        InsertOutcome::Duplicate
    );

    // The stored value is untouched.
    assert_eq!(tree.find(7).unwrap(), Some(val(7)));
    assert_eq!(tree.len().unwrap(), 1);
}

#[test]
fn test_duplicate_detection_in_deep_tree() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..50);

    for k in 0..50 {
        assert_eq!(
            tree.insert(k, Value::from_u64(0)).unwrap(),
            InsertOutcome::Duplicate
        );
    }
    assert_eq!(tree.len().unwrap(), 50);
    tree.validate().unwrap();
}

#[test]
fn test_ascending_inserts_build_multi_level_tree() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..200);

    assert!(tree.height().unwrap() >= 3);
    assert_eq!(collect_keys(&mut tree), (0..200).collect::<Vec<_>>());
    for k in 0..200 {
        assert_eq!(tree.find(k).unwrap(), Some(val(k)), "key {}", k);
    }
    tree.validate().unwrap();
}

#[test]
fn test_descending_inserts_build_multi_level_tree() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, (0..200).rev());

    assert_eq!(collect_keys(&mut tree), (0..200).collect::<Vec<_>>());
    tree.validate().unwrap();
}

#[test]
fn test_scattered_inserts() {
    let (mut tree, _dir) = create_tree(5, 5);

    // 211 is prime, so stepping by it visits each residue exactly once.
    let keys: Vec<i64> = (0..300).map(|i| (i * 211) % 300).collect();
    insert_all(&mut tree, keys);

    assert_eq!(collect_keys(&mut tree), (0..300).collect::<Vec<_>>());
    tree.validate().unwrap();
}

#[test]
fn test_negative_keys() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, [-50, 0, 50, -100, 100, -25]);

    assert_eq!(collect_keys(&mut tree), vec![-100, -50, -25, 0, 50, 100]);
    assert_eq!(tree.find(-100).unwrap(), Some(val(-100)));
    tree.validate().unwrap();
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn test_delete_from_root_leaf_never_frees_it() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, [1, 2]);

    assert_eq!(tree.delete(1).unwrap(), DeleteOutcome::Deleted);
    assert_eq!(tree.delete(2).unwrap(), DeleteOutcome::Deleted);

    // The empty leaf root stays: the tree is empty but still has a root.
    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.height().unwrap(), 1);
    tree.validate().unwrap();

    // And it keeps working.
    insert_all(&mut tree, [3]);
    assert_eq!(tree.find(3).unwrap(), Some(val(3)));
}

#[test]
fn test_delete_missing_key() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..20);

    assert_eq!(tree.delete(99).unwrap(), DeleteOutcome::NotFound);
    assert_eq!(tree.delete(-1).unwrap(), DeleteOutcome::NotFound);
    assert_eq!(tree.len().unwrap(), 20);
    tree.validate().unwrap();
}

#[test]
fn test_leaf_borrow_from_right_sibling() {
    let (mut tree, _dir) = create_tree(4, 4);

    // Leaves after splits: {0,1} {2,3,4} under one root (order 4).
    insert_all(&mut tree, [0, 1, 2, 3, 4]);
    assert_eq!(tree.height().unwrap(), 2);

    // {0,1} drops to {1}; still at minimum. Deleting 1 then underflows and
    // the right sibling has a record to spare.
    tree.delete(0).unwrap();
    tree.delete(1).unwrap();

    assert_eq!(collect_keys(&mut tree), vec![2, 3, 4]);
    tree.validate().unwrap();
}

#[test]
fn test_leaf_merge_collapses_root() {
    let (mut tree, _dir) = create_tree(4, 4);

    // One split: {5,10} | {15,20} under separator 15.
    insert_all(&mut tree, [10, 20, 5, 15]);
    assert_eq!(tree.height().unwrap(), 2);

    // Both leaves at minimum after these two: the next delete merges the
    // leaves and the root shrinks back to a single leaf.
    tree.delete(10).unwrap();
    tree.delete(20).unwrap();
    tree.delete(5).unwrap();

    assert_eq!(tree.height().unwrap(), 1);
    assert_eq!(collect_keys(&mut tree), vec![15]);
    tree.validate().unwrap();
}

#[test]
fn test_delete_everything_ascending() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..150);

    for k in 0..150 {
        assert_eq!(tree.delete(k).unwrap(), DeleteOutcome::Deleted, "key {}", k);
        tree.validate().unwrap();
    }
    assert!(tree.is_empty().unwrap());
    assert_eq!(collect_keys(&mut tree), Vec::<i64>::new());
}

#[test]
fn test_delete_everything_descending() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..150);

    for k in (0..150).rev() {
        assert_eq!(tree.delete(k).unwrap(), DeleteOutcome::Deleted, "key {}", k);
        tree.validate().unwrap();
    }
    assert!(tree.is_empty().unwrap());
}

#[test]
fn test_delete_scattered_with_interleaved_lookups() {
    let (mut tree, _dir) = create_tree(5, 4);
    insert_all(&mut tree, 0..120);

    let mut remaining: Vec<i64> = (0..120).collect();
    let order: Vec<i64> = (0..120).map(|i| (i * 77) % 120).collect();
    for k in order {
        assert_eq!(tree.delete(k).unwrap(), DeleteOutcome::Deleted);
        remaining.retain(|&r| r != k);

        assert_eq!(tree.find(k).unwrap(), None);
        if let Some(&probe) = remaining.first() {
            assert_eq!(tree.find(probe).unwrap(), Some(val(probe)));
        }
        tree.validate().unwrap();
    }
    assert!(tree.is_empty().unwrap());
}

#[test]
fn test_merged_pages_are_freed_and_reused() {
    let (mut tree, _dir) = create_tree(4, 4);
    insert_all(&mut tree, 0..100);
    let grown = tree.disk().page_count();

    for k in 0..100 {
        tree.delete(k).unwrap();
    }
    // Merges returned pages to the free list.
    assert!(tree.disk().free_page_count() > 0);

    // Growing the tree again reuses them instead of extending the file.
    insert_all(&mut tree, 0..100);
    assert_eq!(tree.disk().page_count(), grown);
    tree.validate().unwrap();
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_reopen_preserves_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut tree = BPlusTree::create(&path, 4, 4).unwrap();
        insert_all(&mut tree, 0..80);
        tree.delete(40).unwrap();
    }

    let mut tree = BPlusTree::open(&path).unwrap();
    assert_eq!(tree.order_leaf(), 4);
    assert_eq!(tree.find(40).unwrap(), None);
    for k in (0..80).filter(|&k| k != 40) {
        assert_eq!(tree.find(k).unwrap(), Some(val(k)), "key {}", k);
    }
    tree.validate().unwrap();

    // The reopened tree keeps mutating correctly.
    insert_all(&mut tree, [40, 200]);
    tree.delete(0).unwrap();
    assert_eq!(tree.len().unwrap(), 80);
    tree.validate().unwrap();
}

#[test]
fn test_reopen_empty_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        BPlusTree::create(&path, 8, 8).unwrap();
    }

    let mut tree = BPlusTree::open(&path).unwrap();
    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.find(1).unwrap(), None);
    insert_all(&mut tree, [1]);
    assert_eq!(tree.find(1).unwrap(), Some(val(1)));
}

// ============================================================================
// Larger fan-out
// ============================================================================

#[test]
fn test_default_sized_orders() {
    // Fan-out large enough that 1000 keys stay in a two-level tree.
    let (mut tree, _dir) = create_tree(128, 128);
    insert_all(&mut tree, 0..1000);

    assert_eq!(tree.height().unwrap(), 2);
    assert_eq!(tree.len().unwrap(), 1000);
    for k in (0..1000).step_by(97) {
        assert_eq!(tree.find(k).unwrap(), Some(val(k)));
    }
    tree.validate().unwrap();

    for k in (0..1000).step_by(2) {
        tree.delete(k).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 500);
    tree.validate().unwrap();
}
