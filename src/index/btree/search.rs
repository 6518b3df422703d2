//! Search engine - root-to-leaf descent shared by find, insert, and delete.

use tracing::trace;

use crate::common::{Error, Key, PageId, Result};
use crate::index::btree::node::{LeafNode, Node};
use crate::index::btree::store::NodeStore;

/// Descend from `root` to the leaf that owns `key`.
///
/// Returns the leaf together with the ordered chain of ancestor page IDs
/// (root first, leaf's parent last). Split and merge propagation walk this
/// chain backwards instead of descending a second time.
///
/// The caller handles the empty tree; `root` must be a valid page.
pub(crate) fn descend(
    store: &mut NodeStore<'_>,
    root: PageId,
    key: Key,
) -> Result<(LeafNode, Vec<PageId>)> {
    let mut path = Vec::new();
    let mut current = root;

    loop {
        match store.load(current)? {
            Node::Leaf(leaf) => {
                trace!(key, leaf = leaf.page_id.0, depth = path.len(), "descend");
                return Ok((leaf, path));
            }
            Node::Internal(internal) => {
                if path.len() >= store.page_count() as usize {
                    // a corrupted parent/child cycle would otherwise loop forever
                    return Err(Error::corruption(current.0, "descent exceeds page count"));
                }
                path.push(current);
                current = internal.child_for(key);
            }
        }
    }
}

/// Descend to the leftmost leaf of the subtree at `root`, ignoring keys.
///
/// Entry point of the leaf sibling chain for full-tree scans.
pub(crate) fn descend_leftmost(store: &mut NodeStore<'_>, root: PageId) -> Result<LeafNode> {
    let mut current = root;
    let mut levels = 0usize;

    loop {
        match store.load(current)? {
            Node::Leaf(leaf) => return Ok(leaf),
            Node::Internal(internal) => {
                levels += 1;
                if levels >= store.page_count() as usize {
                    return Err(Error::corruption(current.0, "descent exceeds page count"));
                }
                current = internal.leftmost;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::index::btree::node::InternalNode;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    /// Hand-build a two-level tree:
    ///
    /// ```text
    ///          [15 | 40]         (page 0)
    ///         /    |    \
    ///    {5,10} {15,20} {40,50}  (pages 1, 2, 3)
    /// ```
    fn build_two_level(dm: &mut DiskManager) -> PageId {
        let mut store = NodeStore::new(dm);
        let root_id = store.alloc().unwrap();
        let leaf_ids: Vec<PageId> = (0..3).map(|_| store.alloc().unwrap()).collect();

        let contents = [[5i64, 10], [15, 20], [40, 50]];
        for (i, keys) in contents.iter().enumerate() {
            let mut leaf = LeafNode::new(leaf_ids[i]);
            leaf.parent = root_id;
            leaf.records = keys.iter().map(|&k| (k, Value::from_u64(k as u64))).collect();
            leaf.right_sibling = if i + 1 < 3 { leaf_ids[i + 1] } else { PageId::INVALID };
            store.save_leaf(&leaf).unwrap();
        }

        let mut root = InternalNode::new(root_id);
        root.leftmost = leaf_ids[0];
        root.entries = vec![(15, leaf_ids[1]), (40, leaf_ids[2])];
        store.save_internal(&root).unwrap();

        root_id
    }

    #[test]
    fn test_descend_routes_to_owning_leaf() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("search.db")).unwrap();
        let root = build_two_level(&mut dm);
        let mut store = NodeStore::new(&mut dm);

        for (key, expected_first) in [(1, 5i64), (10, 5), (15, 15), (39, 15), (40, 40), (99, 40)] {
            let (leaf, path) = descend(&mut store, root, key).unwrap();
            assert_eq!(leaf.records[0].0, expected_first, "key {}", key);
            assert_eq!(path, vec![root]);
        }
    }

    #[test]
    fn test_descend_on_leaf_root_has_empty_path() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("search.db")).unwrap();
        let mut store = NodeStore::new(&mut dm);

        let root = store.alloc().unwrap();
        store.save_leaf(&LeafNode::new(root)).unwrap();

        let (leaf, path) = descend(&mut store, root, 42).unwrap();
        assert_eq!(leaf.page_id, root);
        assert!(path.is_empty());
    }

    #[test]
    fn test_descend_leftmost() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("search.db")).unwrap();
        let root = build_two_level(&mut dm);
        let mut store = NodeStore::new(&mut dm);

        let leaf = descend_leftmost(&mut store, root).unwrap();
        assert_eq!(leaf.records[0].0, 5);
    }
}
