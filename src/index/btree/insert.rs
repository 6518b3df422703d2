//! Insertion engine - ordered insert with split propagation and root growth.

use tracing::debug;

use crate::common::{Key, PageId, Result, Value};
use crate::index::btree::node::{InternalNode, LeafNode};
use crate::index::btree::search::descend;
use crate::index::btree::store::NodeStore;
use crate::index::btree::{BPlusTree, InsertOutcome};

impl BPlusTree {
    /// Insert a key/value pair.
    ///
    /// Returns [`InsertOutcome::Duplicate`] without mutating anything when
    /// `key` is already present; overwrite is out of scope. A full leaf is
    /// split at `ceil(ORDER_LEAF / 2)` and a single separator is pushed to
    /// the parent, splitting internal nodes on the way up as needed; when
    /// the root itself splits, a new root is allocated and the tree grows
    /// one level.
    ///
    /// # Errors
    /// I/O and corruption errors are fatal for the operation; a partially
    /// applied split is not rolled back (no write-ahead log by design).
    pub fn insert(&mut self, key: Key, value: Value) -> Result<InsertOutcome> {
        // Empty tree: the first insert creates the root leaf.
        if !self.root.is_valid() {
            let mut store = NodeStore::new(&mut self.disk);
            let page_id = store.alloc()?;
            let mut leaf = LeafNode::new(page_id);
            leaf.records.push((key, value));
            store.save_leaf(&leaf)?;

            debug!(key, root = page_id.0, "created root leaf");
            self.set_root(page_id)?;
            return Ok(InsertOutcome::Inserted);
        }

        let root = self.root;
        let order_leaf = self.order_leaf;
        let order_internal = self.order_internal;

        let mut store = NodeStore::new(&mut self.disk);
        let (mut leaf, path) = descend(&mut store, root, key)?;

        let idx = leaf.locate(key);
        if leaf.records.get(idx).is_some_and(|&(k, _)| k == key) {
            return Ok(InsertOutcome::Duplicate);
        }

        leaf.records.insert(idx, (key, value));
        if leaf.records.len() < order_leaf {
            // Room to spare: a single page write finishes the operation.
            store.save_leaf(&leaf)?;
            return Ok(InsertOutcome::Inserted);
        }

        // Leaf holds ORDER_LEAF records now; split at the midpoint. The new
        // right leaf's smallest key is copied up as the separator.
        let new_id = store.alloc()?;
        let split_at = order_leaf.div_ceil(2);

        let mut right = LeafNode::new(new_id);
        right.records = leaf.records.split_off(split_at);
        right.parent = leaf.parent;
        right.right_sibling = leaf.right_sibling;
        leaf.right_sibling = new_id;
        let separator = right.records[0].0;

        store.save_leaf(&leaf)?;
        store.save_leaf(&right)?;
        debug!(
            separator,
            left = leaf.page_id.0,
            right = new_id.0,
            "leaf split"
        );

        if let Some((sep, sibling)) = propagate_split(
            &mut store,
            &path,
            separator,
            new_id,
            order_internal,
        )? {
            // The root itself split (or the root leaf did, with an empty
            // path): allocate a new root one level up.
            let new_root_id = store.alloc()?;
            let mut new_root = InternalNode::new(new_root_id);
            new_root.leftmost = root;
            new_root.entries.push((sep, sibling));
            store.save_internal(&new_root)?;
            store.set_parent(root, new_root_id)?;
            store.set_parent(sibling, new_root_id)?;

            debug!(separator = sep, root = new_root_id.0, "root grew");
            self.set_root(new_root_id)?;
        }

        Ok(InsertOutcome::Inserted)
    }
}

/// Push a separator/new-child pair up the ancestor chain.
///
/// Inserts `(sep, child)` into each ancestor from the leaf's parent upward,
/// splitting full internal nodes symmetrically: the median pair is promoted
/// (not copied into either half) and its child becomes the new right node's
/// leftmost pointer. Returns the surviving `(separator, sibling)` pair when
/// propagation passes the root, i.e. the root split.
fn propagate_split(
    store: &mut NodeStore<'_>,
    path: &[PageId],
    separator: Key,
    new_child: PageId,
    order_internal: usize,
) -> Result<Option<(Key, PageId)>> {
    let mut sep = separator;
    let mut child = new_child;

    for &ancestor_id in path.iter().rev() {
        let mut node = store.load_internal(ancestor_id)?;

        let idx = node.entries.partition_point(|&(k, _)| k < sep);
        node.entries.insert(idx, (sep, child));

        if node.entries.len() < order_internal {
            store.save_internal(&node)?;
            return Ok(None);
        }

        // ORDER_INTERNAL pairs: promote the median rather than copying it.
        let new_id = store.alloc()?;
        let mid = order_internal / 2;

        let mut upper = node.entries.split_off(mid);
        let (promoted_key, promoted_child) = upper.remove(0);

        let mut right = InternalNode::new(new_id);
        right.parent = node.parent;
        right.leftmost = promoted_child;
        right.entries = upper;

        // Children that moved still point at the old node.
        let moved: Vec<PageId> = right.children().collect();
        for moved_child in moved {
            store.set_parent(moved_child, new_id)?;
        }

        store.save_internal(&node)?;
        store.save_internal(&right)?;
        debug!(
            separator = promoted_key,
            left = ancestor_id.0,
            right = new_id.0,
            "internal split"
        );

        sep = promoted_key;
        child = new_id;
    }

    Ok(Some((sep, child)))
}
