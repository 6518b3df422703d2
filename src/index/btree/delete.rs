//! Deletion engine - removal with borrow/merge repair and root shrinkage.

use tracing::debug;

use crate::common::{Error, Key, PageId, Result};
use crate::index::btree::node::LeafNode;
use crate::index::btree::search::descend;
use crate::index::btree::store::NodeStore;
use crate::index::btree::{BPlusTree, DeleteOutcome};

impl BPlusTree {
    /// Remove a key and its value.
    ///
    /// Returns [`DeleteOutcome::NotFound`] without mutating anything when
    /// `key` is absent. A non-root leaf left below minimum occupancy
    /// (`ceil(ORDER_LEAF / 2) - 1` keys) is repaired by borrowing one record
    /// from an adjacent same-parent sibling or, when neither sibling can
    /// spare one, by merging into its left-hand neighbor; removing the
    /// merged child's separator may cascade the same repair up the ancestor
    /// chain. An internal root left with zero separators is replaced by its
    /// only child; a leaf root is never deallocated, even when empty.
    ///
    /// # Errors
    /// I/O and corruption errors are fatal for the operation; a partially
    /// applied merge is not rolled back (no write-ahead log by design).
    pub fn delete(&mut self, key: Key) -> Result<DeleteOutcome> {
        if !self.root.is_valid() {
            return Ok(DeleteOutcome::NotFound);
        }

        let root = self.root;
        let min_leaf = self.min_leaf_keys();
        let min_internal = self.min_internal_keys();

        let mut store = NodeStore::new(&mut self.disk);
        let (mut leaf, path) = descend(&mut store, root, key)?;

        let idx = leaf.locate(key);
        if !leaf.records.get(idx).is_some_and(|&(k, _)| k == key) {
            return Ok(DeleteOutcome::NotFound);
        }

        leaf.records.remove(idx);
        store.save_leaf(&leaf)?;
        debug!(key, leaf = leaf.page_id.0, "deleted record");

        if leaf.page_id == root || leaf.records.len() >= min_leaf {
            // The root leaf may hold any count, down to zero (empty tree).
            return Ok(DeleteOutcome::Deleted);
        }

        let new_root = repair_leaf(&mut store, &path, leaf, min_leaf, min_internal, root)?;
        if let Some(promoted) = new_root {
            debug!(root = promoted.0, "root shrank");
            self.set_root(promoted)?;
        }

        Ok(DeleteOutcome::Deleted)
    }
}

/// Repair an underflowed non-root leaf.
///
/// Borrow beats merge: a record is redistributed from whichever adjacent
/// same-parent sibling holds more than the minimum (left first), updating
/// the separator in the parent to the new boundary key. Otherwise the
/// right-hand of the two leaves is merged into the left-hand one, the
/// sibling chain is relinked, the emptied page freed, and the separator
/// removed from the parent, which may underflow in turn.
///
/// Returns the new root page when the cascade shrinks the root.
fn repair_leaf(
    store: &mut NodeStore<'_>,
    path: &[PageId],
    mut leaf: LeafNode,
    min_leaf: usize,
    min_internal: usize,
    root: PageId,
) -> Result<Option<PageId>> {
    let parent_id = *path.last().ok_or_else(|| {
        Error::corruption(leaf.page_id.0, "non-root leaf with no ancestor path")
    })?;
    let mut parent = store.load_internal(parent_id)?;
    let pos = parent.position_of_child(leaf.page_id).ok_or_else(|| {
        Error::corruption(parent_id.0, "leaf missing from its parent")
    })?;

    // Borrow from the left sibling.
    if pos > 0 {
        let left_id = parent.child_at(pos - 1);
        let mut left = store.load_leaf(left_id)?;
        if left.records.len() > min_leaf {
            let moved = left.records.pop().ok_or_else(|| {
                Error::corruption(left_id.0, "sibling above minimum yet empty")
            })?;
            leaf.records.insert(0, moved);
            parent.entries[pos - 1].0 = moved.0;

            store.save_leaf(&left)?;
            store.save_leaf(&leaf)?;
            store.save_internal(&parent)?;
            debug!(from = left_id.0, to = leaf.page_id.0, "leaf borrow");
            return Ok(None);
        }
    }

    // Borrow from the right sibling.
    if pos < parent.entries.len() {
        let right_id = parent.child_at(pos + 1);
        let mut right = store.load_leaf(right_id)?;
        if right.records.len() > min_leaf {
            let moved = right.records.remove(0);
            leaf.records.push(moved);
            parent.entries[pos].0 = right.records[0].0;

            store.save_leaf(&right)?;
            store.save_leaf(&leaf)?;
            store.save_internal(&parent)?;
            debug!(from = right_id.0, to = leaf.page_id.0, "leaf borrow");
            return Ok(None);
        }
    }

    // Merge. Both neighbors sit at the minimum, so the combined records fit
    // in one leaf. The right-hand page is always the one freed.
    if pos > 0 {
        let left_id = parent.child_at(pos - 1);
        let mut left = store.load_leaf(left_id)?;

        left.records.append(&mut leaf.records);
        left.right_sibling = leaf.right_sibling;
        store.save_leaf(&left)?;
        store.free(leaf.page_id)?;
        debug!(into = left_id.0, freed = leaf.page_id.0, "leaf merge");

        parent.entries.remove(pos - 1);
    } else {
        let right_id = parent.child_at(1);
        let mut right = store.load_leaf(right_id)?;

        leaf.records.append(&mut right.records);
        leaf.right_sibling = right.right_sibling;
        store.save_leaf(&leaf)?;
        store.free(right_id)?;
        debug!(into = leaf.page_id.0, freed = right_id.0, "leaf merge");

        parent.entries.remove(0);
    }
    store.save_internal(&parent)?;

    repair_internal(store, path, path.len() - 1, min_internal, root)
}

/// Repair an internal node that just lost a separator/child pair.
///
/// The node at `path[depth]` has already been saved. Internal
/// redistribution rotates a child through the parent separator; internal
/// merge concatenates the right-hand node into the left-hand one, pulling
/// the dividing separator down between them, and removes that separator
/// from the grandparent, recursing upward.
fn repair_internal(
    store: &mut NodeStore<'_>,
    path: &[PageId],
    depth: usize,
    min_internal: usize,
    root: PageId,
) -> Result<Option<PageId>> {
    let node_id = path[depth];
    let mut node = store.load_internal(node_id)?;

    if node_id == root {
        if node.entries.is_empty() {
            // Single remaining child becomes the root.
            let promoted = node.leftmost;
            store.set_parent(promoted, PageId::INVALID)?;
            store.free(node_id)?;
            return Ok(Some(promoted));
        }
        return Ok(None);
    }

    if node.entries.len() >= min_internal {
        return Ok(None);
    }

    let parent_id = path[depth - 1];
    let mut parent = store.load_internal(parent_id)?;
    let pos = parent.position_of_child(node_id).ok_or_else(|| {
        Error::corruption(parent_id.0, "node missing from its parent")
    })?;

    // Borrow from the left sibling: its last pair rotates through the
    // parent separator, and its child becomes our new leftmost pointer.
    if pos > 0 {
        let left_id = parent.child_at(pos - 1);
        let mut left = store.load_internal(left_id)?;
        if left.entries.len() > min_internal {
            let (left_key, left_child) = left.entries.pop().ok_or_else(|| {
                Error::corruption(left_id.0, "sibling above minimum yet empty")
            })?;
            let separator = parent.entries[pos - 1].0;

            node.entries.insert(0, (separator, node.leftmost));
            node.leftmost = left_child;
            parent.entries[pos - 1].0 = left_key;
            store.set_parent(left_child, node_id)?;

            store.save_internal(&left)?;
            store.save_internal(&node)?;
            store.save_internal(&parent)?;
            debug!(from = left_id.0, to = node_id.0, "internal borrow");
            return Ok(None);
        }
    }

    // Borrow from the right sibling: the parent separator comes down paired
    // with the sibling's leftmost child, and the sibling's first key goes up.
    if pos < parent.entries.len() {
        let right_id = parent.child_at(pos + 1);
        let mut right = store.load_internal(right_id)?;
        if right.entries.len() > min_internal {
            let separator = parent.entries[pos].0;
            let moved_child = right.leftmost;

            node.entries.push((separator, moved_child));
            store.set_parent(moved_child, node_id)?;

            let (right_key, right_child) = right.entries.remove(0);
            right.leftmost = right_child;
            parent.entries[pos].0 = right_key;

            store.save_internal(&right)?;
            store.save_internal(&node)?;
            store.save_internal(&parent)?;
            debug!(from = right_id.0, to = node_id.0, "internal borrow");
            return Ok(None);
        }
    }

    // Merge: the dividing separator is pulled down between the two halves.
    // The absorbed node's children must all be re-parented to the survivor.
    if pos > 0 {
        let left_id = parent.child_at(pos - 1);
        let mut left = store.load_internal(left_id)?;
        let separator = parent.entries[pos - 1].0;

        let moved: Vec<PageId> = node.children().collect();
        left.entries.push((separator, node.leftmost));
        left.entries.append(&mut node.entries);
        for child in moved {
            store.set_parent(child, left_id)?;
        }

        store.save_internal(&left)?;
        store.free(node_id)?;
        debug!(into = left_id.0, freed = node_id.0, "internal merge");

        parent.entries.remove(pos - 1);
    } else {
        let right_id = parent.child_at(1);
        let mut right = store.load_internal(right_id)?;
        let separator = parent.entries[0].0;

        let moved: Vec<PageId> = right.children().collect();
        node.entries.push((separator, right.leftmost));
        node.entries.append(&mut right.entries);
        for child in moved {
            store.set_parent(child, node_id)?;
        }

        store.save_internal(&node)?;
        store.free(right_id)?;
        debug!(into = node_id.0, freed = right_id.0, "internal merge");

        parent.entries.remove(0);
    }
    store.save_internal(&parent)?;

    repair_internal(store, path, depth - 1, min_internal, root)
}
