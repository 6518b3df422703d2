//! Disk-resident B+ tree index.
//!
//! Maps fixed-size keys to fixed-size values over paged storage. Every
//! structural change (split, merge, redistribution, root growth/shrink) is
//! persisted through the [`DiskManager`] before the operation returns.
//!
//! # Structure
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      BPlusTree                        │
//! │   root page id + orders, persisted in the meta page   │
//! ├──────────┬──────────────┬──────────────┬──────────────┤
//! │ search   │   insert     │   delete     │  node/store  │
//! │ descend  │ split + grow │ borrow/merge │ codec + I/O  │
//! └──────────┴──────────────┴──────────────┴──────────────┘
//!                           ↓
//!                     DiskManager (4KB pages, free list)
//! ```
//!
//! Single-threaded and synchronous: every operation runs to completion,
//! re-reading pages from disk as it descends, and releases all in-memory
//! nodes on return. There is no caching layer and no write-ahead log; an
//! I/O failure mid-operation is surfaced as-is, not rolled back.

mod delete;
mod insert;
mod node;
mod search;
mod store;

pub use node::{InternalNode, LeafNode, Node, MAX_ORDER_INTERNAL, MAX_ORDER_LEAF};

use std::path::Path;

use tracing::debug;

use crate::common::config::MIN_ORDER;
use crate::common::{Error, Key, PageId, Result, Value};
use crate::storage::page::{Page, PageHeader, PageType};
use crate::storage::DiskManager;

use search::{descend, descend_leftmost};
use store::NodeStore;

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key/value pair was added.
    Inserted,
    /// The key already exists; nothing was written. Overwrite is out of scope.
    Duplicate,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The key and its value were removed.
    Deleted,
    /// The key was not present; nothing was written.
    NotFound,
}

/// Meta page (page 0) field offsets, after the page header.
const OFFSET_MAGIC: usize = PageHeader::SIZE;
const OFFSET_ROOT: usize = OFFSET_MAGIC + 4;
const OFFSET_ORDER_LEAF: usize = OFFSET_ROOT + 8;
const OFFSET_ORDER_INTERNAL: usize = OFFSET_ORDER_LEAF + 2;

/// "BPT1", little-endian.
const META_MAGIC: u32 = 0x3154_5042;

/// Page 0 always holds the meta page.
const META_PAGE_ID: PageId = PageId(0);

/// A disk-resident B+ tree mapping [`Key`]s to [`Value`]s.
///
/// The handle owns the disk manager and the root page id; orders are fixed
/// at creation and persisted in the meta page together with the root, so a
/// tree survives process restarts via [`open`](Self::open).
///
/// # Example
/// ```no_run
/// use arbordb::index::btree::{BPlusTree, InsertOutcome};
/// use arbordb::Value;
///
/// let mut tree = BPlusTree::create("index.db", 128, 128).unwrap();
/// assert_eq!(
///     tree.insert(42, Value::from_u64(7)).unwrap(),
///     InsertOutcome::Inserted
/// );
/// assert_eq!(tree.find(42).unwrap(), Some(Value::from_u64(7)));
/// ```
pub struct BPlusTree {
    disk: DiskManager,
    /// Root page, `INVALID` until the first insert.
    root: PageId,
    /// Max keys in a leaf is `order_leaf - 1`.
    order_leaf: usize,
    /// Max separator/child pairs in an internal node is `order_internal - 1`.
    order_internal: usize,
}

impl BPlusTree {
    /// Create a new tree in a new database file.
    ///
    /// `order_leaf` / `order_internal` are the fan-out constants: a node
    /// holds at most `order - 1` keys and splits when it would hold `order`.
    ///
    /// # Errors
    /// `InvalidOrder` if an order is outside `3..=MAX_ORDER_*`; I/O errors
    /// if the file exists or cannot be created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        order_leaf: usize,
        order_internal: usize,
    ) -> Result<Self> {
        if !(MIN_ORDER..=MAX_ORDER_LEAF).contains(&order_leaf) {
            return Err(Error::InvalidOrder(order_leaf));
        }
        if !(MIN_ORDER..=MAX_ORDER_INTERNAL).contains(&order_internal) {
            return Err(Error::InvalidOrder(order_internal));
        }

        let mut disk = DiskManager::create(path)?;
        let meta_id = disk.allocate_page()?;
        debug_assert_eq!(meta_id, META_PAGE_ID);

        let mut tree = Self {
            disk,
            root: PageId::INVALID,
            order_leaf,
            order_internal,
        };
        tree.write_meta()?;

        debug!(order_leaf, order_internal, "created tree");
        Ok(tree)
    }

    /// Open a tree from an existing database file.
    ///
    /// Restores the root page id and the orders from the meta page.
    ///
    /// # Errors
    /// `Corruption` if page 0 is not a valid meta page.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut disk = DiskManager::open(path)?;

        let page = disk.read_page(META_PAGE_ID)?;
        if !page.verify_checksum() {
            return Err(Error::corruption(META_PAGE_ID.0, "meta checksum mismatch"));
        }
        if page.header().page_type != PageType::Meta {
            return Err(Error::corruption(META_PAGE_ID.0, "page 0 is not a meta page"));
        }

        let data = page.as_slice();
        let magic = u32::from_le_bytes([
            data[OFFSET_MAGIC],
            data[OFFSET_MAGIC + 1],
            data[OFFSET_MAGIC + 2],
            data[OFFSET_MAGIC + 3],
        ]);
        if magic != META_MAGIC {
            return Err(Error::corruption(META_PAGE_ID.0, "bad magic"));
        }

        let mut root_bytes = [0u8; 8];
        root_bytes.copy_from_slice(&data[OFFSET_ROOT..OFFSET_ROOT + 8]);
        let root = disk.page_id_of(u64::from_le_bytes(root_bytes))?;

        let order_leaf =
            u16::from_le_bytes([data[OFFSET_ORDER_LEAF], data[OFFSET_ORDER_LEAF + 1]]) as usize;
        let order_internal = u16::from_le_bytes([
            data[OFFSET_ORDER_INTERNAL],
            data[OFFSET_ORDER_INTERNAL + 1],
        ]) as usize;
        if !(MIN_ORDER..=MAX_ORDER_LEAF).contains(&order_leaf)
            || !(MIN_ORDER..=MAX_ORDER_INTERNAL).contains(&order_internal)
        {
            return Err(Error::corruption(META_PAGE_ID.0, "order out of range"));
        }

        debug!(root = root.0, order_leaf, order_internal, "opened tree");
        Ok(Self {
            disk,
            root,
            order_leaf,
            order_internal,
        })
    }

    /// Look up a key.
    ///
    /// Returns the stored value, or `None` when the key is absent.
    pub fn find(&mut self, key: Key) -> Result<Option<Value>> {
        if !self.root.is_valid() {
            return Ok(None);
        }
        let root = self.root;
        let mut store = NodeStore::new(&mut self.disk);
        let (leaf, _path) = descend(&mut store, root, key)?;
        Ok(leaf.get(key))
    }

    /// Iterate all records in ascending key order.
    ///
    /// Walks the leaf sibling chain from the leftmost leaf, re-reading each
    /// leaf page as it goes; no pages are held across `next` calls beyond
    /// the current leaf.
    pub fn scan(&mut self) -> Result<Scan<'_>> {
        let leaf = if self.root.is_valid() {
            let root = self.root;
            let mut store = NodeStore::new(&mut self.disk);
            Some(descend_leftmost(&mut store, root)?)
        } else {
            None
        };
        Ok(Scan {
            disk: &mut self.disk,
            leaf,
            slot: 0,
        })
    }

    /// Number of records in the tree (walks every leaf).
    pub fn len(&mut self) -> Result<usize> {
        let mut count = 0;
        for record in self.scan()? {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Whether the tree holds no records.
    ///
    /// True for a never-inserted tree and for an emptied-out leaf root.
    pub fn is_empty(&mut self) -> Result<bool> {
        if !self.root.is_valid() {
            return Ok(true);
        }
        let root = self.root;
        let mut store = NodeStore::new(&mut self.disk);
        Ok(match store.load(root)? {
            Node::Leaf(leaf) => leaf.records.is_empty(),
            Node::Internal(_) => false,
        })
    }

    /// Number of levels, counting the leaf level; 0 for an empty tree.
    pub fn height(&mut self) -> Result<usize> {
        if !self.root.is_valid() {
            return Ok(0);
        }
        let mut store = NodeStore::new(&mut self.disk);
        let mut levels = 1;
        let mut current = self.root;
        loop {
            match store.load(current)? {
                Node::Leaf(_) => return Ok(levels),
                Node::Internal(internal) => {
                    levels += 1;
                    current = internal.leftmost;
                }
            }
        }
    }

    /// Leaf fan-out constant.
    pub fn order_leaf(&self) -> usize {
        self.order_leaf
    }

    /// Internal fan-out constant.
    pub fn order_internal(&self) -> usize {
        self.order_internal
    }

    /// Read-only view of the underlying disk manager.
    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    /// Check every structural invariant of the tree.
    ///
    /// Verifies page checksums, key order, separator ranges, fan-out
    /// bounds, parent pointers, uniform leaf depth, and the leaf sibling
    /// chain. Intended for tests and offline integrity checks; returns the
    /// first violation as `Corruption`.
    pub fn validate(&mut self) -> Result<()> {
        if !self.root.is_valid() {
            return Ok(());
        }
        let root = self.root;
        let limits = Limits {
            min_leaf: self.min_leaf_keys(),
            max_leaf: self.order_leaf - 1,
            min_internal: self.min_internal_keys(),
            max_internal: self.order_internal - 1,
        };

        let mut store = NodeStore::new(&mut self.disk);
        let mut walk = Walk {
            leaves: Vec::new(),
            leaf_depth: None,
        };
        validate_node(&mut store, root, root, PageId::INVALID, None, None, 0, &limits, &mut walk)?;

        // Leaves must chain left to right exactly in traversal order.
        for pair in walk.leaves.windows(2) {
            let (page, sibling) = pair[0];
            if sibling != pair[1].0 {
                return Err(Error::corruption(page.0, "broken leaf sibling link"));
            }
        }
        if let Some(&(page, sibling)) = walk.leaves.last() {
            if sibling.is_valid() {
                return Err(Error::corruption(page.0, "rightmost leaf has a sibling"));
            }
        }
        Ok(())
    }

    /// Minimum keys a non-root leaf must hold: `ceil(ORDER_LEAF / 2) - 1`.
    pub(crate) fn min_leaf_keys(&self) -> usize {
        self.order_leaf.div_ceil(2) - 1
    }

    /// Minimum pairs a non-root internal node must hold.
    pub(crate) fn min_internal_keys(&self) -> usize {
        self.order_internal.div_ceil(2) - 1
    }

    /// Record a root change in memory and in the meta page.
    pub(crate) fn set_root(&mut self, root: PageId) -> Result<()> {
        self.root = root;
        self.write_meta()
    }

    fn write_meta(&mut self) -> Result<()> {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Meta));

        let root_offset = self.disk.offset_of(self.root);
        let data = page.as_mut_slice();
        data[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&META_MAGIC.to_le_bytes());
        data[OFFSET_ROOT..OFFSET_ROOT + 8].copy_from_slice(&root_offset.to_le_bytes());
        data[OFFSET_ORDER_LEAF..OFFSET_ORDER_LEAF + 2]
            .copy_from_slice(&(self.order_leaf as u16).to_le_bytes());
        data[OFFSET_ORDER_INTERNAL..OFFSET_ORDER_INTERNAL + 2]
            .copy_from_slice(&(self.order_internal as u16).to_le_bytes());

        page.update_checksum();
        self.disk.write_page(META_PAGE_ID, &page)
    }
}

/// Occupancy bounds for [`validate`](BPlusTree::validate).
struct Limits {
    min_leaf: usize,
    max_leaf: usize,
    min_internal: usize,
    max_internal: usize,
}

/// Traversal state for [`validate`](BPlusTree::validate).
struct Walk {
    /// `(page, right_sibling)` for every leaf, in key order.
    leaves: Vec<(PageId, PageId)>,
    leaf_depth: Option<usize>,
}

#[allow(clippy::too_many_arguments)]
fn validate_node(
    store: &mut NodeStore<'_>,
    page_id: PageId,
    root: PageId,
    expected_parent: PageId,
    low: Option<Key>,
    high: Option<Key>,
    depth: usize,
    limits: &Limits,
    walk: &mut Walk,
) -> Result<()> {
    let node = store.load(page_id)?;
    let is_root = page_id == root;

    if node.parent() != expected_parent {
        return Err(Error::corruption(page_id.0, "wrong parent pointer"));
    }

    let in_range = |key: Key| low.is_none_or(|l| l <= key) && high.is_none_or(|h| key < h);

    match node {
        Node::Leaf(leaf) => {
            if leaf.records.len() > limits.max_leaf
                || (!is_root && leaf.records.len() < limits.min_leaf)
            {
                return Err(Error::corruption(page_id.0, "leaf occupancy out of bounds"));
            }
            if !leaf.records.iter().all(|&(k, _)| in_range(k)) {
                return Err(Error::corruption(page_id.0, "leaf key outside its range"));
            }
            match walk.leaf_depth {
                None => walk.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(Error::corruption(page_id.0, "leaves at unequal depth"));
                }
                Some(_) => {}
            }
            walk.leaves.push((page_id, leaf.right_sibling));
        }
        Node::Internal(internal) => {
            if internal.entries.is_empty()
                || internal.entries.len() > limits.max_internal
                || (!is_root && internal.entries.len() < limits.min_internal)
            {
                return Err(Error::corruption(
                    page_id.0,
                    "internal occupancy out of bounds",
                ));
            }
            if !internal.entries.iter().all(|&(k, _)| in_range(k)) {
                return Err(Error::corruption(page_id.0, "separator outside its range"));
            }

            // Child i is bounded by separators i-1 and i.
            let child_count = internal.entries.len() + 1;
            for pos in 0..child_count {
                let child_low = if pos == 0 {
                    low
                } else {
                    Some(internal.entries[pos - 1].0)
                };
                let child_high = if pos == internal.entries.len() {
                    high
                } else {
                    Some(internal.entries[pos].0)
                };
                validate_node(
                    store,
                    internal.child_at(pos),
                    root,
                    page_id,
                    child_low,
                    child_high,
                    depth + 1,
                    limits,
                    walk,
                )?;
            }
        }
    }

    Ok(())
}

/// Forward iterator over all records, in ascending key order.
///
/// Created by [`BPlusTree::scan`]. Yields `Result` items because each leaf
/// hop re-reads a page from disk.
pub struct Scan<'a> {
    disk: &'a mut DiskManager,
    leaf: Option<LeafNode>,
    slot: usize,
}

impl Iterator for Scan<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;

            if self.slot < leaf.records.len() {
                let record = leaf.records[self.slot];
                self.slot += 1;
                return Some(Ok(record));
            }

            let next = leaf.right_sibling;
            if !next.is_valid() {
                self.leaf = None;
                return None;
            }
            match NodeStore::new(self.disk).load_leaf(next) {
                Ok(next_leaf) => {
                    self.leaf = Some(next_leaf);
                    self.slot = 0;
                }
                Err(e) => {
                    self.leaf = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
