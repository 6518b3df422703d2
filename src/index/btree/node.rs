//! B+ tree node representation and its on-disk codec.
//!
//! A node is materialized from a [`Page`] for the duration of one tree
//! operation and written back through [`encode`](Node::encode) if mutated.
//! The codec reads and writes named fields at fixed offsets; a page is never
//! aliased as a typed structure, so the layout is independent of in-memory
//! representation.
//!
//! # On-Disk Layout
//! ```text
//! Offset  Size   Leaf page                Internal page
//! ------  ----   ---------                -------------
//! 0       5      PageHeader               PageHeader
//! 5       8      parent offset            parent offset
//! 13      2      num_keys                 num_keys
//! 15      8      right-sibling offset     leftmost-child offset
//! 23      16×n   (key, value) records     (key, child offset) pairs
//! ```
//!
//! All integers are little-endian. Cross-page references are byte offsets
//! translated through the disk manager; `u64::MAX` means "no reference".
//! Unused slots past `num_keys` are undefined.

use crate::common::config::{KEY_SIZE, PAGE_SIZE, VALUE_SIZE};
use crate::common::{Error, Key, PageId, Result, Value};
use crate::storage::page::{Page, PageHeader, PageType};
use crate::storage::DiskManager;

/// Offset of the parent reference, right after the page header.
const OFFSET_PARENT: usize = PageHeader::SIZE;
/// Offset of the key count.
const OFFSET_NUM_KEYS: usize = OFFSET_PARENT + 8;
/// Offset of the right-sibling (leaf) or leftmost-child (internal) reference.
const OFFSET_SIDE_REF: usize = OFFSET_NUM_KEYS + 2;
/// Offset of the first record / pair slot.
const OFFSET_SLOTS: usize = OFFSET_SIDE_REF + 8;

/// Bytes per leaf record and per internal pair (both 16).
const SLOT_SIZE: usize = KEY_SIZE + VALUE_SIZE;

/// Records a leaf page can hold.
pub const LEAF_CAPACITY: usize = (PAGE_SIZE - OFFSET_SLOTS) / SLOT_SIZE;
/// (key, child) pairs an internal page can hold.
pub const INTERNAL_CAPACITY: usize = (PAGE_SIZE - OFFSET_SLOTS) / SLOT_SIZE;

/// Largest leaf order the page layout supports (`capacity = order - 1`).
pub const MAX_ORDER_LEAF: usize = LEAF_CAPACITY + 1;
/// Largest internal order the page layout supports.
pub const MAX_ORDER_INTERNAL: usize = INTERNAL_CAPACITY + 1;

/// A leaf node: ordered `(key, value)` records plus the right-sibling link.
///
/// Leaves form a singly linked list in ascending key order; the list is the
/// only traversal path that does not descend from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    /// Page this node was read from (not persisted inside the page).
    pub page_id: PageId,
    /// Parent page, `INVALID` for the root.
    pub parent: PageId,
    /// Sorted records, strictly increasing by key.
    pub records: Vec<(Key, Value)>,
    /// Next leaf in key order, `INVALID` for the rightmost leaf.
    pub right_sibling: PageId,
}

/// An internal node: a leftmost child plus ordered `(separator, child)` pairs.
///
/// The leftmost child holds all keys less than the first separator; the
/// child paired with separator *i* holds keys in `[sep_i, sep_{i+1})`. An
/// internal node always has exactly `entries.len() + 1` children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// Page this node was read from (not persisted inside the page).
    pub page_id: PageId,
    /// Parent page, `INVALID` for the root.
    pub parent: PageId,
    /// Child holding keys below the first separator.
    pub leftmost: PageId,
    /// Sorted separator/child pairs, strictly increasing by key.
    pub entries: Vec<(Key, PageId)>,
}

/// A decoded B+ tree node, leaf or internal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl LeafNode {
    /// Fresh empty leaf on `page_id` with no parent and no sibling.
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            parent: PageId::INVALID,
            records: Vec::new(),
            right_sibling: PageId::INVALID,
        }
    }

    /// Position of the first record whose key is not less than `key`.
    ///
    /// Equality at the returned index means the key exists; an index of
    /// `records.len()` means every key compares less than `key`.
    pub fn locate(&self, key: Key) -> usize {
        self.records.partition_point(|&(k, _)| k < key)
    }

    /// Look up `key`, returning its value if present.
    pub fn get(&self, key: Key) -> Option<Value> {
        let idx = self.locate(key);
        match self.records.get(idx) {
            Some(&(k, v)) if k == key => Some(v),
            _ => None,
        }
    }
}

impl InternalNode {
    /// Fresh empty internal node on `page_id`.
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            parent: PageId::INVALID,
            leftmost: PageId::INVALID,
            entries: Vec::new(),
        }
    }

    /// Child that may contain `key`.
    ///
    /// The leftmost child when `key` is below every separator, otherwise
    /// the child of the last separator not greater than `key` (separator
    /// ranges are inclusive on the left).
    pub fn child_for(&self, key: Key) -> PageId {
        let idx = self.entries.partition_point(|&(sep, _)| sep <= key);
        if idx == 0 {
            self.leftmost
        } else {
            self.entries[idx - 1].1
        }
    }

    /// Child slot index of `child`: 0 for the leftmost pointer, `i + 1` for
    /// the child of `entries[i]`. `None` if `child` is not referenced here.
    pub fn position_of_child(&self, child: PageId) -> Option<usize> {
        if self.leftmost == child {
            return Some(0);
        }
        self.entries
            .iter()
            .position(|&(_, c)| c == child)
            .map(|i| i + 1)
    }

    /// Child page at slot `pos` (0 = leftmost).
    ///
    /// # Panics
    /// Panics if `pos > entries.len()`.
    pub fn child_at(&self, pos: usize) -> PageId {
        if pos == 0 {
            self.leftmost
        } else {
            self.entries[pos - 1].1
        }
    }

    /// Every child referenced by this node, leftmost first.
    pub fn children(&self) -> impl Iterator<Item = PageId> + '_ {
        std::iter::once(self.leftmost).chain(self.entries.iter().map(|&(_, c)| c))
    }
}

impl Node {
    /// Page this node was read from.
    pub fn page_id(&self) -> PageId {
        match self {
            Node::Leaf(leaf) => leaf.page_id,
            Node::Internal(internal) => internal.page_id,
        }
    }

    /// Parent page, `INVALID` for the root.
    pub fn parent(&self) -> PageId {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        }
    }

    /// Overwrite the parent reference.
    pub fn set_parent(&mut self, parent: PageId) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }

    /// Count of occupied key slots.
    pub fn num_keys(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.records.len(),
            Node::Internal(internal) => internal.entries.len(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Decode a node from its page.
    ///
    /// Inverse of [`encode`](Self::encode) for any node satisfying the
    /// data-model invariants. A page whose type flag, key count, or key
    /// order is inconsistent is a fatal `Corruption` error.
    pub fn decode(disk: &DiskManager, page_id: PageId, page: &Page) -> Result<Node> {
        let data = page.as_slice();
        let header = page.header();

        let capacity = match header.page_type {
            PageType::BTreeLeaf => LEAF_CAPACITY,
            PageType::BTreeInternal => INTERNAL_CAPACITY,
            other => {
                return Err(Error::corruption(
                    page_id.0,
                    format!("expected a node page, found {:?}", other),
                ))
            }
        };

        let parent = disk.page_id_of(read_u64(data, OFFSET_PARENT))?;
        let num_keys = read_u16(data, OFFSET_NUM_KEYS) as usize;
        if num_keys > capacity {
            return Err(Error::corruption(
                page_id.0,
                format!("key count {} exceeds capacity {}", num_keys, capacity),
            ));
        }

        let node = match header.page_type {
            PageType::BTreeLeaf => {
                let right_sibling = disk.page_id_of(read_u64(data, OFFSET_SIDE_REF))?;
                let mut records = Vec::with_capacity(num_keys);
                for slot in 0..num_keys {
                    let at = OFFSET_SLOTS + slot * SLOT_SIZE;
                    let key = read_key(data, at);
                    let mut value = [0u8; VALUE_SIZE];
                    value.copy_from_slice(&data[at + KEY_SIZE..at + SLOT_SIZE]);
                    records.push((key, Value(value)));
                }
                Node::Leaf(LeafNode {
                    page_id,
                    parent,
                    records,
                    right_sibling,
                })
            }
            PageType::BTreeInternal => {
                let leftmost = disk.page_id_of(read_u64(data, OFFSET_SIDE_REF))?;
                if !leftmost.is_valid() {
                    return Err(Error::corruption(
                        page_id.0,
                        "internal node without a leftmost child",
                    ));
                }
                let mut entries = Vec::with_capacity(num_keys);
                for slot in 0..num_keys {
                    let at = OFFSET_SLOTS + slot * SLOT_SIZE;
                    let key = read_key(data, at);
                    let child = disk.page_id_of(read_u64(data, at + KEY_SIZE))?;
                    if !child.is_valid() {
                        return Err(Error::corruption(
                            page_id.0,
                            format!("missing child for separator at slot {}", slot),
                        ));
                    }
                    entries.push((key, child));
                }
                Node::Internal(InternalNode {
                    page_id,
                    parent,
                    leftmost,
                    entries,
                })
            }
            _ => unreachable!(),
        };

        check_sorted(&node)?;
        Ok(node)
    }

    /// Encode this node into a fresh page, checksum included.
    pub fn encode(&self, disk: &DiskManager) -> Page {
        match self {
            Node::Leaf(leaf) => leaf.encode(disk),
            Node::Internal(internal) => internal.encode(disk),
        }
    }
}

/// Shared header fields: page type, parent reference, key count.
fn start_node_page(disk: &DiskManager, page_type: PageType, parent: PageId, num_keys: usize) -> Page {
    let mut page = Page::new();
    page.set_header(&PageHeader::new(page_type));
    let data = page.as_mut_slice();
    write_u64(data, OFFSET_PARENT, disk.offset_of(parent));
    write_u16(data, OFFSET_NUM_KEYS, num_keys as u16);
    page
}

impl LeafNode {
    /// Encode into a fresh page, checksum included.
    pub fn encode(&self, disk: &DiskManager) -> Page {
        let mut page = start_node_page(disk, PageType::BTreeLeaf, self.parent, self.records.len());
        let data = page.as_mut_slice();
        write_u64(data, OFFSET_SIDE_REF, disk.offset_of(self.right_sibling));
        for (slot, &(key, value)) in self.records.iter().enumerate() {
            let at = OFFSET_SLOTS + slot * SLOT_SIZE;
            write_key(data, at, key);
            data[at + KEY_SIZE..at + SLOT_SIZE].copy_from_slice(value.as_bytes());
        }
        page.update_checksum();
        page
    }
}

impl InternalNode {
    /// Encode into a fresh page, checksum included.
    pub fn encode(&self, disk: &DiskManager) -> Page {
        let mut page = start_node_page(
            disk,
            PageType::BTreeInternal,
            self.parent,
            self.entries.len(),
        );
        let data = page.as_mut_slice();
        write_u64(data, OFFSET_SIDE_REF, disk.offset_of(self.leftmost));
        for (slot, &(key, child)) in self.entries.iter().enumerate() {
            let at = OFFSET_SLOTS + slot * SLOT_SIZE;
            write_key(data, at, key);
            write_u64(data, at + KEY_SIZE, disk.offset_of(child));
        }
        page.update_checksum();
        page
    }
}

/// Keys within a node must be strictly increasing.
fn check_sorted(node: &Node) -> Result<()> {
    let sorted = match node {
        Node::Leaf(leaf) => leaf.records.windows(2).all(|w| w[0].0 < w[1].0),
        Node::Internal(internal) => internal.entries.windows(2).all(|w| w[0].0 < w[1].0),
    };
    if sorted {
        Ok(())
    } else {
        Err(Error::corruption(
            node.page_id().0,
            "keys are not strictly increasing",
        ))
    }
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn write_u16(data: &mut [u8], at: usize, v: u16) {
    data[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn write_u64(data: &mut [u8], at: usize, v: u64) {
    data[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn read_key(data: &[u8], at: usize) -> Key {
    let mut buf = [0u8; KEY_SIZE];
    buf.copy_from_slice(&data[at..at + KEY_SIZE]);
    Key::from_le_bytes(buf)
}

#[inline]
fn write_key(data: &mut [u8], at: usize, key: Key) {
    data[at..at + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
}

// ============================================================================
// TESTS
// ============================================================================
