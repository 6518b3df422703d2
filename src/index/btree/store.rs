//! Node Store - loads and persists nodes for a single tree operation.
//!
//! A [`NodeStore`] borrows the disk manager for the duration of one
//! `find`/`insert`/`delete` call. Nodes are loaded as owned values (strict
//! per-call-frame ownership, never aliased) and written back explicitly.
//! There is no cross-call cache: repeated operations re-read pages.

use tracing::trace;

use crate::common::{Error, PageId, Result};
use crate::index::btree::node::{InternalNode, LeafNode, Node};
use crate::storage::DiskManager;

/// Per-operation view of the tree's pages.
pub(crate) struct NodeStore<'a> {
    disk: &'a mut DiskManager,
}

impl<'a> NodeStore<'a> {
    pub fn new(disk: &'a mut DiskManager) -> Self {
        Self { disk }
    }

    /// Load and decode the node stored on `page_id`.
    ///
    /// # Errors
    /// `Corruption` on checksum mismatch or an invalid node page.
    pub fn load(&mut self, page_id: PageId) -> Result<Node> {
        let page = self.disk.read_page(page_id)?;
        if !page.verify_checksum() {
            return Err(Error::corruption(page_id.0, "checksum mismatch"));
        }
        trace!(page = page_id.0, "load node");
        Node::decode(self.disk, page_id, &page)
    }

    /// Load a node that must be a leaf.
    pub fn load_leaf(&mut self, page_id: PageId) -> Result<LeafNode> {
        match self.load(page_id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(Error::corruption(page_id.0, "expected a leaf node")),
        }
    }

    /// Load a node that must be internal.
    pub fn load_internal(&mut self, page_id: PageId) -> Result<InternalNode> {
        match self.load(page_id)? {
            Node::Internal(internal) => Ok(internal),
            Node::Leaf(_) => Err(Error::corruption(page_id.0, "expected an internal node")),
        }
    }

    /// Encode and write a node back to its page.
    pub fn save(&mut self, node: &Node) -> Result<()> {
        let page = node.encode(self.disk);
        trace!(page = node.page_id().0, "save node");
        self.disk.write_page(node.page_id(), &page)
    }

    pub fn save_leaf(&mut self, leaf: &LeafNode) -> Result<()> {
        let page = leaf.encode(self.disk);
        trace!(page = leaf.page_id.0, "save leaf");
        self.disk.write_page(leaf.page_id, &page)
    }

    pub fn save_internal(&mut self, internal: &InternalNode) -> Result<()> {
        let page = internal.encode(self.disk);
        trace!(page = internal.page_id.0, "save internal");
        self.disk.write_page(internal.page_id, &page)
    }

    /// Reserve a page for a new node.
    pub fn alloc(&mut self) -> Result<PageId> {
        self.disk.allocate_page()
    }

    /// Return a node's page to the allocator. The node must not be used again.
    pub fn free(&mut self, page_id: PageId) -> Result<()> {
        trace!(page = page_id.0, "free node");
        self.disk.free_page(page_id)
    }

    /// Pages in the backing file, an upper bound on tree height.
    pub fn page_count(&self) -> u32 {
        self.disk.page_count()
    }

    /// Rewrite a node's parent reference in place.
    pub fn set_parent(&mut self, page_id: PageId, parent: PageId) -> Result<()> {
        let mut node = self.load(page_id)?;
        node.set_parent(parent);
        self.save(&node)
    }
}
