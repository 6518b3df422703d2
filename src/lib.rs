//! arbordb - A disk-backed B+ tree index engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         arbordb                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                    │   │
//! │  │   BPlusTree: find / insert / delete / scan           │   │
//! │  │   node codec + per-operation node store              │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                              ↓                              │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                   │   │
//! │  │   DiskManager + Page + PageHeader + free list        │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The index maps fixed-size keys ([`Key`], an `i64`) to fixed-size values
//! ([`Value`], an 8-byte record locator), persisting every structural
//! change to 4KB pages. The table layer that resolves values to full
//! records sits above this crate; transactions, WAL, and concurrent access
//! are out of scope.
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Key/Value, Error, config)
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+ tree index
//!
//! # Quick Start
//! ```no_run
//! use arbordb::index::btree::BPlusTree;
//! use arbordb::Value;
//!
//! // Create a tree with fan-out 128 at both levels
//! let mut tree = BPlusTree::create("my_index.db", 128, 128).unwrap();
//!
//! tree.insert(42, Value::from_u64(7)).unwrap();
//! assert_eq!(tree.find(42).unwrap(), Some(Value::from_u64(7)));
//! ```

// Core modules
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, Key, PageId, Result, Value};

pub use index::btree::{BPlusTree, DeleteOutcome, InsertOutcome};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
