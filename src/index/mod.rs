//! Index structures.
//!
//! Currently a single structure: the disk-resident [`btree`] index.

pub mod btree;

pub use btree::{BPlusTree, DeleteOutcome, InsertOutcome};
