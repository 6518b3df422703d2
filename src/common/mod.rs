//! Common types and utilities shared across arbordb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId) and record types (Key, Value)

pub mod config;
pub mod error;
mod page_id;
mod value;

pub use error::{Error, Result};
pub use page_id::PageId;
pub use value::{Key, Value};
