//! Error types for arbordb.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in arbordb.
///
/// Expected outcomes of normal operation (key not found, duplicate key) are
/// *not* errors; they are reported through [`InsertOutcome`] /
/// [`DeleteOutcome`] and `Option` returns. Everything here is fatal for the
/// current operation: no retry, no partial-state rollback.
///
/// [`InsertOutcome`]: crate::index::btree::InsertOutcome
/// [`DeleteOutcome`]: crate::index::btree::DeleteOutcome
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// The provided page ID or serialized page reference is invalid.
    #[error("invalid page reference: {0}")]
    InvalidPageId(u64),

    /// A decoded page violates structural invariants.
    ///
    /// Bad page-type flag, key count out of range, non-monotonic keys, or a
    /// checksum mismatch. Never repaired; surfaced to the caller as-is.
    #[error("page {page_id} is corrupted: {reason}")]
    Corruption { page_id: u32, reason: String },

    /// Tree order outside the supported range.
    #[error("unsupported tree order: {0}")]
    InvalidOrder(usize),
}

impl Error {
    pub(crate) fn corruption(page_id: u32, reason: impl Into<String>) -> Self {
        Error::Corruption {
            page_id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::corruption(7, "bad page type 9");
        assert_eq!(format!("{}", err), "page 7 is corrupted: bad page type 9");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
