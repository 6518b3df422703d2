//! Configuration constants for arbordb.

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes (PostgreSQL uses 8KB, but 4KB is also standard)
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 = 4,294,967,296 pages
/// - Max database size: 4,294,967,296 × 4KB = 16TB
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Size of an index key on disk (i64, little-endian).
pub const KEY_SIZE: usize = 8;

/// Size of a value payload on disk.
///
/// Values are fixed-size record locators; the table layer above this crate
/// is responsible for resolving them to full records.
pub const VALUE_SIZE: usize = 8;

/// Size of a serialized cross-page reference (a byte offset).
pub const PAGE_REF_SIZE: usize = 8;

/// On-disk sentinel offset meaning "no page reference".
///
/// Cross-page references (parent, sibling, child) are persisted as byte
/// offsets; this value round-trips with [`PageId::INVALID`] through the
/// disk manager's id↔offset mapping.
///
/// [`PageId::INVALID`]: crate::common::PageId::INVALID
pub const NO_PAGE_OFFSET: u64 = u64::MAX;

/// Smallest usable tree order.
///
/// Order 3 gives a minimum occupancy of `ceil(3/2) - 1 = 1` key, the
/// smallest value for which borrow/merge repair is well-defined.
pub const MIN_ORDER: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(KEY_SIZE + VALUE_SIZE, 16);
        assert_eq!(KEY_SIZE + PAGE_REF_SIZE, 16);
    }
}
