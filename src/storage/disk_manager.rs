//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating new pages and recycling freed ones
//! - Translating page IDs to and from on-disk byte offsets

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::{NO_PAGE_OFFSET, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`; that offset is also
/// how cross-page references are persisted inside node pages (see
/// [`offset_of`](Self::offset_of) / [`page_id_of`](Self::page_id_of)).
///
/// # Free List
/// Freed pages are stamped [`PageType::Free`] on disk and kept on an
/// in-memory free list for reuse by `allocate_page`. On `open` the list is
/// rebuilt by scanning page headers, so no separate free-list page exists.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**; callers serialize access.
///
/// # Durability
/// All writes are followed by `fsync()`. There is no write-ahead log: a
/// failed multi-page operation is not rolled back.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
    /// Page IDs available for reuse (LIFO).
    free_list: Vec<PageId>,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_list: Vec::new(),
        })
    }

    /// Open an existing database file.
    ///
    /// Rebuilds the free list by scanning every page header for
    /// [`PageType::Free`].
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let metadata = file.metadata()?;
        let file_size = metadata.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        // Rebuild the free list from page-type stamps.
        let mut free_list = Vec::new();
        let mut header_buf = [0u8; PageHeader::SIZE];
        for id in 0..page_count {
            file.seek(SeekFrom::Start((id as u64) * (PAGE_SIZE as u64)))?;
            file.read_exact(&mut header_buf)?;
            if PageHeader::from_bytes(&header_buf).page_type == PageType::Free {
                free_list.push(PageId::new(id));
            }
        }

        Ok(Self {
            file,
            page_count,
            free_list,
        })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated with `allocate_page()`.
    ///
    /// # Durability
    /// This method calls `fsync()` after writing.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?; // fsync for durability

        Ok(())
    }

    /// Allocate a page on disk.
    ///
    /// Reuses a freed page when one is available, otherwise extends the
    /// file with a zeroed page. Content is undefined until written.
    ///
    /// # Durability
    /// Extending the file calls `fsync()` so the allocation is durable.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(page_id) = self.free_list.pop() {
            return Ok(page_id);
        }

        let page_id = PageId::new(self.page_count);

        // Extend file with a zeroed page
        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;

        let zeros = [0u8; PAGE_SIZE];
        self.file.write_all(&zeros)?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Return a page to the free list for reuse.
    ///
    /// The page is stamped [`PageType::Free`] on disk so the list survives
    /// reopen. The caller must not read the page again afterward.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` for unallocated IDs and
    /// `Error::InvalidPageId` for a double free.
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        if self.free_list.contains(&page_id) {
            return Err(Error::InvalidPageId(page_id.0 as u64));
        }

        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Free));
        page.update_checksum();
        self.write_page(page_id, &page)?;

        self.free_list.push(page_id);
        Ok(())
    }

    /// Byte offset of a page within the file.
    ///
    /// [`PageId::INVALID`] maps to the [`NO_PAGE_OFFSET`] sentinel; this is
    /// the representation used for "no reference" inside node pages.
    #[inline]
    pub fn offset_of(&self, page_id: PageId) -> u64 {
        if page_id.is_valid() {
            (page_id.0 as u64) * (PAGE_SIZE as u64)
        } else {
            NO_PAGE_OFFSET
        }
    }

    /// Page ID for a byte offset, inverse of [`offset_of`](Self::offset_of).
    ///
    /// # Errors
    /// Returns `Error::InvalidPageId` if the offset is not page-aligned or
    /// out of the u32 ID range.
    pub fn page_id_of(&self, offset: u64) -> Result<PageId> {
        if offset == NO_PAGE_OFFSET {
            return Ok(PageId::INVALID);
        }
        if offset % (PAGE_SIZE as u64) != 0 {
            return Err(Error::InvalidPageId(offset));
        }
        let id = offset / (PAGE_SIZE as u64);
        if id >= u32::MAX as u64 {
            return Err(Error::InvalidPageId(offset));
        }
        Ok(PageId::new(id as u32))
    }

    /// Get the number of pages in the database (allocated + freed).
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of pages currently on the free list.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_list.len()
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
