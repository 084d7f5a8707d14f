//! Disk-backed page cache.
//!
//! Pages are read lazily: a page is only pulled off disk the first time
//! something asks for it, and every other module reaches the file only
//! through here. The page-is-on-disk/page-is-zeroed distinction matters
//! at table creation, where page 0 is materialized as an empty leaf
//! before anything is ever written to disk.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::Error;

pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: usize = 100;

pub type Page = [u8; PAGE_SIZE];

/// Owns the database file and a slot cache of up to [`TABLE_MAX_PAGES`]
/// pages. Slots are populated on first access and held until `flush_all`
/// or process exit.
pub struct Pager {
    file: File,
    file_length: u64,
    /// Number of pages implied by the file length at open time, grown as
    /// new pages are allocated.
    num_pages: u32,
    pages: Vec<Option<Box<Page>>>,
}

impl Pager {
    /// Opens (creating if absent) the database file at `path`.
    ///
    /// Returns [`Error::Corrupt`] if the file length is not a whole
    /// multiple of [`PAGE_SIZE`] — a file that size can't have been
    /// written by this engine.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let file_length = file.metadata()?.len();
        if file_length as usize % PAGE_SIZE != 0 {
            return Err(Error::Corrupt(format!(
                "file length {} is not a multiple of page size {}",
                file_length, PAGE_SIZE
            )));
        }
        let num_pages = (file_length as usize / PAGE_SIZE) as u32;
        debug!(path = %path.as_ref().display(), num_pages, "opened pager");
        let mut pages = Vec::with_capacity(TABLE_MAX_PAGES);
        pages.resize_with(TABLE_MAX_PAGES, || None);
        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    fn check_bounds(&self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(Error::PagerFull(page_num));
        }
        Ok(())
    }

    /// Returns a reference to `page_num`, reading it from disk on first
    /// access. Pages past the current end of file are zero-filled rather
    /// than read.
    pub fn get(&mut self, page_num: u32) -> Result<&Page, Error> {
        self.load(page_num)?;
        Ok(self.pages[page_num as usize].as_ref().unwrap())
    }

    /// Returns a mutable reference to `page_num`, loading it first if needed.
    pub fn get_mut(&mut self, page_num: u32) -> Result<&mut Page, Error> {
        self.load(page_num)?;
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    fn load(&mut self, page_num: u32) -> Result<(), Error> {
        self.check_bounds(page_num)?;
        if self.pages[page_num as usize].is_some() {
            return Ok(());
        }
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        if page_num < self.num_pages {
            let offset = page_num as u64 * PAGE_SIZE as u64;
            self.file.seek(SeekFrom::Start(offset))?;
            // A short read is tolerated: a crash mid-write can leave a
            // trailing partial page, and the rest is left zeroed.
            let mut read_so_far = 0;
            loop {
                let n = self.file.read(&mut buf[read_so_far..])?;
                if n == 0 {
                    break;
                }
                read_so_far += n;
                if read_so_far == PAGE_SIZE {
                    break;
                }
            }
            debug!(page_num, "loaded page from disk");
        }
        self.pages[page_num as usize] = Some(buf);
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(())
    }

    /// Writes `page_num`'s cached contents back to disk.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        self.check_bounds(page_num)?;
        let Some(page) = self.pages[page_num as usize].as_ref() else {
            return Ok(());
        };
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_ref())?;
        self.file_length = self.file_length.max(offset + PAGE_SIZE as u64);
        debug!(page_num, "flushed page to disk");
        Ok(())
    }

    /// Flushes every page that has been loaded into the cache.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            if self.pages[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        self.file.flush()?;
        Ok(())
    }

    /// Allocates a fresh page number past the current end of the table.
    ///
    /// This assumes pages are never freed once allocated, which holds for
    /// this engine: there is no delete operation, so `num_pages` only grows.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            warn!(error = %e, "failed to flush pager on drop");
        }
    }
}
