//! # Paged Byte Table
//!
//! `ByteTable` turns a block container into a synchronous, random-access
//! byte array. Bytes live on pages (one per block) held in an LRU cache;
//! a miss loads the block, an eviction of a modified page writes it back.
//! The table's logical length (`element_count`) is persisted in the first
//! 8 bytes of the container's header block.
//!
//! ## Background I/O Discipline
//!
//! The table owns at most one in-flight read and one in-flight write:
//!
//! - After a read of block `b`, block `b + 1` is prefetched into the read
//!   slot if it exists, is not cached, and neither slot already covers it.
//! - Evicting a modified page drains the write slot, then occupies it with
//!   the page's write-back. Clean pages just return their buffer to a
//!   recycle stack.
//! - A miss first checks the read slot (the prefetch may already carry the
//!   block), then drains a write slot targeting the same block before
//!   reading it back, so a block transfer never overlaps itself.
//! - Touching the block one past the end extends the table: the block
//!   count is bumped and a zeroed buffer is written in the background, so
//!   the growth is durable even if the page is never modified again.
//!
//! The cache keys, the read-slot block, and the write-slot block are
//! pairwise disjoint at every suspension point.

use std::sync::Arc;

use eyre::{ensure, Result};
use smallvec::SmallVec;
use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::config::TABLE_HEADER_SIZE;
use crate::memory::{ReadBytes, WriteBytes};

use super::cache::{CacheBacking, LruCache};
use super::{read_header, BlockBuf, BlockFile, IoTicket, TableHeader};

/// One cached block.
struct Page {
    id: u64,
    modified: bool,
    bytes: BlockBuf,
}

/// Block-level state behind the cache: the container handle, the two
/// background slots, and the buffer recycle stack.
struct PageStore {
    file: Arc<BlockFile>,
    block_size: usize,
    block_count: u64,
    pending_read: Option<IoTicket>,
    pending_write: Option<IoTicket>,
    recycled: SmallVec<[BlockBuf; 8]>,
}

impl PageStore {
    fn drain_write(&mut self) -> Result<()> {
        if let Some(ticket) = self.pending_write.take() {
            let buf = ticket.wait()?;
            self.recycled.push(buf);
        }
        Ok(())
    }

    fn drain_read(&mut self) -> Result<()> {
        if let Some(ticket) = self.pending_read.take() {
            let buf = ticket.wait()?;
            self.recycled.push(buf);
        }
        Ok(())
    }

    fn take_buf(&mut self) -> BlockBuf {
        self.recycled
            .pop()
            .unwrap_or_else(|| vec![0u8; self.block_size].into_boxed_slice())
    }

    fn take_zeroed_buf(&mut self) -> BlockBuf {
        let mut buf = self.take_buf();
        buf.fill(0);
        buf
    }
}

impl CacheBacking<u64, Page> for PageStore {
    fn load(&mut self, block: &u64) -> Result<Page> {
        let block = *block;

        if block == self.block_count {
            // trailing extension: persist the new block as zeroes right
            // away so growth survives even if the page stays untouched
            self.block_count += 1;
            self.drain_write()?;
            let zeroed = self.take_zeroed_buf();
            let ticket = self.file.write_block(block, zeroed)?;
            self.pending_write = Some(ticket);
            trace!(block, "block appended");
            return Ok(Page {
                id: block,
                modified: true,
                bytes: self.take_zeroed_buf(),
            });
        }

        if self.pending_read.as_ref().is_some_and(|t| t.block() == block) {
            if let Some(ticket) = self.pending_read.take() {
                let bytes = ticket.wait()?;
                trace!(block, "prefetch consumed");
                return Ok(Page {
                    id: block,
                    modified: false,
                    bytes,
                });
            }
        }

        if self.pending_write.as_ref().is_some_and(|t| t.block() == block) {
            self.drain_write()?;
        }
        self.drain_read()?;

        let buf = self.take_buf();
        let bytes = self.file.read_block(block, buf)?.wait()?;
        trace!(block, "block read");
        Ok(Page {
            id: block,
            modified: false,
            bytes,
        })
    }

    fn unload(&mut self, _block: u64, page: Page) -> Result<()> {
        if page.modified {
            self.drain_write()?;
            trace!(block = page.id, "page written back");
            let ticket = self.file.write_block(page.id, page.bytes)?;
            self.pending_write = Some(ticket);
        } else {
            self.recycled.push(page.bytes);
        }
        Ok(())
    }
}

pub struct ByteTable {
    cache: LruCache<u64, Page>,
    pages: PageStore,
    element_count: u64,
}

impl ByteTable {
    /// Builds a table over `file`, recovering the element count from the
    /// container's header block.
    pub fn new(file: Arc<BlockFile>, cache_capacity: usize) -> Result<Self> {
        let block_size = file.block_size();
        ensure!(
            block_size >= TABLE_HEADER_SIZE,
            "block size {block_size} cannot hold the {TABLE_HEADER_SIZE}-byte table header"
        );

        let element_count = {
            let header = file.header()?;
            let mut field = [0u8; TABLE_HEADER_SIZE];
            header.block_reader(TABLE_HEADER_SIZE)?.copy_into(&mut field)?;
            let parsed: TableHeader = read_header(&field, "table header")?;
            let count = parsed.element_count.get();
            ensure!(count >= 0, "corrupted element count {count}");
            count as u64
        };

        let block_count = file.block_count();
        Ok(Self {
            cache: LruCache::with_capacity(cache_capacity)?,
            pages: PageStore {
                file,
                block_size,
                block_count,
                pending_read: None,
                pending_write: None,
                recycled: SmallVec::new(),
            },
            element_count,
        })
    }

    /// Logical length in bytes.
    pub fn len(&self) -> u64 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    pub fn block_size(&self) -> usize {
        self.pages.block_size
    }

    pub fn read_byte(&mut self, index: u64) -> Result<u8> {
        ensure!(
            index < self.element_count,
            "index {index} out of range for table of {} bytes",
            self.element_count
        );
        let block_size = self.pages.block_size as u64;
        let (block, offset) = (index / block_size, (index % block_size) as usize);
        let byte = self.cache.get(block, &mut self.pages)?.bytes[offset];
        self.prefetch_after(block)?;
        Ok(byte)
    }

    /// Sets the byte at `index`; `index == len()` appends.
    pub fn write_byte(&mut self, index: u64, byte: u8) -> Result<()> {
        ensure!(
            index <= self.element_count,
            "index {index} out of range for table of {} bytes",
            self.element_count
        );
        if index == self.element_count {
            self.element_count += 1;
        }
        let block_size = self.pages.block_size as u64;
        let (block, offset) = (index / block_size, (index % block_size) as usize);
        let page = self.cache.get(block, &mut self.pages)?;
        page.modified = true;
        page.bytes[offset] = byte;
        Ok(())
    }

    /// Byte-at-a-time reader over `[start, end)`.
    pub fn reader(&mut self, start: u64, end: u64) -> Result<TableReader<'_>> {
        ensure!(
            start <= end && end <= self.element_count,
            "range [{start}, {end}) out of range for table of {} bytes",
            self.element_count
        );
        Ok(TableReader {
            table: self,
            position: start,
            end,
        })
    }

    /// Byte-at-a-time writer over `[start, end)`; the window may extend
    /// past the current length, in which case the bytes are appended.
    pub fn writer(&mut self, start: u64, end: u64) -> Result<TableWriter<'_>> {
        ensure!(
            start <= end && start <= self.element_count,
            "range [{start}, {end}) out of range for table of {} bytes",
            self.element_count
        );
        Ok(TableWriter {
            table: self,
            position: start,
            end,
        })
    }

    /// Pushes every cached page out and drains the background slots
    /// without giving up the table.
    pub fn flush(&mut self) -> Result<()> {
        self.cache.clear(&mut self.pages)?;
        self.pages.drain_write()?;
        self.pages.drain_read()?;
        self.store_element_count()?;
        Ok(())
    }

    /// Flushes dirty pages, persists the element count into the header
    /// block, and closes the container.
    pub fn close(mut self) -> Result<()> {
        self.cache.clear(&mut self.pages)?;
        self.pages.drain_write()?;
        self.pages.drain_read()?;
        self.store_element_count()?;
        debug!(
            container = %self.pages.file.name(),
            element_count = self.element_count,
            "byte table closed"
        );
        self.pages.file.close()
    }

    fn store_element_count(&self) -> Result<()> {
        let field = TableHeader {
            element_count: (self.element_count as i64).into(),
        };
        let mut header = self.pages.file.header()?;
        header
            .block_writer(TABLE_HEADER_SIZE)?
            .copy_from(field.as_bytes())?;
        Ok(())
    }

    fn prefetch_after(&mut self, block: u64) -> Result<()> {
        let next = block + 1;
        if next >= self.pages.block_count || self.cache.contains(&next) {
            return Ok(());
        }
        // one read in flight at most; an occupied slot wins over a prefetch
        if self.pages.pending_read.is_some() {
            return Ok(());
        }
        if self.pages.pending_write.as_ref().is_some_and(|t| t.block() == next) {
            return Ok(());
        }
        let buf = self.pages.take_buf();
        let ticket = self.pages.file.read_block(next, buf)?;
        self.pages.pending_read = Some(ticket);
        Ok(())
    }
}

impl std::fmt::Debug for ByteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteTable")
            .field("container", &self.pages.file.name())
            .field("element_count", &self.element_count)
            .field("block_count", &self.pages.block_count)
            .finish()
    }
}

/// Advancing read cursor over a byte range of a table.
pub struct TableReader<'a> {
    table: &'a mut ByteTable,
    position: u64,
    end: u64,
}

impl TableReader<'_> {
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }
}

impl ReadBytes for TableReader<'_> {
    fn next_byte(&mut self) -> Result<u8> {
        ensure!(
            self.position < self.end,
            "read cursor exhausted at byte {}",
            self.position
        );
        let byte = self.table.read_byte(self.position)?;
        self.position += 1;
        Ok(byte)
    }
}

/// Advancing write cursor over a byte range of a table.
pub struct TableWriter<'a> {
    table: &'a mut ByteTable,
    position: u64,
    end: u64,
}

impl TableWriter<'_> {
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }
}

impl WriteBytes for TableWriter<'_> {
    fn put_byte(&mut self, byte: u8) -> Result<()> {
        ensure!(
            self.position < self.end,
            "write cursor exhausted at byte {}",
            self.position
        );
        self.table.write_byte(self.position, byte)?;
        self.position += 1;
        Ok(())
    }
}
