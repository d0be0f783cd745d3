//! # Reusable Byte Buffer with Views
//!
//! `ByteBuffer` owns a growable byte array whose capacity only ever
//! increases. Growth doubles the backing array until it covers the request,
//! optionally preserving existing content. Access goes through short-lived
//! views:
//!
//! - [`ReadCursor`] / [`WriteCursor`]: byte-at-a-time access over a
//!   `[start, end)` window, with indexed peeks and `move_forward`.
//! - [`BlockReader`] / [`BlockWriter`]: bounds-checked bulk copies between
//!   the buffer and a foreign byte slice.
//!
//! Views never own memory; they borrow the buffer for their lifetime, so a
//! view can never observe a reallocation.

use eyre::{ensure, Result};

use super::{ReadBytes, WriteBytes};

pub struct ByteBuffer {
    data: Box<[u8]>,
}

impl ByteBuffer {
    /// Creates a buffer with at least `capacity` zeroed bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Grows the buffer until `capacity() >= required`, doubling each step.
    ///
    /// With `ignore_content` the old bytes need not survive the move; the
    /// grown buffer comes back zeroed. Shrinking never happens.
    pub fn resize(&mut self, required: usize, ignore_content: bool) {
        if self.data.len() >= required {
            return;
        }
        let mut capacity = self.data.len().max(1);
        while capacity < required {
            capacity *= 2;
        }
        let mut grown = vec![0u8; capacity].into_boxed_slice();
        if !ignore_content {
            grown[..self.data.len()].copy_from_slice(&self.data);
        }
        self.data = grown;
    }

    pub fn read_cursor(&self, start: usize, end: usize) -> Result<ReadCursor<'_>> {
        self.check_window(start, end)?;
        Ok(ReadCursor {
            data: &self.data,
            position: start,
            end,
        })
    }

    pub fn write_cursor(&mut self, start: usize, end: usize) -> Result<WriteCursor<'_>> {
        self.check_window(start, end)?;
        Ok(WriteCursor {
            data: &mut self.data,
            position: start,
            end,
        })
    }

    /// Bulk-copy view over the first `len` bytes of the buffer.
    pub fn block_reader(&self, len: usize) -> Result<BlockReader<'_>> {
        ensure!(
            len <= self.data.len(),
            "block view of {len} bytes exceeds buffer capacity {}",
            self.data.len()
        );
        Ok(BlockReader {
            data: &self.data[..len],
            position: 0,
        })
    }

    /// Bulk-copy view writing into the first `len` bytes of the buffer.
    pub fn block_writer(&mut self, len: usize) -> Result<BlockWriter<'_>> {
        ensure!(
            len <= self.data.len(),
            "block view of {len} bytes exceeds buffer capacity {}",
            self.data.len()
        );
        Ok(BlockWriter {
            data: &mut self.data[..len],
            position: 0,
        })
    }

    fn check_window(&self, start: usize, end: usize) -> Result<()> {
        ensure!(
            start <= end && end <= self.data.len(),
            "view [{start}, {end}) out of range for buffer of {} bytes",
            self.data.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("capacity", &self.data.len())
            .finish()
    }
}

pub struct ReadCursor<'a> {
    data: &'a [u8],
    position: usize,
    end: usize,
}

impl ReadCursor<'_> {
    /// Peeks at the byte `offset` positions ahead of the cursor.
    pub fn get(&self, offset: usize) -> Result<u8> {
        let at = self.position + offset;
        ensure!(at < self.end, "offset {offset} out of range for view");
        Ok(self.data[at])
    }

    pub fn move_forward(&mut self, count: usize) -> Result<()> {
        ensure!(
            count <= self.end - self.position,
            "cannot move {count} bytes forward, {} remain",
            self.end - self.position
        );
        self.position += count;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.end - self.position
    }
}

impl ReadBytes for ReadCursor<'_> {
    fn next_byte(&mut self) -> Result<u8> {
        ensure!(self.position < self.end, "read cursor past end of view");
        let byte = self.data[self.position];
        self.position += 1;
        Ok(byte)
    }
}

pub struct WriteCursor<'a> {
    data: &'a mut [u8],
    position: usize,
    end: usize,
}

impl WriteCursor<'_> {
    /// Sets the byte `offset` positions ahead of the cursor.
    pub fn set(&mut self, offset: usize, byte: u8) -> Result<()> {
        let at = self.position + offset;
        ensure!(at < self.end, "offset {offset} out of range for view");
        self.data[at] = byte;
        Ok(())
    }

    pub fn move_forward(&mut self, count: usize) -> Result<()> {
        ensure!(
            count <= self.end - self.position,
            "cannot move {count} bytes forward, {} remain",
            self.end - self.position
        );
        self.position += count;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.end - self.position
    }
}

impl WriteBytes for WriteCursor<'_> {
    fn put_byte(&mut self, byte: u8) -> Result<()> {
        ensure!(self.position < self.end, "write cursor past end of view");
        self.data[self.position] = byte;
        self.position += 1;
        Ok(())
    }
}

pub struct BlockReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl BlockReader<'_> {
    /// Copies the next `destination.len()` bytes out of the buffer.
    pub fn copy_into(&mut self, destination: &mut [u8]) -> Result<()> {
        let end = self.position + destination.len();
        ensure!(
            end <= self.data.len(),
            "copy of {} bytes overruns block view of {} bytes",
            destination.len(),
            self.data.len() - self.position
        );
        destination.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }
}

pub struct BlockWriter<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl BlockWriter<'_> {
    /// Copies `source` into the buffer at the view position.
    pub fn copy_from(&mut self, source: &[u8]) -> Result<()> {
        let end = self.position + source.len();
        ensure!(
            end <= self.data.len(),
            "copy of {} bytes overruns block view of {} bytes",
            source.len(),
            self.data.len() - self.position
        );
        self.data[self.position..end].copy_from_slice(source);
        self.position = end;
        Ok(())
    }
}
