//! # Typed Tables
//!
//! A `Table<L>` maps logical record positions to byte regions of one or
//! two paged byte tables and runs the layout codec over them.
//!
//! ## Fixed Layout
//!
//! A fixed-size layout needs one stream: record `i` occupies
//! `[i * S, (i + 1) * S)` where `S` is the layout's fixed size. Addressing
//! is a multiplication; appends land at the end by construction.
//!
//! ## Variable Layout
//!
//! A variable-size layout needs two streams. The index stream holds one
//! fixed-width entry per record, a long start plus an int length, written
//! positionally at `position * INDEX_ENTRY_SIZE`. The data stream holds
//! the encoded payloads, always appended at its end. Overwriting a record
//! re-points its index entry and strands the old payload; the
//! fragmentation is accepted and never reclaimed here.

use eyre::{bail, ensure, eyre, Result};

use crate::storage::ByteTable;

use super::encoding::{self, SIZE_INT, SIZE_LONG};
use super::layout::Layout;

/// Byte width of one variable-layout index entry.
pub const INDEX_ENTRY_SIZE: u64 = (SIZE_LONG + SIZE_INT) as u64;

enum Streams {
    Fixed { bytes: ByteTable, record_size: u64 },
    Variable { index: ByteTable, data: ByteTable },
}

pub struct Table<L: Layout> {
    layout: L,
    streams: Streams,
}

impl<L: Layout> Table<L> {
    /// Single-stream table for a fixed-size layout.
    pub fn fixed(layout: L, bytes: ByteTable) -> Result<Self> {
        let record_size = match layout.fixed_size() {
            Some(size) => size as u64,
            None => bail!("fixed table requires a fixed-size layout"),
        };
        ensure!(
            bytes.len() % record_size == 0,
            "stream of {} bytes is not a whole number of {record_size}-byte records",
            bytes.len()
        );
        Ok(Self {
            layout,
            streams: Streams::Fixed { bytes, record_size },
        })
    }

    /// Two-stream table: fixed-width entries in `index`, payloads in
    /// `data`.
    pub fn variable(layout: L, index: ByteTable, data: ByteTable) -> Result<Self> {
        ensure!(
            index.len() % INDEX_ENTRY_SIZE == 0,
            "index stream of {} bytes is not a whole number of {INDEX_ENTRY_SIZE}-byte entries",
            index.len()
        );
        Ok(Self {
            layout,
            streams: Streams::Variable { index, data },
        })
    }

    pub fn len(&self) -> u64 {
        match &self.streams {
            Streams::Fixed { bytes, record_size } => bytes.len() / record_size,
            Streams::Variable { index, .. } => index.len() / INDEX_ENTRY_SIZE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&mut self, position: u64) -> Result<L::Value> {
        let count = self.len();
        ensure!(
            position < count,
            "record {position} out of range for table of {count} records"
        );
        match &mut self.streams {
            Streams::Fixed { bytes, record_size } => {
                let start = position * *record_size;
                let mut reader = bytes.reader(start, start + *record_size)?;
                self.layout.read(&mut reader)
            }
            Streams::Variable { index, data } => {
                let at = position * INDEX_ENTRY_SIZE;
                let mut entry = index.reader(at, at + INDEX_ENTRY_SIZE)?;
                let start = encoding::read_i64(&mut entry)?;
                let length = encoding::read_i32(&mut entry)?;
                ensure!(
                    start >= 0 && length >= 0,
                    "corrupted index entry ({start}, {length}) for record {position}"
                );
                let start = start as u64;
                let mut reader = data.reader(start, start + length as u64)?;
                self.layout.read(&mut reader)
            }
        }
    }

    /// Writes `value` at `position`; `position == len()` appends.
    pub fn write(&mut self, position: u64, value: &L::Value) -> Result<()> {
        let count = self.len();
        ensure!(
            position <= count,
            "record {position} out of range for table of {count} records"
        );
        match &mut self.streams {
            Streams::Fixed { bytes, record_size } => {
                let start = position * *record_size;
                let mut writer = bytes.writer(start, start + *record_size)?;
                self.layout.write(&mut writer, value)?;
                ensure!(
                    writer.remaining() == 0,
                    "layout advanced fewer bytes than its fixed size"
                );
            }
            Streams::Variable { index, data } => {
                let size = self.layout.size_of(value);
                let length = i32::try_from(size)
                    .map_err(|_| eyre!("record of {size} bytes is too large for an index entry"))?;
                let start = data.len();

                let at = position * INDEX_ENTRY_SIZE;
                let mut entry = index.writer(at, at + INDEX_ENTRY_SIZE)?;
                encoding::write_i64(&mut entry, start as i64)?;
                encoding::write_i32(&mut entry, length)?;

                let mut writer = data.writer(start, start + size as u64)?;
                self.layout.write(&mut writer, value)?;
                ensure!(
                    writer.remaining() == 0,
                    "layout advanced fewer bytes than its declared size"
                );
            }
        }
        Ok(())
    }

    /// Flushes the underlying byte table(s) without closing.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.streams {
            Streams::Fixed { bytes, .. } => bytes.flush(),
            Streams::Variable { index, data } => {
                index.flush()?;
                data.flush()
            }
        }
    }

    /// Closes the underlying byte table(s), persisting their lengths.
    pub fn close(self) -> Result<()> {
        match self.streams {
            Streams::Fixed { bytes, .. } => bytes.close(),
            Streams::Variable { index, data } => {
                index.close()?;
                data.close()
            }
        }
    }
}
