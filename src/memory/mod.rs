//! # Byte Streams and Reusable Buffers
//!
//! This module provides the byte-level plumbing shared by the storage and
//! records layers:
//!
//! - [`ReadBytes`] / [`WriteBytes`]: minimal byte-at-a-time stream traits.
//!   The record codec is written against these, so the same encoder runs
//!   over an in-memory buffer or over a paged byte table without copies.
//! - [`ByteBuffer`]: a reusable, doubling byte array with cursor views
//!   (byte-at-a-time) and block views (bulk copy). Container header blocks
//!   are held in one of these.
//!
//! ## View Safety
//!
//! Views borrow the buffer. Growing the buffer reallocates its backing
//! array, which would invalidate any outstanding view; the borrow checker
//! rejects that at compile time, so views are simply re-taken after a
//! `resize` instead of being re-anchored at runtime.

mod byte_buffer;

pub use byte_buffer::{BlockReader, BlockWriter, ByteBuffer, ReadCursor, WriteCursor};

use eyre::Result;

/// A byte source the record codec can decode from.
pub trait ReadBytes {
    /// Returns the next byte and advances past it.
    fn next_byte(&mut self) -> Result<u8>;
}

/// A byte sink the record codec can encode into.
pub trait WriteBytes {
    /// Appends one byte and advances past it.
    fn put_byte(&mut self, byte: u8) -> Result<()>;
}
