//! # Storage Module
//!
//! The storage layer turns fixed-size block I/O into synchronous random
//! access to bytes. It is built bottom-up:
//!
//! - [`ident`]: validated, normalized container names.
//! - [`BlockStore`] / [`BlockFile`]: a workspace directory of container
//!   files, each a sequence of equal-sized blocks behind an in-band header
//!   block, with background block reads and writes per container.
//! - [`LruCache`]: a recency cache that loads on miss and unloads on
//!   eviction through a [`CacheBacking`].
//! - [`ByteTable`]: a random-access byte array over one container, paging
//!   blocks through the cache with one-ahead prefetch and write-behind.
//!
//! ## Container File Format
//!
//! ```text
//! ┌────────────┬──────────────┬─────────┬─────────┬────
//! │ block size │ header block │ block 0 │ block 1 │ ...
//! │ (4, LE)    │ (block size) │         │         │
//! └────────────┴──────────────┴─────────┴─────────┴────
//! ```
//!
//! The header block belongs to whatever sits on top of the container; a
//! [`ByteTable`] keeps its element count in the first 8 bytes.
//!
//! ## Threading
//!
//! Handles are `Arc`-shared and internally synchronized, but the layers
//! above are single-writer by design: one `ByteTable` owns its container's
//! paging, and tables sharing a container take turns.

pub mod ident;

mod block_file;
mod byte_table;
mod cache;
mod store;

pub use block_file::{BlockBuf, BlockFile, IoTicket};
pub use byte_table::{ByteTable, TableReader, TableWriter};
pub use cache::{CacheBacking, LruCache};
pub use store::BlockStore;

use eyre::Result;
use zerocopy::little_endian::{I32, I64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The 4 bytes at the front of every container file.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub(crate) struct ContainerPrefix {
    pub block_size: I32,
}

/// The element-count field a byte table keeps at the front of the header
/// block.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub(crate) struct TableHeader {
    pub element_count: I64,
}

/// Parses an on-disk header struct from an exactly-sized byte slice.
pub(crate) fn read_header<T: FromBytes>(bytes: &[u8], type_name: &str) -> Result<T> {
    T::read_from_bytes(bytes)
        .map_err(|error| eyre::eyre!("failed to parse {type_name}: {error:?}"))
}
