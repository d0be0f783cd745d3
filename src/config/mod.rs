//! # recdb Configuration Constants
//!
//! This module centralizes the numeric constants of the engine. Constants
//! that depend on each other are co-located and their relationships
//! documented, so that changing one forces a look at the others.
//!
//! ## Dependency Graph
//!
//! ```text
//! CONTAINER_PREFIX_SIZE (4 bytes)
//!       │
//!       └─> On-disk layout: every container file starts with its block
//!           size as a little-endian i32. Payload blocks are addressed
//!           relative to this prefix plus one header block.
//!
//! TABLE_HEADER_SIZE (8 bytes)
//!       │
//!       └─> A paged byte table stores its element count in the first
//!           8 bytes of the container's header block. Containers backing
//!           a byte table therefore need block_size >= TABLE_HEADER_SIZE.
//!
//! MIN_CACHE_CAPACITY (3 pages)
//!       │
//!       └─> The page cache's eviction victim is always the recency-list
//!           tail. With fewer than 3 resident pages the tail can be the
//!           page a cursor is still walking, so smaller capacities are
//!           rejected at construction.
//! ```

/// Byte length of the block-size prefix at the start of every container file.
pub const CONTAINER_PREFIX_SIZE: usize = 4;

/// Byte length of the element-count field at the start of a header block.
pub const TABLE_HEADER_SIZE: usize = 8;

/// Smallest accepted page cache capacity.
pub const MIN_CACHE_CAPACITY: usize = 3;

/// Block size used when callers have no reason to pick another one.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Page cache capacity used when callers have no reason to pick another one.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

const _: () = assert!(MIN_CACHE_CAPACITY > 2);
const _: () = assert!(DEFAULT_BLOCK_SIZE >= TABLE_HEADER_SIZE);
const _: () = assert!(DEFAULT_CACHE_CAPACITY >= MIN_CACHE_CAPACITY);
