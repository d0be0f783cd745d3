//! # recdb - Typed Tables over Paged Block Storage
//!
//! recdb is an embedded table engine: arrays of typed records (primitives,
//! strings, tuples, arrays) with random-access reads and positional
//! writes, persisted in files of equal-sized blocks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use recdb::{BlockStore, ByteTable, LongLayout, Table, TextLayout};
//!
//! let mut store = BlockStore::new("./data")?;
//!
//! let index = ByteTable::new(store.create("songs/index", 4096)?, 64)?;
//! let data = ByteTable::new(store.create("songs/data", 4096)?, 64)?;
//! let mut songs = Table::variable((LongLayout, TextLayout), index, data)?;
//!
//! songs.write(0, &(-12, "Dans le port d'Amsterdam".into()))?;
//! let (id, title) = songs.read(0)?;
//! songs.close()?;
//! ```
//!
//! ## Architecture
//!
//! recdb uses a layered architecture; each layer depends only on the ones
//! below it:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Typed Table (Table<L>)        │
//! ├─────────────────────────────────────┤
//! │   Record Layouts │ Character Codec   │
//! ├─────────────────────────────────────┤
//! │     Paged Byte Table (ByteTable)     │
//! ├─────────────────────────────────────┤
//! │   LRU Page Cache │ Byte Buffers      │
//! ├─────────────────────────────────────┤
//! │  Block Containers (BlockStore/File)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! A store roots a directory; every container is one file of equal-sized
//! blocks behind a 4-byte prefix and a header block:
//!
//! ```text
//! workspace/
//! ├── songs/
//! │   ├── index        # fixed-width (start, length) entries
//! │   └── data         # variable-length encoded payloads
//! └── counters         # fixed-size records, single stream
//! ```
//!
//! ## Concurrency Model
//!
//! Block reads and writes run on one background worker thread per
//! container; everything above them is single-threaded and cooperative. A
//! paged byte table keeps at most one read and one write in flight and
//! blocks on them only at well-defined points (cache miss, dirty
//! eviction, close). All durability is flush-on-close.
//!
//! ## Module Overview
//!
//! - [`storage`]: containers, the LRU page cache, the paged byte table
//! - [`memory`]: byte-stream traits and the reusable byte buffer
//! - [`records`]: character codec, record layouts, typed tables
//! - [`config`]: centralized constants

pub mod config;
pub mod memory;
pub mod records;
pub mod storage;

pub use records::{
    ArrayLayout, ByteLayout, FixedArrayLayout, IntLayout, Layout, LongLayout, Table, TextLayout,
};
pub use storage::{BlockFile, BlockStore, ByteTable};
