//! # Block Container Files
//!
//! A container is a single file holding equal-sized blocks:
//!
//! ```text
//! bytes 0..4        block size, little-endian i32
//! bytes 4..4+bs     header block (application-writable)
//! bytes 4+bs..      payload blocks 0, 1, 2, ...
//! ```
//!
//! The header block is read into memory when the container is opened and
//! written back when it is closed; between those points callers mutate the
//! in-memory copy through [`BlockFile::header`].
//!
//! ## Background I/O
//!
//! Each open container owns one worker thread fed through a crossbeam
//! channel. `read_block` and `write_block` move the caller's buffer into a
//! request and hand back an [`IoTicket`]; `IoTicket::wait` blocks until the
//! worker finishes and returns the buffer (filled, for reads). The worker
//! seeks before every transfer and services requests strictly in
//! submission order, so two operations on the same block can never overlap
//! and same-container writes reach the file in the order they were issued.
//!
//! Writing at `position == block_count()` extends the container by one
//! block; the count is bumped at submission time so the new block is
//! immediately addressable.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use eyre::{ensure, eyre, Result, WrapErr};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;
use zerocopy::IntoBytes;

use crate::config::CONTAINER_PREFIX_SIZE;
use crate::memory::ByteBuffer;

use super::{read_header, ContainerPrefix};

/// An owned block-sized byte buffer, passed into I/O requests and handed
/// back through their tickets.
pub type BlockBuf = Box<[u8]>;

struct TicketState {
    result: Mutex<Option<Result<BlockBuf>>>,
    done: Condvar,
}

impl TicketState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        })
    }

    fn complete(&self, outcome: Result<BlockBuf>) {
        *self.result.lock() = Some(outcome);
        self.done.notify_all();
    }
}

/// Completion handle for one submitted block transfer.
pub struct IoTicket {
    block: u64,
    state: Arc<TicketState>,
}

impl IoTicket {
    /// The payload block this transfer targets.
    pub fn block(&self) -> u64 {
        self.block
    }

    /// Blocks until the transfer finishes, returning its buffer.
    pub fn wait(self) -> Result<BlockBuf> {
        let mut slot = self.state.result.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.state.done.wait(&mut slot);
        }
    }
}

enum IoRequest {
    Read {
        offset: u64,
        buf: BlockBuf,
        state: Arc<TicketState>,
    },
    Write {
        offset: u64,
        buf: BlockBuf,
        state: Arc<TicketState>,
    },
    Shutdown,
}

fn run_worker(mut file: File, requests: Receiver<IoRequest>) {
    for request in requests {
        match request {
            IoRequest::Read { offset, mut buf, state } => {
                let outcome = read_at(&mut file, offset, &mut buf).map(|()| buf);
                state.complete(outcome);
            }
            IoRequest::Write { offset, buf, state } => {
                let outcome = write_at(&mut file, offset, &buf).map(|()| buf);
                state.complete(outcome);
            }
            IoRequest::Shutdown => {
                let _ = file.sync_all();
                break;
            }
        }
    }
}

fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))
        .wrap_err_with(|| format!("seek to {offset} failed"))?;
    file.read_exact(buf)
        .wrap_err_with(|| format!("read of {} bytes at {offset} failed", buf.len()))
}

fn write_at(file: &mut File, offset: u64, buf: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))
        .wrap_err_with(|| format!("seek to {offset} failed"))?;
    file.write_all(buf)
        .wrap_err_with(|| format!("write of {} bytes at {offset} failed", buf.len()))
}

/// An open container handle.
///
/// Handles are shared (`Arc`) within one store; all operations take
/// `&self`. Once closed, every operation fails.
pub struct BlockFile {
    name: String,
    block_size: usize,
    block_count: AtomicU64,
    header: Mutex<ByteBuffer>,
    requests: Sender<IoRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl BlockFile {
    pub(crate) fn create(name: String, path: &Path, block_size: usize) -> Result<Self> {
        ensure!(block_size > 0, "block size must be positive");
        ensure!(
            block_size <= i32::MAX as usize,
            "block size {block_size} exceeds the container format limit"
        );

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create container file '{}'", path.display()))?;

        let prefix = ContainerPrefix {
            block_size: (block_size as i32).into(),
        };
        file.write_all(prefix.as_bytes())
            .wrap_err("failed to write container prefix")?;
        file.write_all(&vec![0u8; block_size])
            .wrap_err("failed to write header block")?;
        file.sync_all()
            .wrap_err_with(|| format!("failed to sync container file '{}'", path.display()))?;

        Self::start(name, file, block_size, 0, ByteBuffer::with_capacity(block_size))
    }

    pub(crate) fn open(name: String, path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open container file '{}'", path.display()))?;

        let len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat container file '{}'", path.display()))?
            .len();
        ensure!(
            len >= CONTAINER_PREFIX_SIZE as u64,
            "container '{name}' is corrupted: {len} bytes is shorter than the block-size prefix"
        );

        let mut prefix_bytes = [0u8; CONTAINER_PREFIX_SIZE];
        file.read_exact(&mut prefix_bytes)
            .wrap_err("failed to read container prefix")?;
        let prefix: ContainerPrefix = read_header(&prefix_bytes, "container prefix")?;
        let block_size = prefix.block_size.get();
        ensure!(
            block_size > 0,
            "container '{name}' is corrupted: block size {block_size}"
        );
        let block_size = block_size as usize;

        ensure!(
            len >= (CONTAINER_PREFIX_SIZE + block_size) as u64,
            "container '{name}' is corrupted: header block is missing"
        );
        let mut header_block = vec![0u8; block_size];
        file.read_exact(&mut header_block)
            .wrap_err("failed to read header block")?;
        let mut header = ByteBuffer::with_capacity(block_size);
        header.block_writer(block_size)?.copy_from(&header_block)?;

        // a torn trailing block from an interrupted write is ignored
        let block_count = (len - (CONTAINER_PREFIX_SIZE + block_size) as u64) / block_size as u64;

        Self::start(name, file, block_size, block_count, header)
    }

    fn start(
        name: String,
        file: File,
        block_size: usize,
        block_count: u64,
        header: ByteBuffer,
    ) -> Result<Self> {
        let (requests, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name(format!("recdb-io-{name}"))
            .spawn(move || run_worker(file, receiver))
            .wrap_err("failed to spawn container I/O worker")?;

        debug!(container = %name, block_size, block_count, "container opened");
        Ok(Self {
            name,
            block_size,
            block_count: AtomicU64::new(block_count),
            header: Mutex::new(header),
            requests,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> u64 {
        self.block_count.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The in-memory header block. Mutations become durable on close.
    pub fn header(&self) -> Result<MutexGuard<'_, ByteBuffer>> {
        self.ensure_open()?;
        Ok(self.header.lock())
    }

    /// Submits a read of payload block `position` into `buf`.
    pub fn read_block(&self, position: u64, buf: BlockBuf) -> Result<IoTicket> {
        self.ensure_open()?;
        let count = self.block_count();
        ensure!(
            position < count,
            "block {position} out of range for container '{}' with {count} blocks",
            self.name
        );
        self.check_buf(&buf)?;
        self.submit(position, buf, true)
    }

    /// Submits a write of `buf` to payload block `position`.
    ///
    /// `position == block_count()` extends the container by one block.
    pub fn write_block(&self, position: u64, buf: BlockBuf) -> Result<IoTicket> {
        self.ensure_open()?;
        let count = self.block_count();
        ensure!(
            position <= count,
            "block {position} out of range for container '{}' with {count} blocks",
            self.name
        );
        self.check_buf(&buf)?;
        if position == count {
            self.block_count.store(count + 1, Ordering::Release);
        }
        self.submit(position, buf, false)
    }

    /// Writes the header block back and shuts the I/O worker down.
    ///
    /// Pending transfers complete first; the header lands after them.
    pub fn close(&self) -> Result<()> {
        ensure!(
            !self.closed.swap(true, Ordering::AcqRel),
            "container '{}' is already closed",
            self.name
        );

        let header_copy = {
            let header = self.header.lock();
            let mut block = vec![0u8; self.block_size].into_boxed_slice();
            header.block_reader(self.block_size)?.copy_into(&mut block)?;
            block
        };
        let state = TicketState::new();
        self.requests
            .send(IoRequest::Write {
                offset: CONTAINER_PREFIX_SIZE as u64,
                buf: header_copy,
                state: Arc::clone(&state),
            })
            .map_err(|_| eyre!("I/O worker for container '{}' is gone", self.name))?;
        IoTicket { block: 0, state }.wait()?;

        let _ = self.requests.send(IoRequest::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            worker
                .join()
                .map_err(|_| eyre!("I/O worker for container '{}' panicked", self.name))?;
        }
        debug!(container = %self.name, "container closed");
        Ok(())
    }

    fn submit(&self, position: u64, buf: BlockBuf, read: bool) -> Result<IoTicket> {
        let offset = self.block_offset(position);
        let state = TicketState::new();
        let request = if read {
            IoRequest::Read {
                offset,
                buf,
                state: Arc::clone(&state),
            }
        } else {
            IoRequest::Write {
                offset,
                buf,
                state: Arc::clone(&state),
            }
        };
        self.requests
            .send(request)
            .map_err(|_| eyre!("I/O worker for container '{}' is gone", self.name))?;
        Ok(IoTicket {
            block: position,
            state,
        })
    }

    fn block_offset(&self, position: u64) -> u64 {
        // payload block 0 sits behind the prefix and the header block
        CONTAINER_PREFIX_SIZE as u64 + (position + 1) * self.block_size as u64
    }

    fn check_buf(&self, buf: &BlockBuf) -> Result<()> {
        ensure!(
            buf.len() == self.block_size,
            "buffer of {} bytes does not match block size {}",
            buf.len(),
            self.block_size
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        ensure!(!self.is_closed(), "container '{}' is closed", self.name);
        Ok(())
    }
}

impl Drop for BlockFile {
    fn drop(&mut self) {
        // dropping without close() loses header mutations but must not
        // leak the worker thread
        if !self.is_closed() {
            let _ = self.requests.send(IoRequest::Shutdown);
            if let Some(worker) = self.worker.lock().take() {
                let _ = worker.join();
            }
        }
    }
}

impl std::fmt::Debug for BlockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFile")
            .field("name", &self.name)
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn buf(block_size: usize, fill: u8) -> BlockBuf {
        vec![fill; block_size].into_boxed_slice()
    }

    #[test]
    fn create_writes_prefix_and_header_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events");

        let file = BlockFile::create("events".into(), &path, 16).unwrap();
        assert_eq!(file.block_size(), 16);
        assert_eq!(file.block_count(), 0);
        file.close().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 4 + 16);
        assert_eq!(&raw[..4], &16i32.to_le_bytes());
    }

    #[test]
    fn create_rejects_zero_block_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad");
        assert!(BlockFile::create("bad".into(), &path, 0).is_err());
    }

    #[test]
    fn blocks_round_trip_through_the_worker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let file = BlockFile::create("data".into(), &path, 8).unwrap();

        file.write_block(0, buf(8, 0xAB)).unwrap().wait().unwrap();
        file.write_block(1, buf(8, 0xCD)).unwrap().wait().unwrap();
        assert_eq!(file.block_count(), 2);

        let block = file.read_block(0, buf(8, 0)).unwrap().wait().unwrap();
        assert_eq!(&block[..], &[0xAB; 8]);
        let block = file.read_block(1, buf(8, 0)).unwrap().wait().unwrap();
        assert_eq!(&block[..], &[0xCD; 8]);

        file.close().unwrap();
    }

    #[test]
    fn write_extends_only_at_the_current_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let file = BlockFile::create("data".into(), &path, 8).unwrap();

        assert!(file.write_block(1, buf(8, 0)).is_err());
        assert!(file.read_block(0, buf(8, 0)).is_err());
        file.write_block(0, buf(8, 1)).unwrap().wait().unwrap();
        assert!(file.read_block(0, buf(8, 0)).is_ok());

        file.close().unwrap();
    }

    #[test]
    fn mismatched_buffer_length_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let file = BlockFile::create("data".into(), &path, 8).unwrap();

        assert!(file.write_block(0, buf(7, 0)).is_err());
        file.close().unwrap();
    }

    #[test]
    fn header_survives_close_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta");

        let file = BlockFile::create("meta".into(), &path, 32).unwrap();
        file.header()
            .unwrap()
            .block_writer(4)
            .unwrap()
            .copy_from(&[9, 8, 7, 6])
            .unwrap();
        file.close().unwrap();

        let file = BlockFile::open("meta".into(), &path).unwrap();
        let mut first = [0u8; 4];
        file.header()
            .unwrap()
            .block_reader(4)
            .unwrap()
            .copy_into(&mut first)
            .unwrap();
        assert_eq!(first, [9, 8, 7, 6]);
        file.close().unwrap();
    }

    #[test]
    fn operations_on_a_closed_handle_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let file = BlockFile::create("data".into(), &path, 8).unwrap();
        file.close().unwrap();

        assert!(file.write_block(0, buf(8, 0)).is_err());
        assert!(file.header().is_err());
        assert!(file.close().is_err());
    }

    #[test]
    fn truncated_prefix_is_reported_as_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [1, 2]).unwrap();

        let error = BlockFile::open("short".into(), &path).unwrap_err();
        assert!(error.to_string().contains("corrupted"));
    }

    #[test]
    fn reopen_recovers_the_block_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");

        let file = BlockFile::create("data".into(), &path, 8).unwrap();
        for position in 0..3 {
            file.write_block(position, buf(8, position as u8)).unwrap().wait().unwrap();
        }
        file.close().unwrap();

        let file = BlockFile::open("data".into(), &path).unwrap();
        assert_eq!(file.block_count(), 3);
        let block = file.read_block(2, buf(8, 0)).unwrap().wait().unwrap();
        assert_eq!(&block[..], &[2; 8]);
        file.close().unwrap();
    }
}
