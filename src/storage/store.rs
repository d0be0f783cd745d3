//! # Container Workspace
//!
//! A `BlockStore` roots a directory and tracks the containers opened
//! through it. Identifiers are normalized before they touch the
//! filesystem: the canonical form (with `/`) keys the open-set, and the
//! platform form names the file under the root. Intermediate directories
//! are created on demand, so `logs/2024/events` works without ceremony.
//!
//! `open` is idempotent per store instance: asking for the same identifier
//! twice returns the same handle as long as it is still open. A handle
//! closed behind the store's back (a byte table closes its container
//! directly) is replaced on the next `open`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{ensure, eyre, Result, WrapErr};
use hashbrown::HashMap;
use tracing::debug;

use super::{ident, BlockFile};

pub struct BlockStore {
    root: PathBuf,
    open: HashMap<String, Arc<BlockFile>>,
}

impl BlockStore {
    /// Roots a workspace at `root`, creating the directory on demand.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .wrap_err_with(|| format!("failed to create workspace root '{}'", root.display()))?;
        debug!(root = %root.display(), "workspace opened");
        Ok(Self {
            root,
            open: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a container file for `id` exists under the root.
    pub fn exists(&self, id: &str) -> bool {
        self.locate(id).map(|(_, path)| path.is_file()).unwrap_or(false)
    }

    /// Creates a new container of `block_size`-byte blocks.
    pub fn create(&mut self, id: &str, block_size: usize) -> Result<Arc<BlockFile>> {
        let (key, path) = self.locate(id)?;
        ensure!(!path.exists(), "container '{key}' already exists");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).wrap_err_with(|| {
                format!("failed to create container directory '{}'", parent.display())
            })?;
        }

        let file = Arc::new(BlockFile::create(key.clone(), &path, block_size)?);
        debug!(container = %key, block_size, "container created");
        self.open.insert(key, Arc::clone(&file));
        Ok(file)
    }

    /// Opens an existing container, returning the live handle if this
    /// store already has one.
    pub fn open(&mut self, id: &str) -> Result<Arc<BlockFile>> {
        let (key, path) = self.locate(id)?;
        if let Some(file) = self.open.get(&key) {
            if !file.is_closed() {
                return Ok(Arc::clone(file));
            }
            self.open.remove(&key);
        }

        ensure!(path.is_file(), "container '{key}' not found");
        let file = Arc::new(BlockFile::open(key.clone(), &path)?);
        self.open.insert(key, Arc::clone(&file));
        Ok(file)
    }

    /// Closes the open handle for `id`.
    pub fn close(&mut self, id: &str) -> Result<()> {
        let (key, _) = self.locate(id)?;
        let file = self
            .open
            .remove(&key)
            .ok_or_else(|| eyre!("container '{key}' is not open"))?;
        if file.is_closed() {
            return Ok(());
        }
        file.close()
    }

    /// Closes `id` if open and removes its file.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let (key, path) = self.locate(id)?;
        if let Some(file) = self.open.remove(&key) {
            if !file.is_closed() {
                file.close()?;
            }
        }
        ensure!(path.is_file(), "container '{key}' not found");
        fs::remove_file(&path)
            .wrap_err_with(|| format!("failed to delete container file '{}'", path.display()))?;
        debug!(container = %key, "container deleted");
        Ok(())
    }

    /// Closes every container still open through this store.
    pub fn close_all(&mut self) -> Result<()> {
        for (_, file) in self.open.drain() {
            if !file.is_closed() {
                file.close()?;
            }
        }
        Ok(())
    }

    fn locate(&self, id: &str) -> Result<(String, PathBuf)> {
        let key = ident::normalize(id, '/')?;
        let relative = ident::normalize(id, std::path::MAIN_SEPARATOR)?;
        Ok((key, self.root.join(relative)))
    }
}

impl Drop for BlockStore {
    fn drop(&mut self) {
        for (_, file) in self.open.drain() {
            if !file.is_closed() {
                let _ = file.close();
            }
        }
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("root", &self.root)
            .field("open", &self.open.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_open_close_delete_lifecycle() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();

        assert!(!store.exists("users"));
        store.create("users", 64).unwrap();
        assert!(store.exists("users"));

        assert!(store.create("users", 64).is_err());

        store.close("users").unwrap();
        let reopened = store.open("users").unwrap();
        assert_eq!(reopened.block_size(), 64);

        store.delete("users").unwrap();
        assert!(!store.exists("users"));
        assert!(store.open("users").is_err());
    }

    #[test]
    fn open_is_idempotent_within_one_store() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();

        store.create("events", 32).unwrap();
        let first = store.open("events").unwrap();
        let second = store.open("events").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn open_replaces_a_handle_closed_behind_the_store() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();

        let handle = store.create("events", 32).unwrap();
        handle.close().unwrap();

        let reopened = store.open("events").unwrap();
        assert!(!reopened.is_closed());
        store.close("events").unwrap();
    }

    #[test]
    fn identifiers_map_to_nested_directories() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();

        store.create("Logs/2024/Events", 16).unwrap();
        let expected: PathBuf = ["logs", "2024", "events"].iter().collect();
        assert!(dir.path().join(expected).is_file());

        // same container under its canonical spelling
        assert!(store.exists("logs/2024/events"));
    }

    #[test]
    fn invalid_identifiers_are_rejected_before_touching_disk() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();

        assert!(store.create("bad name", 16).is_err());
        assert!(store.create("a//b", 16).is_err());
        assert!(!store.exists("bad name"));
    }

    #[test]
    fn close_of_an_unopened_container_fails() {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::new(dir.path()).unwrap();
        assert!(store.close("nothing").is_err());
    }
}
