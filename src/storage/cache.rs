//! # LRU Cache with Load/Unload Backing
//!
//! A capacity-bounded key-to-value cache. Recency is an intrusive doubly
//! linked list threaded through a slab of nodes, with a `hashbrown` map
//! from key to slab index; the most recent entry is the list head and the
//! eviction victim is always the tail.
//!
//! Misses and evictions are delegated to a [`CacheBacking`] passed into
//! each call rather than to stored closures: the backing needs mutable
//! access to state whose owner also holds the cache, and threading the
//! context through the call is how the borrow checker wants that spelled.
//!
//! ## Fast Path
//!
//! `get` first compares the requested key against the head node and
//! returns without touching the map when they match. Callers with access
//! locality (the paged byte table reads one byte at a time) hit this path
//! almost always.
//!
//! ## Eviction
//!
//! On a miss at capacity the tail node is unlinked, `unload` receives its
//! key and value, and the slab slot is reused for the new pair. A failed
//! `load` leaves the cache untouched.

use std::hash::Hash;

use eyre::{ensure, Result};
use hashbrown::HashMap;

use crate::config::MIN_CACHE_CAPACITY;

/// Supplies values on miss and takes them back on eviction.
pub trait CacheBacking<K, V> {
    fn load(&mut self, key: &K) -> Result<V>;
    fn unload(&mut self, key: K, value: V) -> Result<()>;
}

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

pub struct LruCache<K, V> {
    nodes: Vec<Node<K, V>>,
    map: HashMap<K, usize>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        ensure!(
            capacity >= MIN_CACHE_CAPACITY,
            "cache capacity {capacity} must be at least {MIN_CACHE_CAPACITY}"
        );
        Ok(Self {
            nodes: Vec::with_capacity(capacity),
            map: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            capacity,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        if self.head != NIL && self.nodes[self.head].key == *key {
            return true;
        }
        self.map.contains_key(key)
    }

    /// Returns the cached value for `key`, loading it on a miss.
    ///
    /// The returned value is the most recent entry afterwards. At capacity
    /// the least recent entry is handed to `backing.unload` before its
    /// node is reused.
    pub fn get<B: CacheBacking<K, V>>(&mut self, key: K, backing: &mut B) -> Result<&mut V> {
        if self.head != NIL && self.nodes[self.head].key == key {
            return Ok(&mut self.nodes[self.head].value);
        }

        if let Some(&index) = self.map.get(&key) {
            self.unlink(index);
            self.push_front(index);
            return Ok(&mut self.nodes[index].value);
        }

        let value = backing.load(&key)?;
        let index = if self.nodes.len() == self.capacity {
            let index = self.tail;
            self.unlink(index);
            let evicted = std::mem::replace(
                &mut self.nodes[index],
                Node {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                },
            );
            self.map.remove(&evicted.key);
            backing.unload(evicted.key, evicted.value)?;
            index
        } else {
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: NIL,
                next: NIL,
            });
            self.nodes.len() - 1
        };

        self.push_front(index);
        self.map.insert(key, index);
        Ok(&mut self.nodes[index].value)
    }

    /// Unloads every entry, least recent first, and resets the cache.
    pub fn clear<B: CacheBacking<K, V>>(&mut self, backing: &mut B) -> Result<()> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut at = self.tail;
        while at != NIL {
            order.push(at);
            at = self.nodes[at].prev;
        }

        self.head = NIL;
        self.tail = NIL;
        self.map.clear();
        let mut nodes: Vec<Option<Node<K, V>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        for index in order {
            if let Some(node) = nodes[index].take() {
                backing.unload(node.key, node.value)?;
            }
        }
        Ok(())
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[index].prev = NIL;
        self.nodes[index].next = NIL;
    }

    fn push_front(&mut self, index: usize) {
        self.nodes[index].prev = NIL;
        self.nodes[index].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = index;
        } else {
            self.tail = index;
        }
        self.head = index;
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.nodes.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
