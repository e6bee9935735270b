//! Bounded document cache
//!
//! Keeps the most recently used parsed swagger documents so that files reached
//! through many cross-file references are parsed once per residency instead of
//! once per reference.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::document::SchemaDocument;
use crate::error::Result;

/// Default number of documents kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Least-recently-used cache of parsed documents, keyed by absolute path.
///
/// Entries are ordered oldest first; a hit moves the entry to the back and
/// inserts evict from the front.
pub struct DocumentCache {
    capacity: usize,
    entries: Mutex<IndexMap<PathBuf, Arc<SchemaDocument>>>,
    parses: AtomicUsize,
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity + 1)),
            parses: AtomicUsize::new(0),
        }
    }

    /// Return the document at `path`, parsing it on a miss.
    ///
    /// The file is parsed outside the lock; two workers missing on the same
    /// path may both parse it, and the later insert wins.
    pub fn get(&self, path: &Path) -> Result<Arc<SchemaDocument>> {
        if let Some(doc) = self.lookup(path) {
            return Ok(doc);
        }

        let doc = Arc::new(SchemaDocument::load(path)?);
        self.parses.fetch_add(1, Ordering::Relaxed);
        trace!(path = %path.display(), "parsed swagger document");

        self.insert(path.to_path_buf(), Arc::clone(&doc));
        Ok(doc)
    }

    /// Cached document at `path`, marking it most recently used
    pub fn lookup(&self, path: &Path) -> Option<Arc<SchemaDocument>> {
        let mut entries = self.entries.lock();
        let index = entries.get_index_of(path)?;
        let last = entries.len() - 1;
        entries.move_index(index, last);
        entries.get_index(last).map(|(_, doc)| Arc::clone(doc))
    }

    fn insert(&self, path: PathBuf, doc: Arc<SchemaDocument>) {
        let mut entries = self.entries.lock();
        let (index, _) = entries.insert_full(path, doc);
        let last = entries.len() - 1;
        entries.move_index(index, last);

        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                trace!(path = %evicted.display(), "evicted swagger document");
            }
        }
    }

    /// Whether `path` is resident, without touching its recency
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of parses performed so far (cache misses that succeeded)
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
