//! Batch cache for per-process reads.
//!
//! While a [`BatchCache`] is active, the first read of each eligible source
//! is parsed and stored; later requests in the same scope get the stored
//! record without touching the kernel. Deactivating drops everything.
//!
//! Only the stat record and the raw status bytes are eligible. The cache
//! is mutated through `&self` and is therefore neither `Sync` nor safe to
//! share across threads without external locking.

use crate::error::Result;
use crate::process::stat::StatRecord;
use ahash::AHashMap as HashMap;
use std::cell::{Cell, RefCell};
use tracing::trace;

/// Cache-eligible sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Stat,
    Status,
}

#[derive(Debug, Clone)]
enum CachedRecord {
    Stat(StatRecord),
    Status(Vec<u8>),
}

/// Explicit memoization scope attached to one process handle.
#[derive(Debug, Default)]
pub struct BatchCache {
    active: Cell<bool>,
    entries: RefCell<HashMap<CacheKey, CachedRecord>>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins memoization. Re-activating an active cache keeps its entries.
    pub fn activate(&self) {
        if !self.active.replace(true) {
            trace!("batch cache activated");
        }
    }

    /// Ends memoization and discards every stored record.
    pub fn deactivate(&self) {
        self.active.set(false);
        self.entries.borrow_mut().clear();
        trace!("batch cache deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Stat record, loaded with `load` unless already stored.
    pub fn stat_record<F>(&self, load: F) -> Result<StatRecord>
    where
        F: FnOnce() -> Result<StatRecord>,
    {
        self.memoize(
            CacheKey::Stat,
            load,
            CachedRecord::Stat,
            |rec| match rec {
                CachedRecord::Stat(s) => Some(s.clone()),
                _ => None,
            },
        )
    }

    /// Raw status bytes, loaded with `load` unless already stored.
    pub fn status_bytes<F>(&self, load: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        self.memoize(
            CacheKey::Status,
            load,
            CachedRecord::Status,
            |rec| match rec {
                CachedRecord::Status(b) => Some(b.clone()),
                _ => None,
            },
        )
    }

    fn memoize<T, F>(
        &self,
        key: CacheKey,
        load: F,
        wrap: fn(T) -> CachedRecord,
        unwrap: fn(&CachedRecord) -> Option<T>,
    ) -> Result<T>
    where
        T: Clone,
        F: FnOnce() -> Result<T>,
    {
        if !self.is_active() {
            return load();
        }

        if let Some(hit) = self.entries.borrow().get(&key).and_then(unwrap) {
            trace!(?key, "batch cache hit");
            return Ok(hit);
        }

        // Failed loads are not stored; the next call retries.
        let value = load()?;
        self.entries
            .borrow_mut()
            .insert(key, wrap(value.clone()));
        Ok(value)
    }
}
