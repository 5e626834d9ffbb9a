//! # Persistent Key/Value Store
//!
//! Durable string map for session facts, mirrored to a flat file.
//!
//! File format: every pair occupies two consecutive lines, key then value,
//! repeated until end of file. There is no header and no escaping, so keys
//! and values must not contain line breaks. `set` rejects them.
//!
//! The store is loaded once at startup and saved on explicit checkpoints.
//! There is no autosave on mutation; [`KvCheckpoint`] gives a scope that is
//! flushed on every exit path.

use crate::MemlinkError;
use crate::formats::write_atomically;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of [`KvStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file existed; this many pairs were loaded.
    Loaded(usize),
    /// No file at the path; the store is empty.
    Missing,
}

/// Thread-safe string map backed by a two-lines-per-pair file.
///
/// A single mutex covers the whole map. `load` and `save` hold it for their
/// full duration, so a save never observes a half-applied mutation and a
/// concurrent `get` waits for the save to finish.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl KvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and load it from `path`.
    ///
    /// A missing file yields an empty store. A file that exists but cannot
    /// be read is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemlinkError> {
        let store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the contents of the store with the pairs stored at `path`.
    ///
    /// A missing file empties the store. On error the in-memory map is left
    /// unchanged.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadOutcome, MemlinkError> {
        let path = path.as_ref();
        let mut entries = self.lock();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                entries.clear();
                tracing::info!(
                    "No existing store at {}; starting with an empty store",
                    path.display()
                );
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(MemlinkError::storage(path, e)),
        };

        let loaded = read_pairs(BufReader::new(file)).map_err(|e| MemlinkError::storage(path, e))?;
        let count = loaded.len();
        *entries = loaded;

        tracing::info!("Loaded {} entries from {}", count, path.display());
        Ok(LoadOutcome::Loaded(count))
    }

    /// Write every pair to `path`, replacing the file atomically.
    ///
    /// A failure leaves any previous file intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MemlinkError> {
        let path = path.as_ref();
        let entries = self.lock();

        write_atomically(path, &encode_pairs(&entries))?;

        tracing::info!("Saved {} entries to {}", entries.len(), path.display());
        Ok(())
    }

    /// Add or update a pair. Returns the previous value, if any.
    ///
    /// Rejects empty keys and any key or value containing a line break.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, MemlinkError> {
        let key = key.into();
        let value = value.into();
        validate_entry(&key, &value)?;
        Ok(self.lock().insert(key, value))
    }

    /// Get the value for `key`, or an empty string if it is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    /// Get the value for `key`, if present.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Remove a pair. Returns the removed value, if any.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Remove every pair.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every pair, in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Start a scope that saves the store to `path` when it ends.
    ///
    /// Call [`KvCheckpoint::finish`] to save and observe the result; a guard
    /// dropped without `finish` (early return, `?`, panic unwinding) still
    /// saves and logs any failure.
    pub fn checkpoint_on_drop(&self, path: impl Into<PathBuf>) -> KvCheckpoint<'_> {
        KvCheckpoint {
            store: self,
            path: path.into(),
            finished: false,
        }
    }
}

fn validate_entry(key: &str, value: &str) -> Result<(), MemlinkError> {
    if key.is_empty() {
        return Err(MemlinkError::InvalidKvEntry("key is empty".to_string()));
    }
    if key.contains(['\n', '\r']) {
        return Err(MemlinkError::InvalidKvEntry(format!(
            "key {:?} contains a line break",
            key
        )));
    }
    if value.contains(['\n', '\r']) {
        return Err(MemlinkError::InvalidKvEntry(format!(
            "value for key {:?} contains a line break",
            key
        )));
    }
    Ok(())
}

/// Strip one trailing `\n` or `\r\n`.
fn strip_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Read alternating key/value lines.
///
/// Reading stops at end of file or at the first empty key line. A key with
/// no value line maps to the empty string.
fn read_pairs(mut reader: impl BufRead) -> std::io::Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    loop {
        let mut key = String::new();
        if reader.read_line(&mut key)? == 0 {
            break;
        }
        strip_line_ending(&mut key);
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        reader.read_line(&mut value)?;
        strip_line_ending(&mut value);
        pairs.insert(key, value);
    }
    Ok(pairs)
}

fn encode_pairs(entries: &BTreeMap<String, String>) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(key);
        out.push('\n');
        out.push_str(value);
        out.push('\n');
    }
    out.into_bytes()
}

// =============================================================================
// CHECKPOINT GUARD
// =============================================================================

/// Scope guard that saves a [`KvStore`] when the scope ends.
///
/// Dereferences to the store, so mutations can go through the guard.
#[derive(Debug)]
pub struct KvCheckpoint<'a> {
    store: &'a KvStore,
    path: PathBuf,
    finished: bool,
}

impl KvCheckpoint<'_> {
    /// Save now and end the scope.
    pub fn finish(mut self) -> Result<(), MemlinkError> {
        self.finished = true;
        self.store.save(&self.path)
    }

    /// Destination path of the checkpoint.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for KvCheckpoint<'_> {
    type Target = KvStore;

    fn deref(&self) -> &KvStore {
        self.store
    }
}

impl Drop for KvCheckpoint<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.store.save(&self.path) {
            tracing::warn!("Checkpoint to {} failed on scope exit: {}", self.path.display(), e);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
