//! Large-payload storage used during ingestion.
//!
//! Snapshot and profile payloads can be megabytes each. Ingestion moves them
//! out of event args into a [`BackingStorage`] and keeps a handle instead.
//! Numeric metrics never read these payloads back.

use log::debug;

/// Opaque reference to a stored string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageHandle(usize);

/// Append-only blob store
///
/// **Public** - pluggable, may be a no-op
pub trait BackingStorage {
    /// Store a string that will never be read back
    fn append_string(&mut self, value: &str);

    /// Store a string and return a handle to it, or `None` if this storage
    /// does not keep payloads
    fn append_accessible_string(&mut self, value: &str) -> Option<StorageHandle>;

    fn load(&self, handle: StorageHandle) -> Option<String>;

    /// Called once ingestion has finished appending
    fn finish_writing(&mut self);

    fn reset(&mut self);
}

/// Storage that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl BackingStorage for NullStorage {
    fn append_string(&mut self, _value: &str) {}

    fn append_accessible_string(&mut self, _value: &str) -> Option<StorageHandle> {
        None
    }

    fn load(&self, _handle: StorageHandle) -> Option<String> {
        None
    }

    fn finish_writing(&mut self) {}

    fn reset(&mut self) {}
}

/// Storage that keeps payloads in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    blobs: Vec<String>,
    discarded_bytes: usize,
    sealed: bool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BackingStorage for InMemoryStorage {
    fn append_string(&mut self, value: &str) {
        self.discarded_bytes += value.len();
    }

    fn append_accessible_string(&mut self, value: &str) -> Option<StorageHandle> {
        if self.sealed {
            debug!("Append after finish_writing, payload not kept");
            return None;
        }
        self.blobs.push(value.to_string());
        Some(StorageHandle(self.blobs.len() - 1))
    }

    fn load(&self, handle: StorageHandle) -> Option<String> {
        self.blobs.get(handle.0).cloned()
    }

    fn finish_writing(&mut self) {
        debug!(
            "Backing storage sealed: {} payloads kept, {} bytes discarded",
            self.blobs.len(),
            self.discarded_bytes
        );
        self.sealed = true;
    }

    fn reset(&mut self) {
        self.blobs.clear();
        self.discarded_bytes = 0;
        self.sealed = false;
    }
}
