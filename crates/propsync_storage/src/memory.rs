//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory storage backend.
///
/// This backend stores all items in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Scopes that want save/restore semantics within one process
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use propsync_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.set_item("prefs", b"data").unwrap();
/// assert_eq!(backend.get_item("prefs").unwrap(), Some(b"data".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    items: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with one pre-existing item.
    ///
    /// Useful for testing restore scenarios.
    #[must_use]
    pub fn with_item(name: impl Into<String>, data: Vec<u8>) -> Self {
        let backend = Self::new();
        backend.items.write().insert(name.into(), data);
        backend
    }

    /// Returns a copy of the item stored under `name`.
    #[must_use]
    pub fn item(&self, name: &str) -> Option<Vec<u8>> {
        self.items.read().get(name).cloned()
    }

    /// Returns the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clears all items from the backend.
    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn get_item(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.items.read().get(name).cloned())
    }

    fn set_item(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        self.items.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_item(&self, name: &str) -> StorageResult<()> {
        self.items.write().remove(name);
        Ok(())
    }
}
