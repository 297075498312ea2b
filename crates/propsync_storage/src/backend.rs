//! Storage backend trait definition.

use crate::error::StorageResult;

/// A durable key/value backend used by the persistence layer.
///
/// Backends are **opaque byte stores** keyed by name. They do not interpret
/// the bytes they hold; PropSync owns the envelope format.
///
/// # Invariants
///
/// - `get_item` returns exactly the bytes last passed to `set_item` for that
///   name, or `None` if the name was never written or has been removed
/// - `set_item` replaces the previous value as a whole
/// - `remove_item` on an unknown name is not an error
/// - Backends must be `Send + Sync`; every method takes `&self`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - One file per name under a directory
pub trait StorageBackend: Send + Sync {
    /// Reads the value stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the backend is
    /// unavailable.
    fn get_item(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `data` under `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the write fails.
    fn set_item(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes the value stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the removal fails.
    fn remove_item(&self, name: &str) -> StorageResult<()>;
}
