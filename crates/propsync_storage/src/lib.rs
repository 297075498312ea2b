//! # PropSync Storage
//!
//! Durable key/value backends for PropSync persistence.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! persistence layer. Backends are **opaque byte stores** keyed by name -
//! they do not interpret the data they store.
//!
//! ## Design Principles
//!
//! - Backends are simple named byte stores (get, set, remove)
//! - No knowledge of the envelope format
//! - Must be `Send + Sync` for sharing between scopes
//! - PropSync owns all format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - One file per item under a directory
//!
//! ## Example
//!
//! ```rust
//! use propsync_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.set_item("settings", b"hello world").unwrap();
//! assert_eq!(backend.get_item("settings").unwrap().as_deref(), Some(&b"hello world"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
