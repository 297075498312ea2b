//! Test fixtures and store helpers.
//!
//! Provides storage backends with observable behavior, merge counters and
//! ready-made contexts for common test scenarios.

use parking_lot::Mutex;
use propsync_codec::{Encode, Envelope, Payload};
use propsync_core::{Store, Subscription};
use propsync_storage::{
    FileBackend, InMemoryBackend, StorageBackend, StorageError, StorageResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber for tests, once per process.
///
/// The filter comes from `RUST_LOG`; output goes through the test writer
/// so it is captured per test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Encodes a persistence envelope, for preloading backends.
pub fn envelope_bytes(state: Payload, version: u32) -> Vec<u8> {
    Envelope::new(state, version)
        .encode()
        .expect("Failed to encode envelope")
}

/// An in-memory backend that counts and records operations.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: InMemoryBackend,
    reads: AtomicUsize,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    removes: AtomicUsize,
}

impl RecordingBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding one envelope.
    pub fn with_envelope(name: &str, state: Payload, version: u32) -> Self {
        let backend = Self::new();
        backend
            .inner
            .set_item(name, &envelope_bytes(state, version))
            .expect("Failed to preload backend");
        backend
    }

    /// Number of `get_item` calls.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set_item` calls.
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Number of `remove_item` calls.
    pub fn remove_count(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    /// Decodes the last envelope written under `name`.
    pub fn last_envelope(&self, name: &str) -> Option<Envelope> {
        use propsync_codec::Decode;

        self.writes
            .lock()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .and_then(|(_, bytes)| Envelope::decode(bytes).ok())
    }
}

impl StorageBackend for RecordingBackend {
    fn get_item(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_item(name)
    }

    fn set_item(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        self.writes.lock().push((name.to_string(), data.to_vec()));
        self.inner.set_item(name, data)
    }

    fn remove_item(&self, name: &str) -> StorageResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_item(name)
    }
}

/// A backend whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingBackend {
    attempts: AtomicUsize,
}

impl FailingBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StorageResult<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("storage disabled for test".into()))
    }
}

impl StorageBackend for FailingBackend {
    fn get_item(&self, _name: &str) -> StorageResult<Option<Vec<u8>>> {
        self.fail()
    }

    fn set_item(&self, _name: &str, _data: &[u8]) -> StorageResult<()> {
        self.fail()
    }

    fn remove_item(&self, _name: &str) -> StorageResult<()> {
        self.fail()
    }
}

/// A file backend in a temporary directory, removed on drop.
pub struct TempFileBackend {
    backend: Arc<FileBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempFileBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileBackend::open(temp_dir.path()).expect("Failed to open file backend");
        Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        }
    }

    /// Returns a shareable handle to the backend.
    pub fn backend(&self) -> Arc<FileBackend> {
        Arc::clone(&self.backend)
    }
}

impl Default for TempFileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempFileBackend {
    type Target = FileBackend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

/// Counts store notifications for as long as it lives.
pub struct MergeCounter {
    count: Arc<AtomicUsize>,
    _subscription: Subscription,
}

impl MergeCounter {
    /// Subscribes a counter to `store`.
    pub fn attach(store: &Store) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let subscription = store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        Self {
            count,
            _subscription: subscription,
        }
    }

    /// Notifications seen so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Ready-made contexts.
pub mod scenarios {
    use propsync_codec::{Payload, Value};
    use propsync_core::{Derived, SyncContext};

    /// A context whose stores start with `{count: 0}`.
    pub fn counter_context() -> SyncContext {
        SyncContext::builder()
            .name("Counter")
            .initializer(|_| Payload::new().with("count", 0))
            .build()
    }

    /// A context deriving `{doubled: base * 2}` when `base` is an integer.
    pub fn doubling_context() -> SyncContext {
        SyncContext::builder()
            .name("Doubler")
            .derive(|inputs, _| match inputs.get("base").and_then(Value::as_integer) {
                Some(base) => Derived::Merge(Payload::new().with("doubled", base * 2)),
                None => Derived::Skip,
            })
            .build()
    }
}
