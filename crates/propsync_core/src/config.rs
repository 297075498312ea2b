//! Scope and persistence configuration.

use crate::error::CoreResult;
use crate::gate::WriteOnceSet;
use propsync_codec::Payload;
use propsync_storage::StorageBackend;
use std::fmt;
use std::sync::Arc;

/// Migrates a persisted state from an older version.
///
/// Receives the stored state and the version it was written with.
pub type MigrateFn = Arc<dyn Fn(Payload, u32) -> CoreResult<Payload> + Send + Sync>;

/// Selects the part of the state that gets persisted.
pub type PartializeFn = Arc<dyn Fn(&Payload) -> Payload + Send + Sync>;

/// Combines a restored state with the current one: `(persisted, current)`.
pub type MergeFn = Arc<dyn Fn(Payload, &Payload) -> Payload + Send + Sync>;

/// Configuration for mounting a scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeConfig {
    /// Fields synced on the first cycle only.
    pub write_once: WriteOnceSet,

    /// Optional persistence.
    pub persist: Option<PersistOptions>,
}

impl ScopeConfig {
    /// Creates a configuration with no write-once fields and no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write-once field names.
    #[must_use]
    pub fn write_once<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_once = fields.into_iter().collect();
        self
    }

    /// Enables persistence.
    #[must_use]
    pub fn persist(mut self, options: PersistOptions) -> Self {
        self.persist = Some(options);
        self
    }
}

/// Persistence options for a scope's store.
#[derive(Clone)]
pub struct PersistOptions {
    /// Name the envelope is stored under.
    pub name: String,

    /// Backend holding the envelope.
    pub storage: Arc<dyn StorageBackend>,

    /// Version written into the envelope.
    pub version: u32,

    /// Migration from older versions. Without it, a stored envelope with a
    /// different version is discarded.
    pub migrate: Option<MigrateFn>,

    /// State selection before saving. Defaults to every persistable field.
    pub partialize: Option<PartializeFn>,

    /// Restore strategy. Defaults to a shallow overlay of persisted fields
    /// onto the current state.
    pub merge: Option<MergeFn>,

    /// Skips the automatic restore at mount.
    pub skip_hydration: bool,
}

impl PersistOptions {
    /// Creates options with version 0 and default strategies.
    pub fn new(name: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            name: name.into(),
            storage,
            version: 0,
            migrate: None,
            partialize: None,
            merge: None,
            skip_hydration: false,
        }
    }

    /// Sets the envelope version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the migration function.
    #[must_use]
    pub fn migrate<F>(mut self, migrate: F) -> Self
    where
        F: Fn(Payload, u32) -> CoreResult<Payload> + Send + Sync + 'static,
    {
        self.migrate = Some(Arc::new(migrate));
        self
    }

    /// Sets the state selection applied before saving.
    #[must_use]
    pub fn partialize<F>(mut self, partialize: F) -> Self
    where
        F: Fn(&Payload) -> Payload + Send + Sync + 'static,
    {
        self.partialize = Some(Arc::new(partialize));
        self
    }

    /// Sets the restore strategy.
    #[must_use]
    pub fn merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(Payload, &Payload) -> Payload + Send + Sync + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// Sets whether the automatic restore at mount is skipped.
    #[must_use]
    pub fn skip_hydration(mut self, value: bool) -> Self {
        self.skip_hydration = value;
        self
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("migrate", &self.migrate.is_some())
            .field("partialize", &self.partialize.is_some())
            .field("merge", &self.merge.is_some())
            .field("skip_hydration", &self.skip_hydration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propsync_storage::InMemoryBackend;

    #[test]
    fn default_scope_config() {
        let config = ScopeConfig::default();
        assert!(config.write_once.is_empty());
        assert!(config.persist.is_none());
    }

    #[test]
    fn builder_pattern() {
        let storage = Arc::new(InMemoryBackend::new());
        let config = ScopeConfig::new()
            .write_once(["seed", "id"])
            .persist(PersistOptions::new("prefs", storage).version(2).skip_hydration(true));

        assert!(config.write_once.contains("seed"));
        assert_eq!(config.write_once.len(), 2);

        let persist = config.persist.unwrap();
        assert_eq!(persist.name, "prefs");
        assert_eq!(persist.version, 2);
        assert!(persist.skip_hydration);
        assert!(persist.migrate.is_none());
    }

    #[test]
    fn persist_options_debug_hides_closures() {
        let options = PersistOptions::new("prefs", Arc::new(InMemoryBackend::new()))
            .partialize(|state| state.clone());
        let debug = format!("{options:?}");
        assert!(debug.contains("partialize: true"));
        assert!(debug.contains("\"prefs\""));
    }
}
