//! Error types for PropSync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in PropSync core operations.
///
/// Only [`CoreError::MissingScope`] ever reaches a reader. Storage, codec
/// and migration errors are produced inside the persistence layer, which
/// logs them and falls back to in-memory state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A reader was used outside any scope of its context.
    #[error("no scope for context {context:?} is active; read it inside Scope::enter")]
    MissingScope {
        /// Name of the context that was read.
        context: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] propsync_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] propsync_codec::CodecError),

    /// A persisted state could not be migrated.
    #[error("migration from version {from} to {to} failed: {message}")]
    Migration {
        /// Version found in storage.
        from: u32,
        /// Version the scope expects.
        to: u32,
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a migration error.
    pub fn migration(from: u32, to: u32, message: impl Into<String>) -> Self {
        Self::Migration {
            from,
            to,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::MissingScope {
            context: "Counter".into(),
        };
        assert!(err.to_string().contains("\"Counter\""));

        let err = CoreError::migration(1, 3, "field renamed");
        assert_eq!(
            err.to_string(),
            "migration from version 1 to 3 failed: field renamed"
        );
    }

    #[test]
    fn wraps_codec_errors() {
        let err: CoreError = propsync_codec::CodecError::NaNForbidden.into();
        assert!(matches!(err, CoreError::Codec(_)));
    }
}
