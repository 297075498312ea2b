//! Write-once field filtering.

use indexmap::IndexSet;
use propsync_codec::Payload;
use std::borrow::Cow;

/// Field names that are synced on the first successful cycle only.
///
/// The set is fixed when a scope is mounted and keeps the order in which
/// names were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOnceSet {
    fields: IndexSet<String>,
}

impl WriteOnceSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `name` is write-once.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is write-once.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over names in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for WriteOnceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Strips write-once fields once the first sync has happened.
///
/// Before the first sync, or with an empty set, the payload is returned as
/// is (borrowed). Afterwards a filtered copy is returned; the caller's
/// payload is never modified.
pub fn filter<'a>(
    payload: &'a Payload,
    write_once: &WriteOnceSet,
    already_synced: bool,
) -> Cow<'a, Payload> {
    if !already_synced || write_once.is_empty() {
        return Cow::Borrowed(payload);
    }
    if !payload.keys().any(|name| write_once.contains(name)) {
        return Cow::Borrowed(payload);
    }
    Cow::Owned(payload.without(write_once.iter()))
}
