//! Named-field value bags.

use crate::value::Value;
use indexmap::IndexMap;

/// An insertion-ordered mapping from field name to [`Value`].
///
/// Payloads are what the host hands to each sync cycle, what the derive
/// stage returns, and what the store holds. Equality (`==`) is structural
/// and ignores insertion order.
///
/// # Example
///
/// ```rust
/// use propsync_codec::{Payload, Value};
///
/// let props = Payload::new().with("label", "x").with("count", 3);
/// assert_eq!(props.get("count"), Some(&Value::Integer(3)));
/// assert_eq!(props.keys().collect::<Vec<_>>(), vec!["label", "count"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: IndexMap<String, Value>,
}

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty payload with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field, returning the previous value if one existed.
    ///
    /// Replacing an existing field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Removes a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Returns the value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns true if the field exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterates over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    /// Shallow merge: overlays every field of `other` onto `self`.
    ///
    /// Fields of `self` that `other` does not mention are kept.
    pub fn overlay(&mut self, other: &Payload) {
        for (name, value) in &other.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// Returns a copy of `self` with `other` overlaid.
    #[must_use]
    pub fn merged(&self, other: &Payload) -> Payload {
        let mut result = self.clone();
        result.overlay(other);
        result
    }

    /// Returns a copy without the named fields.
    ///
    /// Names that are not present are ignored.
    #[must_use]
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Payload {
        let mut result = self.clone();
        for name in names {
            result.fields.shift_remove(name);
        }
        result
    }

    /// Keeps only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|k, v| keep(k.as_str(), v));
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = Payload::new();
        payload.extend(iter);
        payload
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Payload {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.fields.insert(k.into(), v.into());
        }
    }
}

impl IntoIterator for Payload {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
