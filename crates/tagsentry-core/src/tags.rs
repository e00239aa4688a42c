//! # Tag Maps
//!
//! An unordered string-to-string tag map backed by a `BTreeMap` so that
//! iteration, serialization, and test expectations are deterministic.
//!
//! Merging is an explicit operation returning a *new* map — evaluation and
//! application never share a mutable tag map, so there is no aliasing path
//! through which an in-flight remediation can corrupt an evaluation input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A resource's tag set. Never null — an untagged resource carries an
/// empty map, not an absence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Look up a tag value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Whether a tag with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Insert a tag, returning the previous value if the name existed.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Return a new map holding `self` ∪ `incoming`, with `incoming`
    /// taking precedence on name collisions. Neither input is mutated.
    pub fn merged(&self, incoming: &Tags) -> Tags {
        let mut out = self.0.clone();
        for (name, value) in &incoming.0 {
            out.insert(name.clone(), value.clone());
        }
        Tags(out)
    }

    /// Access the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for Tags {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_prefers_incoming_on_collision() {
        let existing: Tags = [("env", "staging"), ("owner", "alice")].into_iter().collect();
        let incoming: Tags = [("env", "prod"), ("cost-center", "42")].into_iter().collect();

        let merged = existing.merged(&incoming);
        assert_eq!(merged.get("env"), Some("prod"));
        assert_eq!(merged.get("owner"), Some("alice"));
        assert_eq!(merged.get("cost-center"), Some("42"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merged_leaves_inputs_untouched() {
        let existing: Tags = [("env", "staging")].into_iter().collect();
        let incoming: Tags = [("env", "prod")].into_iter().collect();

        let _ = existing.merged(&incoming);
        assert_eq!(existing.get("env"), Some("staging"));
        assert_eq!(incoming.get("env"), Some("prod"));
    }

    #[test]
    fn merged_with_empty_is_identity() {
        let tags: Tags = [("owner", "alice")].into_iter().collect();
        assert_eq!(tags.merged(&Tags::new()), tags);
        assert_eq!(Tags::new().merged(&tags), tags);
    }

    #[test]
    fn serializes_as_plain_map() {
        let tags: Tags = [("env", "prod")].into_iter().collect();
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"env":"prod"}"#);

        let back: Tags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
    }
}
