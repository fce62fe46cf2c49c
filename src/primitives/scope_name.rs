//! Dotted TextMate scope identifiers
//!
//! A scope such as `comment.line.double-slash` is stored together with its
//! dot-separated components so that ancestry checks compare whole components
//! rather than raw string prefixes (`comment.l` is not an ancestor of
//! `comment.line`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// An immutable, pre-split scope name
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeName {
    raw: String,
    components: Vec<String>,
}

impl ScopeName {
    /// Split `raw` on `.` into components
    ///
    /// Any string is accepted; an empty string yields a single empty component.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let components = raw.split('.').map(str::to_string).collect();
        Self { raw, components }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components, used as the specificity of a theme selector
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// True when `self`'s components are a prefix of `other`'s
    ///
    /// Comparison is component-by-component and case-sensitive.
    pub fn is_ancestor_or_equal(&self, other: &ScopeName) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a == b)
    }

    /// First component (`source`, `text`, `comment`, ...)
    pub fn root(&self) -> &str {
        &self.components[0]
    }
}

impl fmt::Debug for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeName({:?})", self.raw)
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for ScopeName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ScopeName {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl Serialize for ScopeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ScopeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl schemars::JsonSchema for ScopeName {
    fn schema_name() -> Cow<'static, str> {
        "ScopeName".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "description": "Dot-separated TextMate scope, e.g. `comment.line.double-slash`"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let scope = ScopeName::new("source.swift.comment");
        assert_eq!(scope.components(), ["source", "swift", "comment"]);
        assert_eq!(scope.as_str(), "source.swift.comment");
        assert_eq!(scope.root(), "source");
        assert_eq!(scope.depth(), 3);
    }

    #[test]
    fn test_empty_scope_has_one_component() {
        let scope = ScopeName::new("");
        assert_eq!(scope.components(), [""]);
    }

    #[test]
    fn test_ancestry() {
        let comment = ScopeName::new("comment");
        let line = ScopeName::new("comment.line.double-slash");
        assert!(comment.is_ancestor_or_equal(&line));
        assert!(line.is_ancestor_or_equal(&line));
        assert!(!line.is_ancestor_or_equal(&comment));

        assert!(!ScopeName::new("comment.line").is_ancestor_or_equal(&"comment.block".into()));
        // Partial component is not a prefix
        assert!(!ScopeName::new("comment.l").is_ancestor_or_equal(&"comment.line".into()));
        // Case-sensitive
        assert!(!ScopeName::new("Comment").is_ancestor_or_equal(&"comment.line".into()));
    }

    #[test]
    fn test_serde_as_string() {
        let scope: ScopeName = serde_json::from_str("\"keyword.control\"").unwrap();
        assert_eq!(scope, ScopeName::new("keyword.control"));
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"keyword.control\"");
    }
}
