//! Metric identity
//!
//! A metric is identified by its name within a category of a context. The
//! unit and tags travel with it into every snapshot.

use std::collections::BTreeSet;
use std::fmt;

/// Name, unit and tags of a metric
///
/// Immutable once created; `with_tag` consumes and returns a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    name: String,
    unit: String,
    tags: BTreeSet<String>,
}

impl MetricIdentity {
    /// Create an identity with no tags
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[inline]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}

impl From<&str> for MetricIdentity {
    fn from(name: &str) -> Self {
        Self::new(name, "")
    }
}

impl From<String> for MetricIdentity {
    fn from(name: String) -> Self {
        Self::new(name, "")
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
