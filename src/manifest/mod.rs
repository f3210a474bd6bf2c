//! The Source Manifest: the ordered list of documentation sources the
//! assistant answers from, and how two manifests are compared when deciding
//! whether cached passages still describe the configured sources.


use serde::{Deserialize, Serialize};
use std::fmt;

/// How a requested manifest is compared with the one recorded in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestComparison {
    /// Both manifests are sorted before comparison, so reordering sources is not a change
    #[default]
    Sorted,
    /// Manifests are compared element by element, so reordering sources is a change
    Ordered,
}

/// Ordered sequence of source identifiers (documentation URLs)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceManifest(Vec<String>);

impl SourceManifest {
    #[inline]
    pub fn new(sources: Vec<String>) -> Self {
        Self(sources)
    }

    #[inline]
    pub fn sources(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this manifest differs from a previously recorded one.
    ///
    /// A missing previous manifest always counts as a change.
    #[inline]
    pub fn differs_from(&self, previous: Option<&Self>, comparison: ManifestComparison) -> bool {
        let Some(previous) = previous else {
            return true;
        };

        match comparison {
            ManifestComparison::Ordered => self.0 != previous.0,
            ManifestComparison::Sorted => self.sorted() != previous.sorted(),
        }
    }

    fn sorted(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.0.iter().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}

impl From<Vec<String>> for SourceManifest {
    #[inline]
    fn from(sources: Vec<String>) -> Self {
        Self(sources)
    }
}

impl<'a> IntoIterator for &'a SourceManifest {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for SourceManifest {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
