//! Opaque cache keys.

use std::fmt;

/// Identifies one cached result. Built from one or more string parts,
/// e.g. `["questions", "42"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(part: impl Into<String>) -> Self {
        QueryKey(vec![part.into()])
    }

    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` starts with every part of `prefix`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for QueryKey {
    fn from(part: &str) -> Self {
        QueryKey::new(part)
    }
}

impl From<String> for QueryKey {
    fn from(part: String) -> Self {
        QueryKey::new(part)
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(parts: [&str; N]) -> Self {
        QueryKey::from_parts(parts)
    }
}
