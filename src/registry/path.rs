//! Stream path key
//!
//! A `StreamPath` identifies one logical stream in the registry.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Unique identifier for a stream (e.g. `live/cam1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamPath(String);

impl StreamPath {
    /// Create a new stream path
    ///
    /// Surrounding slashes are trimmed so `/live/cam1` and `live/cam1`
    /// refer to the same stream.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(path.as_ref().trim_matches('/').to_string())
    }

    /// Borrow the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for StreamPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl Borrow<str> for StreamPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_slashes() {
        assert_eq!(StreamPath::new("/live/cam1/"), StreamPath::new("live/cam1"));
        assert_eq!(StreamPath::new("/live/cam1").as_str(), "live/cam1");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&StreamPath::new("live/cam1")).unwrap();
        assert_eq!(json, "\"live/cam1\"");
    }
}
