//! Filesystem and object-store locations.
//!
//! URI privileges govern data movement (loading from and exporting to
//! paths). They are compared by path prefix on a normalized location string.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Errors that can occur while parsing a location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    /// The location is empty.
    #[error("Empty location")]
    Empty,

    /// The location has no scheme (e.g. a bare relative path).
    #[error("Location '{0}' has no scheme")]
    MissingScheme(String),

    /// The location is not hierarchical (e.g. `mailto:x`).
    #[error("Location '{0}' is not a hierarchical path")]
    NotHierarchical(String),

    /// Query strings and fragments are not part of a location.
    #[error("Location '{0}' must not contain a query or fragment")]
    QueryOrFragment(String),

    /// The location could not be parsed.
    #[error("Invalid location '{uri}': {reason}")]
    Invalid {
        /// The rejected location.
        uri: String,
        /// Parser message.
        reason: String,
    },
}

/// A normalized location: `scheme://authority/absolute/path`.
///
/// Normalization lower-cases scheme and authority, resolves `.` and `..`
/// segments, collapses repeated separators and strips trailing ones, so
/// `file:/data`, `file:///data/` and `FILE:///data` are the same location.
/// The path itself stays case sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UriScope {
    normalized: String,
}

impl UriScope {
    /// Parse and normalize a location.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] for empty, scheme-less, non-hierarchical or
    /// unparsable locations, and for locations carrying a query or fragment.
    pub fn parse(value: &str) -> Result<Self, UriError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(UriError::Empty);
        }

        let url = Url::parse(value).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => UriError::MissingScheme(value.to_string()),
            other => UriError::Invalid {
                uri: value.to_string(),
                reason: other.to_string(),
            },
        })?;

        if url.cannot_be_a_base() {
            return Err(UriError::NotHierarchical(value.to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(UriError::QueryOrFragment(value.to_string()));
        }

        let mut authority = url.host_str().unwrap_or_default().to_lowercase();
        if let Some(port) = url.port() {
            authority.push(':');
            authority.push_str(&port.to_string());
        }

        let path = url
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(segment);
                acc
            });

        Ok(Self {
            normalized: format!("{}://{}{}", url.scheme(), authority, path),
        })
    }

    /// Qualify an absolute local filesystem path with the `file` scheme.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if the path is relative or otherwise invalid.
    pub fn local(path: &str) -> Result<Self, UriError> {
        let path = path.trim();
        if path.contains("://") || path.starts_with("file:") {
            return Self::parse(path);
        }
        if !path.starts_with('/') {
            return Err(UriError::MissingScheme(path.to_string()));
        }
        Self::parse(&format!("file://{path}"))
    }

    /// The normalized location string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Whether this (granted) location is a path prefix of the requested one.
    ///
    /// The character following the shared prefix in the request must be a
    /// separator or the end of the string, so `/data1` does not cover
    /// `/data12`.
    #[must_use]
    pub fn covers(&self, requested: &UriScope) -> bool {
        match requested.normalized.strip_prefix(&self.normalized) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Length of the shared prefix, counted in whole path components.
    #[must_use]
    pub fn common_prefix_len(&self, other: &UriScope) -> usize {
        self.normalized
            .split('/')
            .zip(other.normalized.split('/'))
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Display for UriScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl std::str::FromStr for UriScope {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UriScope {
    type Error = UriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UriScope> for String {
    fn from(value: UriScope) -> Self {
        value.normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(value: &str) -> UriScope {
        UriScope::parse(value).unwrap()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(uri("file:/data/in").as_str(), "file:///data/in");
        assert_eq!(uri("file:///data/in/").as_str(), "file:///data/in");
        assert_eq!(uri("FILE:///data//in").as_str(), "file:///data/in");
        assert_eq!(
            uri("hdfs://NameNode:8020/user/hive/").as_str(),
            "hdfs://namenode:8020/user/hive"
        );
        assert_eq!(uri("file:///data/in/../out").as_str(), "file:///data/out");
    }

    #[test]
    fn test_path_case_is_preserved() {
        assert_ne!(uri("file:///Data"), uri("file:///data"));
    }

    #[test]
    fn test_prefix_boundary() {
        let grant = uri("file:///a/b");
        assert!(grant.covers(&uri("file:///a/b")));
        assert!(grant.covers(&uri("file:///a/b/c")));
        assert!(!grant.covers(&uri("file:///a/bc")));
        assert!(!grant.covers(&uri("file:///a")));
    }

    #[test]
    fn test_scheme_and_authority_must_match() {
        let grant = uri("hdfs://nn1/warehouse");
        assert!(!grant.covers(&uri("hdfs://nn2/warehouse/t1")));
        assert!(!grant.covers(&uri("file:///warehouse/t1")));
    }

    #[test]
    fn test_parent_traversal_cannot_escape_grant() {
        let grant = uri("file:///allowed");
        assert!(!grant.covers(&uri("file:///allowed/../restricted/x.dat")));
    }

    #[test]
    fn test_local_paths() {
        assert_eq!(
            UriScope::local("/tmp/kv1.dat").unwrap().as_str(),
            "file:///tmp/kv1.dat"
        );
        assert_eq!(
            UriScope::local("file:/tmp/kv1.dat").unwrap().as_str(),
            "file:///tmp/kv1.dat"
        );
        assert!(matches!(
            UriScope::local("relative/path"),
            Err(UriError::MissingScheme(_))
        ));
    }

    #[test]
    fn test_invalid_locations() {
        assert_eq!(UriScope::parse("  "), Err(UriError::Empty));
        assert!(matches!(
            UriScope::parse("/no/scheme"),
            Err(UriError::MissingScheme(_))
        ));
        assert!(matches!(
            UriScope::parse("mailto:someone@example.com"),
            Err(UriError::NotHierarchical(_))
        ));
        assert!(matches!(
            UriScope::parse("file:///data?x=1"),
            Err(UriError::QueryOrFragment(_))
        ));
    }
}
