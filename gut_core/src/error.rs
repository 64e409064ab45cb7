//! Error types for gut_core.

use crate::hash::Hash;
use crate::object::ObjectType;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using gut_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// No object is stored under the address (or matches the prefix).
    #[error("Object not found: {hash}")]
    ObjectNotFound { hash: String },

    /// A short address matches more than one stored object.
    #[error("Ambiguous address {prefix}: candidates are {}", .candidates.join(", "))]
    AmbiguousAddress {
        prefix: String,
        candidates: Vec<String>,
    },

    /// Object bytes do not decode: bad framing, length mismatch, digest mismatch.
    #[error("Malformed object{}: {reason}", describe_hash(.hash))]
    MalformedObject { hash: Option<Hash>, reason: String },

    /// The header carries a type tag other than blob, tree, commit or tag.
    #[error("Unknown object type '{type_name}'{}", describe_hash(.hash))]
    UnknownObjectType {
        hash: Option<Hash>,
        type_name: String,
    },

    /// A healthy object of a different kind than the caller asked for.
    #[error("Object {hash} is a {found}, expected a {expected}")]
    TypeMismatch {
        hash: Hash,
        expected: ObjectType,
        found: ObjectType,
    },

    /// A tree entry ends before its 20-byte address.
    #[error("Truncated tree entry: need {needed} address bytes, {remaining} remaining")]
    TruncatedTree { needed: usize, remaining: usize },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Invalid tree entry.
    #[error("Invalid tree entry: {reason}")]
    InvalidTreeEntry { reason: String },

    /// Commit or tag header key that would not survive serialization.
    #[error("Invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// Repository is missing or not usable.
    #[error("Invalid repository at {path}: {reason}")]
    InvalidRepository { path: PathBuf, reason: String },

    /// Config file could not be parsed.
    #[error("Config error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

fn describe_hash(hash: &Option<Hash>) -> String {
    match hash {
        Some(hash) => format!(" {}", hash),
        None => String::new(),
    }
}

impl Error {
    /// Create an ObjectNotFound error.
    pub fn object_not_found(hash: impl Into<String>) -> Self {
        Error::ObjectNotFound { hash: hash.into() }
    }

    /// Create an AmbiguousAddress error.
    pub fn ambiguous_address(prefix: impl Into<String>, candidates: Vec<String>) -> Self {
        Error::AmbiguousAddress {
            prefix: prefix.into(),
            candidates,
        }
    }

    /// Create a MalformedObject error with no address attached yet.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            hash: None,
            reason: reason.into(),
        }
    }

    /// Create a MalformedObject error for a known address.
    pub fn malformed_object(hash: Hash, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            hash: Some(hash),
            reason: reason.into(),
        }
    }

    /// Create an UnknownObjectType error with no address attached yet.
    pub fn unknown_object_type(type_name: impl Into<String>) -> Self {
        Error::UnknownObjectType {
            hash: None,
            type_name: type_name.into(),
        }
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(hash: Hash, expected: ObjectType, found: ObjectType) -> Self {
        Error::TypeMismatch {
            hash,
            expected,
            found,
        }
    }

    /// Create a TruncatedTree error.
    pub fn truncated_tree(needed: usize, remaining: usize) -> Self {
        Error::TruncatedTree { needed, remaining }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an InvalidTreeEntry error.
    pub fn invalid_tree_entry(reason: impl Into<String>) -> Self {
        Error::InvalidTreeEntry {
            reason: reason.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            reason: reason.into(),
        }
    }

    /// Create an InvalidRepository error.
    pub fn invalid_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Config error.
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Attach the address of the object being read.
    ///
    /// Decode errors raised by the typed parsers do not know which object they
    /// came from; the read path re-tags them here. A truncated tree is a
    /// corrupt object from the caller's point of view.
    pub fn for_object(self, object: Hash) -> Self {
        match self {
            Error::MalformedObject { hash: None, reason } => Error::MalformedObject {
                hash: Some(object),
                reason,
            },
            Error::UnknownObjectType {
                hash: None,
                type_name,
            } => Error::UnknownObjectType {
                hash: Some(object),
                type_name,
            },
            Error::TruncatedTree { needed, remaining } => Error::MalformedObject {
                hash: Some(object),
                reason: format!(
                    "truncated tree entry: need {} address bytes, {} remaining",
                    needed, remaining
                ),
            },
            other => other,
        }
    }

    /// True for the conditions callers are expected to probe for.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_object_tags_malformed() {
        let hash = Hash::hash_bytes(b"x");
        let err = Error::malformed("bad length").for_object(hash);
        match err {
            Error::MalformedObject { hash: Some(h), reason } => {
                assert_eq!(h, hash);
                assert_eq!(reason, "bad length");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_for_object_converts_truncated_tree() {
        let hash = Hash::hash_bytes(b"x");
        let err = Error::truncated_tree(20, 3).for_object(hash);
        assert!(matches!(err, Error::MalformedObject { hash: Some(_), .. }));
    }

    #[test]
    fn test_for_object_leaves_io_alone() {
        let hash = Hash::hash_bytes(b"x");
        let err = Error::from(std::io::Error::other("disk")).for_object(hash);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_display_includes_address() {
        let hash = Hash::hash_bytes(b"x");
        let err = Error::malformed_object(hash, "digest mismatch");
        let text = err.to_string();
        assert!(text.contains(&hash.to_hex()));
        assert!(text.contains("digest mismatch"));

        let err = Error::ambiguous_address("ab", vec!["ab01".into(), "ab02".into()]);
        assert_eq!(err.to_string(), "Ambiguous address ab: candidates are ab01, ab02");
    }

    #[test]
    fn test_type_mismatch_is_not_corruption() {
        let hash = Hash::hash_bytes(b"x");
        let err = Error::type_mismatch(hash, ObjectType::Commit, ObjectType::Blob);
        assert_eq!(
            err.to_string(),
            format!("Object {} is a blob, expected a commit", hash)
        );
        assert!(!matches!(err, Error::MalformedObject { .. }));
    }
}
