// src/error.rs

//! Error types for ctorgraft
//!
//! Every failure aborts the whole run. Variants that concern a single patch
//! carry the patch label and the offending type name so the patch list can
//! be updated after an upstream library upgrade.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ctorgraft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TypeNotFound,
    DelegateNotFound,
    AmbiguousDelegate,
    NotAClass,
    ArchiveIo,
    InvalidSpec,
    ClassFormat,
    SourceParse,
    Divergence,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Target declaration is absent from the input (upstream version skew)
    #[error("patch '{patch}': type {type_name} not found")]
    TypeNotFound { patch: String, type_name: String },

    /// No existing constructor has the delegate signature
    #[error("patch '{patch}': {type_name} has no constructor {signature} to delegate to")]
    DelegateNotFound {
        patch: String,
        type_name: String,
        signature: String,
    },

    /// More than one existing constructor matches the delegate signature
    #[error("patch '{patch}': {count} constructors of {type_name} match {signature}")]
    AmbiguousDelegate {
        patch: String,
        type_name: String,
        signature: String,
        count: usize,
    },

    /// Target resolves to a type that cannot take a delegating constructor
    #[error("patch '{patch}': {type_name} is declared as {kind} and cannot take a constructor")]
    NotAClass {
        patch: String,
        type_name: String,
        kind: String,
    },

    /// I/O failure while reading, writing or walking archives and trees
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed or unreadable zip archive
    #[error("archive error in {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Archive entry name escapes the extraction root
    #[error("path traversal attempt: {0}")]
    PathTraversal(String),

    /// Invalid path (empty after sanitization, not under the walked root)
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Patch list failed validation or could not be parsed
    #[error("invalid patch specification: {0}")]
    InvalidSpec(String),

    /// Class file could not be decoded or re-encoded
    #[error("malformed class file {entry}: {reason}")]
    ClassFormat { entry: String, reason: String },

    /// Java source could not be parsed into a usable tree
    #[error("cannot parse {path}: {reason}")]
    SourceParse { path: String, reason: String },

    /// The binary and source pipelines disagree on a patch
    #[error("patch '{patch}': binary and source pipelines diverge on {type_name}: {reason}")]
    Divergence {
        patch: String,
        type_name: String,
        reason: String,
    },
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a zip error with the archive it happened in
    pub fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }

    pub fn class_format(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClassFormat {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeNotFound { .. } => ErrorKind::TypeNotFound,
            Self::DelegateNotFound { .. } => ErrorKind::DelegateNotFound,
            Self::AmbiguousDelegate { .. } => ErrorKind::AmbiguousDelegate,
            Self::NotAClass { .. } => ErrorKind::NotAClass,
            Self::Io { .. } | Self::Zip { .. } | Self::PathTraversal(_) | Self::InvalidPath(_) => {
                ErrorKind::ArchiveIo
            }
            Self::InvalidSpec(_) => ErrorKind::InvalidSpec,
            Self::ClassFormat { .. } => ErrorKind::ClassFormat,
            Self::SourceParse { .. } => ErrorKind::SourceParse,
            Self::Divergence { .. } => ErrorKind::Divergence,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidSpec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = Error::TypeNotFound {
            patch: "widget".to_string(),
            type_name: "pkg.Widget".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TypeNotFound);

        let err = Error::io("/tmp/x.jar", io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::ArchiveIo);
        assert_eq!(Error::PathTraversal("../x".into()).kind(), ErrorKind::ArchiveIo);
    }

    #[test]
    fn test_error_message_names_patch_and_type() {
        let err = Error::DelegateNotFound {
            patch: "executor".to_string(),
            type_name: "org.example.Executor".to_string(),
            signature: "(java.lang.String)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("executor"));
        assert!(msg.contains("org.example.Executor"));
        assert!(msg.contains("(java.lang.String)"));
    }
}
