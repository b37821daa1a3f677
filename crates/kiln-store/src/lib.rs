//! Storage layer for Kiln: per-invocation folders, package metadata, and package manifests.
//!
//! `StoreLayout` allocates the source, build, and package folders of each
//! package build, `MetadataStore` records produced packages with an embedded
//! blake3 checksum, and `PackageManifest` captures the content digest of every
//! file in a package folder so it can be verified later.

pub mod layout;
pub mod manifest;
pub mod metadata;

pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use manifest::{IntegrityReport, PackageManifest, MANIFEST_FILENAME};
pub use metadata::{MetadataStore, PackageMetadata, PackageState};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for '{hash}': expected {expected}, got {actual}")]
    IntegrityFailure {
        hash: String,
        expected: String,
        actual: String,
    },
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("malformed package manifest line {line}: {reason}")]
    MalformedManifest { line: usize, reason: String },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_package_not_found() {
        let e = StoreError::PackageNotFound("pkg123".to_owned());
        assert!(e.to_string().contains("pkg123"));
    }

    #[test]
    fn store_error_display_version_mismatch() {
        let e = StoreError::VersionMismatch {
            expected: 1,
            found: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('7'));
    }

    #[test]
    fn store_error_display_integrity_failure() {
        let e = StoreError::IntegrityFailure {
            hash: "h".to_owned(),
            expected: "exp".to_owned(),
            actual: "act".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exp"));
        assert!(msg.contains("act"));
    }

    #[test]
    fn store_error_display_malformed_manifest() {
        let e = StoreError::MalformedManifest {
            line: 3,
            reason: "missing digest".to_owned(),
        };
        assert!(e.to_string().contains("line 3"));
    }
}
