use crate::StoreError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Name of the manifest file written at the root of every package folder.
pub const MANIFEST_FILENAME: &str = "kilnmanifest.txt";

/// Content digest of every file in a package folder, keyed by relative path.
///
/// Serialized one entry per line as `<relative/path>: <blake3 hex>`, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageManifest {
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub checked: usize,
    pub passed: usize,
    pub missing: Vec<String>,
    pub modified: Vec<String>,
    pub unexpected: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.modified.is_empty() && self.unexpected.is_empty()
    }
}

impl PackageManifest {
    /// Hash every regular file under `package_dir`, except the manifest itself.
    pub fn compute(package_dir: &Path) -> Result<Self, StoreError> {
        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(package_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative_key(package_dir, entry.path());
            if rel == MANIFEST_FILENAME {
                continue;
            }
            let digest = blake3::hash(&fs::read(entry.path())?).to_hex().to_string();
            entries.insert(rel, digest);
        }
        Ok(Self { entries })
    }

    pub fn files(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, digest) in &self.entries {
            let _ = writeln!(out, "{path}: {digest}");
        }
        out
    }

    pub fn parse(content: &str) -> Result<Self, StoreError> {
        let mut entries = BTreeMap::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((path, digest)) = line.rsplit_once(": ") else {
                return Err(StoreError::MalformedManifest {
                    line: idx + 1,
                    reason: "expected '<path>: <digest>'".to_owned(),
                });
            };
            let digest = digest.trim();
            if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(StoreError::MalformedManifest {
                    line: idx + 1,
                    reason: format!("invalid digest '{digest}'"),
                });
            }
            entries.insert(path.to_owned(), digest.to_owned());
        }
        Ok(Self { entries })
    }

    pub fn write_to(&self, package_dir: &Path) -> Result<(), StoreError> {
        fs::write(package_dir.join(MANIFEST_FILENAME), self.render())?;
        Ok(())
    }

    pub fn read_from(package_dir: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(package_dir.join(MANIFEST_FILENAME))?;
        Self::parse(&content)
    }

    /// Compare the current contents of `package_dir` against this manifest.
    pub fn verify(&self, package_dir: &Path) -> Result<IntegrityReport, StoreError> {
        let current = Self::compute(package_dir)?;
        let mut report = IntegrityReport {
            checked: self.entries.len(),
            ..Default::default()
        };

        for (path, expected) in &self.entries {
            match current.entries.get(path) {
                None => report.missing.push(path.clone()),
                Some(actual) if actual != expected => report.modified.push(path.clone()),
                Some(_) => report.passed += 1,
            }
        }
        for path in current.entries.keys() {
            if !self.entries.contains_key(path) {
                report.unexpected.push(path.clone());
            }
        }

        Ok(report)
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("include/demo")).unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("include/demo/a.h"), "#pragma once\n").unwrap();
        fs::write(dir.path().join("lib/libdemo.a"), b"!<arch>\n").unwrap();
        dir
    }

    #[test]
    fn compute_lists_files_with_forward_slashes() {
        let dir = sample_package();
        let manifest = PackageManifest::compute(dir.path()).unwrap();
        assert_eq!(manifest.files(), vec!["include/demo/a.h", "lib/libdemo.a"]);
    }

    #[test]
    fn write_read_roundtrip_excludes_itself() {
        let dir = sample_package();
        let manifest = PackageManifest::compute(dir.path()).unwrap();
        manifest.write_to(dir.path()).unwrap();

        let loaded = PackageManifest::read_from(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        let recomputed = PackageManifest::compute(dir.path()).unwrap();
        assert_eq!(recomputed, manifest);
    }

    #[test]
    fn clean_package_verifies() {
        let dir = sample_package();
        let manifest = PackageManifest::compute(dir.path()).unwrap();
        let report = manifest.verify(dir.path()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.checked, 2);
        assert_eq!(report.passed, 2);
    }

    #[test]
    fn detects_modified_missing_and_unexpected_files() {
        let dir = sample_package();
        let manifest = PackageManifest::compute(dir.path()).unwrap();

        fs::write(dir.path().join("include/demo/a.h"), "changed").unwrap();
        fs::remove_file(dir.path().join("lib/libdemo.a")).unwrap();
        fs::write(dir.path().join("lib/extra.so"), "x").unwrap();

        let report = manifest.verify(dir.path()).unwrap();
        assert_eq!(report.modified, vec!["include/demo/a.h"]);
        assert_eq!(report.missing, vec!["lib/libdemo.a"]);
        assert_eq!(report.unexpected, vec!["lib/extra.so"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            PackageManifest::parse("lib/a.so\n"),
            Err(StoreError::MalformedManifest { line: 1, .. })
        ));
        assert!(PackageManifest::parse("lib/a.so: nothex\n").is_err());
    }
}
