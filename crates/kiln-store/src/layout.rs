use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current store format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout of a Kiln store.
///
/// Each package build owns `work/<package_id>/{source,build,package}` for the
/// duration of one invocation. Metadata about finished packages lives under
/// `store/metadata`. Directories are created on [`initialize`](Self::initialize)
/// or per package on [`prepare_work`](Self::prepare_work).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("store").join("metadata")
    }

    #[inline]
    pub fn work_dir(&self) -> PathBuf {
        self.root.join("work")
    }

    #[inline]
    pub fn work_path(&self, package_id: &str) -> PathBuf {
        self.work_dir().join(package_id)
    }

    /// Populated by source acquisition.
    #[inline]
    pub fn source_dir(&self, package_id: &str) -> PathBuf {
        self.work_path(package_id).join("source")
    }

    /// Root the native build runs in; a copy of the source tree.
    #[inline]
    pub fn build_dir(&self, package_id: &str) -> PathBuf {
        self.work_path(package_id).join("build")
    }

    /// Final package contents: headers, link artifacts, runtime artifacts.
    #[inline]
    pub fn package_dir(&self, package_id: &str) -> PathBuf {
        self.work_path(package_id).join("package")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("store").join(".lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.metadata_dir())?;
        fs::create_dir_all(self.work_dir())?;

        let version_path = self.root.join("store").join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let store_dir = self.root.join("store");
            let mut tmp = NamedTempFile::new_in(&store_dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| StoreError::Io(e.error))?;
            crate::fsync_dir(&store_dir)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.root.join("store").join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }

    /// Create fresh source, build, and package folders for one invocation.
    ///
    /// Leftovers from an earlier invocation of the same package are removed
    /// first, so every build starts from empty folders.
    pub fn prepare_work(&self, package_id: &str) -> Result<(), StoreError> {
        let work = self.work_path(package_id);
        if work.exists() {
            fs::remove_dir_all(&work)?;
        }
        fs::create_dir_all(self.source_dir(package_id))?;
        fs::create_dir_all(self.build_dir(package_id))?;
        fs::create_dir_all(self.package_dir(package_id))?;
        Ok(())
    }

    /// Remove the source and build folders, keeping the package folder.
    pub fn clean_intermediates(&self, package_id: &str) -> Result<(), StoreError> {
        for dir in [self.source_dir(package_id), self.build_dir(package_id)] {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    pub fn remove_work(&self, package_id: &str) -> Result<(), StoreError> {
        let work = self.work_path(package_id);
        if work.exists() {
            fs::remove_dir_all(&work)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/kiln-test");
        assert_eq!(
            layout.metadata_dir(),
            PathBuf::from("/tmp/kiln-test/store/metadata")
        );
        assert_eq!(layout.work_dir(), PathBuf::from("/tmp/kiln-test/work"));
        assert_eq!(
            layout.source_dir("abc123"),
            PathBuf::from("/tmp/kiln-test/work/abc123/source")
        );
        assert_eq!(
            layout.build_dir("abc123"),
            PathBuf::from("/tmp/kiln-test/work/abc123/build")
        );
        assert_eq!(
            layout.package_dir("abc123"),
            PathBuf::from("/tmp/kiln-test/work/abc123/package")
        );
        assert_eq!(
            layout.lock_file(),
            PathBuf::from("/tmp/kiln-test/store/.lock")
        );
    }

    #[test]
    fn initialize_creates_directories_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        assert!(layout.metadata_dir().is_dir());
        assert!(layout.work_dir().is_dir());
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn version_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        fs::write(
            dir.path().join("store").join(VERSION_FILE),
            r#"{"format_version": 99}"#,
        )
        .unwrap();
        assert!(matches!(
            layout.initialize(),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn prepare_work_starts_from_empty_folders() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.prepare_work("pkg").unwrap();
        fs::write(layout.package_dir("pkg").join("stale.txt"), "old").unwrap();

        layout.prepare_work("pkg").unwrap();
        assert!(layout.source_dir("pkg").is_dir());
        assert!(layout.build_dir("pkg").is_dir());
        assert!(!layout.package_dir("pkg").join("stale.txt").exists());
    }

    #[test]
    fn clean_intermediates_keeps_package() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.prepare_work("pkg").unwrap();
        layout.clean_intermediates("pkg").unwrap();
        assert!(!layout.source_dir("pkg").exists());
        assert!(!layout.build_dir("pkg").exists());
        assert!(layout.package_dir("pkg").is_dir());

        layout.remove_work("pkg").unwrap();
        assert!(!layout.work_path("pkg").exists());
    }
}
