use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use kiln_schema::{PackageId, ResolvedOptions, Revision, Settings, ShortId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Lifecycle position of one package build, in the only order it may advance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum PackageState {
    Configured,
    SourceAcquired,
    Built,
    Packaged,
    Described,
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageState::Configured => write!(f, "configured"),
            PackageState::SourceAcquired => write!(f, "source-acquired"),
            PackageState::Built => write!(f, "built"),
            PackageState::Packaged => write!(f, "packaged"),
            PackageState::Described => write!(f, "described"),
        }
    }
}

/// Record of a finished package: its key, inputs, contents, and link metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMetadata {
    pub package_id: PackageId,
    pub short_id: ShortId,
    pub name: String,
    pub version: String,
    pub settings: Settings,
    pub options: ResolvedOptions,
    pub revision: Revision,
    pub state: PackageState,
    pub libs: Vec<String>,
    pub files: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum over the other fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl PackageMetadata {
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// `name/version` reference used in listings.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

pub struct MetadataStore {
    layout: StoreLayout,
}

impl MetadataStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn put(&self, meta: &PackageMetadata) -> Result<(), StoreError> {
        let dest = self.layout.metadata_dir().join(meta.package_id.as_str());

        let mut meta_with_checksum = meta.clone();
        meta_with_checksum.checksum = Some(meta_with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&meta_with_checksum)?;

        let dir = self.layout.metadata_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(())
    }

    pub fn get(&self, package_id: &str) -> Result<PackageMetadata, StoreError> {
        let path = self.layout.metadata_dir().join(package_id);
        if !path.exists() {
            return Err(StoreError::PackageNotFound(package_id.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let meta: PackageMetadata = serde_json::from_str(&content)?;

        if let Some(ref expected) = meta.checksum {
            let actual = meta.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    hash: package_id.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(meta)
    }

    pub fn exists(&self, package_id: &str) -> bool {
        self.layout.metadata_dir().join(package_id).exists()
    }

    pub fn remove(&self, package_id: &str) -> Result<(), StoreError> {
        let path = self.layout.metadata_dir().join(package_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<PackageMetadata>, StoreError> {
        let dir = self.layout.metadata_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("");
                if !name_str.starts_with('.') {
                    match self.get(name_str) {
                        Ok(meta) => results.push(meta),
                        Err(e) => {
                            tracing::warn!("skipping corrupted metadata entry '{name_str}': {e}");
                        }
                    }
                }
            }
        }
        results.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.version.cmp(&b.version))
                .then_with(|| a.package_id.cmp(&b.package_id))
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::{Arch, BuildType, Os};

    fn test_metadata_store() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, MetadataStore::new(layout))
    }

    fn sample_meta(id: &str) -> PackageMetadata {
        PackageMetadata {
            package_id: id.into(),
            short_id: id[..12.min(id.len())].into(),
            name: "MichaQtUtilisLib".to_owned(),
            version: "0.2".to_owned(),
            settings: Settings {
                os: Os::Linux,
                compiler: "gcc".to_owned(),
                build_type: BuildType::Release,
                arch: Arch::X86_64,
            },
            options: ResolvedOptions::default(),
            revision: "c0ffee".into(),
            state: PackageState::Described,
            libs: vec!["MichaQtUtilisLib".to_owned()],
            files: vec!["lib/libMichaQtUtilisLib.a".to_owned()],
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
            checksum: None,
        }
    }

    #[test]
    fn metadata_roundtrip_embeds_checksum() {
        let (_dir, store) = test_metadata_store();
        let meta = sample_meta("abc123def456");
        store.put(&meta).unwrap();
        let retrieved = store.get(&meta.package_id).unwrap();
        assert_eq!(retrieved.package_id, meta.package_id);
        assert_eq!(retrieved.libs, meta.libs);
        assert!(retrieved.checksum.is_some(), "put() must embed a checksum");
        assert_eq!(retrieved.reference(), "MichaQtUtilisLib/0.2");
    }

    #[test]
    fn tampered_metadata_detected() {
        let (dir, store) = test_metadata_store();
        store.put(&sample_meta("abc123def456")).unwrap();
        let path = dir.path().join("store/metadata/abc123def456");
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("MichaQtUtilisLib\"", "Other\"")).unwrap();
        assert!(matches!(
            store.get("abc123def456"),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn missing_package_reported() {
        let (_dir, store) = test_metadata_store();
        assert!(matches!(
            store.get("nope"),
            Err(StoreError::PackageNotFound(_))
        ));
        assert!(!store.exists("nope"));
    }

    #[test]
    fn list_and_remove() {
        let (_dir, store) = test_metadata_store();
        store.put(&sample_meta("bbbbbbbbbbbbbbbb")).unwrap();
        store.put(&sample_meta("aaaaaaaaaaaaaaaa")).unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].package_id, "aaaaaaaaaaaaaaaa");

        store.remove("aaaaaaaaaaaaaaaa").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        store.remove("aaaaaaaaaaaaaaaa").unwrap();
    }

    #[test]
    fn state_order_follows_lifecycle() {
        assert!(PackageState::Configured < PackageState::SourceAcquired);
        assert!(PackageState::Built < PackageState::Packaged);
        assert!(PackageState::Packaged < PackageState::Described);
        assert_eq!(PackageState::SourceAcquired.to_string(), "source-acquired");
    }
}
