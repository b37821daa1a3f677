use crate::normalize::NormalizedRecipe;
use crate::recipe::{RecipeError, SourceKind, AUTO_REVISION};
use crate::types::Revision;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Conventional file name of the source lock, stored next to the recipe.
pub const LOCK_FILENAME: &str = "kiln.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("recipe error: {0}")]
    Recipe(#[from] RecipeError),
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("lock file revision is not pinned: '{0}'")]
    UnpinnedRevision(String),
    #[error("lock file recipe drift: {0}")]
    RecipeDrift(String),
}

/// The source lock pins the exact snapshot a recipe builds from.
///
/// A recipe declaring `revision = "auto"` is exported into a lock whose
/// revision is a concrete commit (or local tree digest), so that rebuilds
/// from the lock are reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLock {
    pub lock_version: u32,
    pub name: String,
    pub version: String,
    pub kind: SourceKind,
    pub url: String,
    pub revision: Revision,
    #[serde(default)]
    pub subfolder: String,
}

impl SourceLock {
    /// Build a lock from a recipe and the revision its source resolved to.
    pub fn from_resolved(recipe: &NormalizedRecipe, revision: Revision) -> Self {
        SourceLock {
            lock_version: 1,
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            kind: recipe.source.kind,
            url: recipe.source.url.clone(),
            revision,
            subfolder: recipe.source.subfolder.clone(),
        }
    }

    pub fn verify(&self) -> Result<(), LockError> {
        if self.lock_version != 1 {
            return Err(LockError::UnsupportedVersion(self.lock_version));
        }
        if self.revision.is_empty() || self.revision == AUTO_REVISION {
            return Err(LockError::UnpinnedRevision(self.revision.to_string()));
        }
        Ok(())
    }

    /// Check that the recipe's declared source still matches this lock.
    pub fn verify_recipe_intent(&self, recipe: &NormalizedRecipe) -> Result<(), LockError> {
        if self.name != recipe.name || self.version != recipe.version {
            return Err(LockError::RecipeDrift(format!(
                "identity changed: lock has '{}/{}', recipe has '{}/{}'",
                self.name, self.version, recipe.name, recipe.version
            )));
        }
        if self.kind != recipe.source.kind || self.url != recipe.source.url {
            return Err(LockError::RecipeDrift(format!(
                "source changed: lock has {} '{}', recipe has {} '{}'",
                self.kind, self.url, recipe.source.kind, recipe.source.url
            )));
        }
        if self.subfolder != recipe.source.subfolder {
            return Err(LockError::RecipeDrift(format!(
                "source subfolder changed: lock has '{}', recipe has '{}'",
                self.subfolder, recipe.source.subfolder
            )));
        }
        if recipe.source.revision != AUTO_REVISION && recipe.source.revision != *self.revision {
            return Err(LockError::RecipeDrift(format!(
                "pinned revision changed: lock has '{}', recipe has '{}'. Run 'kiln export' to re-resolve.",
                self.revision, recipe.source.revision
            )));
        }
        Ok(())
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe_str;

    fn sample_recipe(revision: &str) -> NormalizedRecipe {
        parse_recipe_str(&format!(
            r#"
recipe_version = 1
[package]
name = "demo"
version = "1.0"
[source]
url = "https://example.com/demo.git"
revision = "{revision}"
[consumer]
libs = ["demo"]
"#
        ))
        .unwrap()
        .normalize()
        .unwrap()
    }

    fn commit() -> Revision {
        Revision::new("a".repeat(40))
    }

    #[test]
    fn lock_roundtrip() {
        let lock = SourceLock::from_resolved(&sample_recipe("auto"), commit());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILENAME);

        lock.write_to_file(&path).unwrap();
        let loaded = SourceLock::read_from_file(&path).unwrap();
        assert_eq!(lock, loaded);
    }

    #[test]
    fn auto_revision_is_never_a_valid_lock() {
        let lock = SourceLock::from_resolved(&sample_recipe("auto"), Revision::new("auto"));
        assert!(matches!(lock.verify(), Err(LockError::UnpinnedRevision(_))));
        let pinned = SourceLock::from_resolved(&sample_recipe("auto"), commit());
        assert!(pinned.verify().is_ok());
    }

    #[test]
    fn recipe_intent_verified() {
        let recipe = sample_recipe("auto");
        let lock = SourceLock::from_resolved(&recipe, commit());
        assert!(lock.verify_recipe_intent(&recipe).is_ok());
    }

    #[test]
    fn url_drift_detected() {
        let recipe = sample_recipe("auto");
        let lock = SourceLock::from_resolved(&recipe, commit());
        let mut drifted = recipe.clone();
        drifted.source.url = "https://example.com/fork.git".to_owned();
        assert!(matches!(
            lock.verify_recipe_intent(&drifted),
            Err(LockError::RecipeDrift(_))
        ));
    }

    #[test]
    fn version_drift_detected() {
        let recipe = sample_recipe("auto");
        let lock = SourceLock::from_resolved(&recipe, commit());
        let mut drifted = recipe.clone();
        drifted.version = "2.0".to_owned();
        assert!(lock.verify_recipe_intent(&drifted).is_err());
    }

    #[test]
    fn explicit_revision_must_match_lock() {
        let recipe = sample_recipe(&"b".repeat(40));
        let lock = SourceLock::from_resolved(&recipe, commit());
        assert!(lock.verify_recipe_intent(&recipe).is_err());
        let matching = SourceLock::from_resolved(&recipe, Revision::new("b".repeat(40)));
        assert!(matching.verify_recipe_intent(&recipe).is_ok());
    }
}
