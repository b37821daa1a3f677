use crate::options::OptionOverrides;
use crate::settings::{Settings, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid profile setting: {0}")]
    Settings(#[from] SettingsError),
    #[error("profile configuration error: {0}")]
    Config(String),
}

/// Partially specified settings; unset keys fall back to the host defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProfileSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// A named build configuration: settings plus option values.
///
/// Stored as TOML, by default at `~/.config/kiln/profiles/default.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub settings: ProfileSettings,
    #[serde(default)]
    pub options: OptionOverrides,
}

impl Profile {
    /// Load `~/.config/kiln/profiles/default.toml`, or an empty profile if absent.
    pub fn load_default() -> Result<Self, ProfileError> {
        let path = default_profile_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProfileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Settings for this profile, layered on top of `base`.
    pub fn resolve_settings(&self, base: Settings) -> Result<Settings, ProfileError> {
        let mut settings = base;
        let entries = [
            ("os", &self.settings.os),
            ("compiler", &self.settings.compiler),
            ("build_type", &self.settings.build_type),
            ("arch", &self.settings.arch),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                settings.set(key, value)?;
            }
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn default_profile_path() -> Result<PathBuf, ProfileError> {
    let home = std::env::var("HOME").map_err(|_| ProfileError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/kiln/profiles/default.toml"))
}
