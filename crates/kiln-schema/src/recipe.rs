use crate::settings::Os;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Conventional file name of a recipe inside a project directory.
pub const RECIPE_FILENAME: &str = "kiln.toml";

/// Revision placeholder resolved to a pinned revision at export or build time.
pub const AUTO_REVISION: &str = "auto";

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to read recipe file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse recipe: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported recipe_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("package.name must not be empty")]
    EmptyName,
    #[error("package.version must not be empty")]
    EmptyVersion,
    #[error("source.url must not be empty")]
    EmptySourceUrl,
    #[error("unknown setting '{0}' in settings.declared")]
    UndeclaredSetting(String),
    #[error("unknown build generator '{0}' (expected one of: none, qmake, cmake, txt)")]
    UnknownGenerator(String),
    #[error("build step {0} has an empty program")]
    EmptyBuildStep(usize),
    #[error("invalid artifact pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid artifact path '{0}': must be relative and stay inside its root")]
    InvalidArtifactPath(String),
    #[error("option '{0}' declares both only_os and exclude_os")]
    ConflictingApplicability(String),
    #[error("option name must not be empty")]
    EmptyOptionName,
    #[error("option '{0}' is declared more than once")]
    DuplicateOption(String),
    #[error("consumer.libs must name at least one library")]
    NoConsumerLibs,
    #[error("consumer variant refers to undeclared option '{0}'")]
    UnknownVariantOption(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("invalid value '{value}' for option '{option}', expected true or false")]
    InvalidOptionValue { option: String, value: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RecipeV1 {
    pub recipe_version: u32,
    pub package: PackageSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub options: BTreeMap<String, OptionDecl>,
    pub source: SourceSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRule>,
    pub consumer: ConsumerSection,
}

/// Identity plus purely informational metadata.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SettingsSection {
    #[serde(default = "default_declared_settings")]
    pub declared: Vec<String>,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            declared: default_declared_settings(),
        }
    }
}

/// A boolean build option with its default and platform applicability.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OptionDecl {
    pub default: bool,
    /// The option does not exist on these operating systems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_os: Vec<Os>,
    /// When non-empty, the option exists only on these operating systems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only_os: Vec<Os>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Git,
    Local,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Git => write!(f, "git"),
            SourceKind::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default)]
    pub kind: SourceKind,
    pub url: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default)]
    pub subfolder: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default)]
    pub steps: Vec<BuildStep>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildStep {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Restrict the step to these operating systems. Empty means every OS.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<Os>,
}

/// Copy files matching `pattern` under `src` into `dst` of the package folder.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArtifactRule {
    pub pattern: String,
    #[serde(default)]
    pub src: String,
    pub dst: String,
    #[serde(default = "default_keep_path")]
    pub keep_path: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConsumerSection {
    pub libs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ConsumerVariant>,
}

/// Replacement link-library list used when `option` resolves to `value`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConsumerVariant {
    pub option: String,
    pub value: bool,
    pub libs: Vec<String>,
}

fn default_declared_settings() -> Vec<String> {
    ["os", "compiler", "build_type", "arch"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_revision() -> String {
    AUTO_REVISION.to_owned()
}

fn default_generator() -> String {
    "none".to_owned()
}

fn default_keep_path() -> bool {
    true
}

pub fn parse_recipe_str(input: &str) -> Result<RecipeV1, RecipeError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_recipe_file(path: impl AsRef<Path>) -> Result<RecipeV1, RecipeError> {
    let content = fs::read_to_string(path)?;
    parse_recipe_str(&content)
}
