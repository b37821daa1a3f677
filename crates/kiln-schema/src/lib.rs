//! Recipe parsing, normalization, settings, and package identity for Kiln.
//!
//! This crate defines the declarative half of a package recipe: TOML recipe
//! parsing (`RecipeV1`), the validated form (`NormalizedRecipe`), build
//! settings and profiles, option resolution against settings
//! (`configure_options`), consumer metadata, deterministic package identity
//! (`compute_package_id`), the source lock file, and built-in recipes.

pub mod builtin;
pub mod consumer;
pub mod identity;
pub mod lock;
pub mod normalize;
pub mod options;
pub mod profile;
pub mod recipe;
pub mod settings;
pub mod types;

pub use builtin::{get_builtin, list_builtins, BuiltinRecipe, BUILTIN_RECIPES};
pub use consumer::ConsumerMetadata;
pub use identity::{compute_package_id, PackageIdentity};
pub use lock::{LockError, SourceLock, LOCK_FILENAME};
pub use normalize::{
    NormalizedArtifactRule, NormalizedBuildStep, NormalizedConsumerVariant, NormalizedOption,
    NormalizedRecipe, NormalizedSource,
};
pub use options::{configure_options, Applicability, OptionOverrides, ResolvedOptions};
pub use profile::{Profile, ProfileError, ProfileSettings};
pub use recipe::{
    parse_recipe_file, parse_recipe_str, ArtifactRule, BuildSection, BuildStep, ConsumerSection,
    ConsumerVariant, OptionDecl, PackageSection, RecipeError, RecipeV1, SettingsSection,
    SourceKind, SourceSection, AUTO_REVISION, RECIPE_FILENAME,
};
pub use settings::{Arch, BuildType, Os, Settings, SettingsError, KNOWN_COMPILERS};
pub use types::{PackageId, Revision, ShortId};
