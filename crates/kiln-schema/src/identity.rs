use crate::normalize::NormalizedRecipe;
use crate::options::ResolvedOptions;
use crate::settings::Settings;
use crate::types::{PackageId, ShortId};
use serde::Serialize;

/// Deterministic identity of one binary package.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PackageIdentity {
    pub package_id: PackageId,
    pub short_id: ShortId,
}

/// Each field is NUL-terminated so adjacent fields cannot run together.
fn field(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update(&[0]);
}

/// Compute the binary package identity.
///
/// Only the recipe name and version, the settings the recipe declares, and
/// the resolved options feed the hash. Informational metadata (license,
/// description) and undeclared settings do not change the identity.
pub fn compute_package_id(
    recipe: &NormalizedRecipe,
    settings: &Settings,
    options: &ResolvedOptions,
) -> PackageIdentity {
    let mut hasher = blake3::Hasher::new();

    field(&mut hasher, &format!("name:{}", recipe.name));
    field(&mut hasher, &format!("version:{}", recipe.version));

    for (key, value) in settings.entries() {
        if recipe.declares_setting(key) {
            field(&mut hasher, &format!("setting:{key}={value}"));
        }
    }

    for (name, value) in options.iter() {
        field(&mut hasher, &format!("option:{name}={value}"));
    }

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    PackageIdentity {
        package_id: PackageId::new(hex),
        short_id: ShortId::new(short),
    }
}
