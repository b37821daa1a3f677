use crate::normalize::NormalizedRecipe;
use crate::options::ResolvedOptions;
use serde::{Deserialize, Serialize};

/// What downstream recipes need to link against a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumerMetadata {
    pub libs: Vec<String>,
}

impl NormalizedRecipe {
    /// Link libraries for the given resolved options.
    ///
    /// The first variant whose option resolves to its `value` replaces the
    /// default list. Options removed during configuration never match.
    pub fn consumer_metadata(&self, options: &ResolvedOptions) -> ConsumerMetadata {
        let libs = self
            .consumer_variants
            .iter()
            .find(|v| options.get(&v.option) == Some(v.value))
            .map_or(&self.consumer_libs, |v| &v.libs);
        ConsumerMetadata { libs: libs.clone() }
    }
}
