use crate::options::Applicability;
use crate::recipe::{RecipeError, RecipeV1, SourceKind};
use crate::settings::Os;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

const KNOWN_SETTINGS: &[&str] = &["os", "compiler", "build_type", "arch"];
const KNOWN_GENERATORS: &[&str] = &["none", "qmake", "cmake", "txt"];

/// Validated, canonical representation of a parsed recipe.
///
/// Identity strings are trimmed, options are sorted by name, artifact patterns
/// and paths are checked, and consumer libs keep their declared (link) order.
/// This is the input to option configuration, identity hashing, and the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedRecipe {
    pub recipe_version: u32,
    pub name: String,
    pub version: String,
    pub license: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub declared_settings: Vec<String>,
    pub options: Vec<NormalizedOption>,
    pub source: NormalizedSource,
    pub generator: String,
    pub steps: Vec<NormalizedBuildStep>,
    pub artifacts: Vec<NormalizedArtifactRule>,
    pub consumer_libs: Vec<String>,
    pub consumer_variants: Vec<NormalizedConsumerVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedOption {
    pub name: String,
    pub default: bool,
    pub applicability: Applicability,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedSource {
    pub kind: SourceKind,
    pub url: String,
    pub revision: String,
    pub subfolder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedBuildStep {
    pub program: String,
    pub args: Vec<String>,
    pub os: Vec<Os>,
}

impl NormalizedBuildStep {
    pub fn runs_on(&self, os: Os) -> bool {
        self.os.is_empty() || self.os.contains(&os)
    }

    /// The step as a single display string, e.g. `qmake demo.pro CONFIG+=release`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedArtifactRule {
    pub pattern: String,
    pub src: String,
    pub dst: String,
    pub keep_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedConsumerVariant {
    pub option: String,
    pub value: bool,
    pub libs: Vec<String>,
}

impl RecipeV1 {
    /// Normalize the recipe: validate fields, resolve defaults, order options.
    pub fn normalize(&self) -> Result<NormalizedRecipe, RecipeError> {
        if self.recipe_version != 1 {
            return Err(RecipeError::UnsupportedVersion(self.recipe_version));
        }

        let name = self.package.name.trim().to_owned();
        if name.is_empty() {
            return Err(RecipeError::EmptyName);
        }
        let version = self.package.version.trim().to_owned();
        if version.is_empty() {
            return Err(RecipeError::EmptyVersion);
        }

        let mut declared_settings = Vec::with_capacity(self.settings.declared.len());
        for setting in &self.settings.declared {
            let setting = setting.trim();
            if !KNOWN_SETTINGS.contains(&setting) {
                return Err(RecipeError::UndeclaredSetting(setting.to_owned()));
            }
            declared_settings.push(setting.to_owned());
        }
        declared_settings.sort();
        declared_settings.dedup();

        let mut options = Vec::with_capacity(self.options.len());
        for (option_name, decl) in &self.options {
            let option_name = option_name.trim();
            if option_name.is_empty() {
                return Err(RecipeError::EmptyOptionName);
            }
            let applicability = match (decl.exclude_os.is_empty(), decl.only_os.is_empty()) {
                (true, true) => Applicability::Always,
                (false, true) => Applicability::ExcludeOs(sorted_os(&decl.exclude_os)),
                (true, false) => Applicability::OnlyOs(sorted_os(&decl.only_os)),
                (false, false) => {
                    return Err(RecipeError::ConflictingApplicability(
                        option_name.to_owned(),
                    ))
                }
            };
            options.push(NormalizedOption {
                name: option_name.to_owned(),
                default: decl.default,
                applicability,
            });
        }
        options.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = options.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(RecipeError::DuplicateOption(pair[0].name.clone()));
        }

        let url = self.source.url.trim().to_owned();
        if url.is_empty() {
            return Err(RecipeError::EmptySourceUrl);
        }
        let subfolder = self.source.subfolder.trim().to_owned();
        validate_relative(&subfolder)?;
        let revision = self.source.revision.trim().to_owned();
        let source = NormalizedSource {
            kind: self.source.kind,
            url,
            revision: if revision.is_empty() {
                crate::recipe::AUTO_REVISION.to_owned()
            } else {
                revision
            },
            subfolder,
        };

        let generator = self.build.generator.trim().to_lowercase();
        if !KNOWN_GENERATORS.contains(&generator.as_str()) {
            return Err(RecipeError::UnknownGenerator(generator));
        }

        let mut steps = Vec::with_capacity(self.build.steps.len());
        for (idx, step) in self.build.steps.iter().enumerate() {
            let program = step.program.trim().to_owned();
            if program.is_empty() {
                return Err(RecipeError::EmptyBuildStep(idx));
            }
            steps.push(NormalizedBuildStep {
                program,
                args: step.args.clone(),
                os: sorted_os(&step.os),
            });
        }

        let mut artifacts = Vec::with_capacity(self.artifacts.len());
        for rule in &self.artifacts {
            let pattern = rule.pattern.trim().to_owned();
            glob::Pattern::new(&pattern).map_err(|e| RecipeError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.msg.to_owned(),
            })?;
            if pattern.is_empty() {
                return Err(RecipeError::InvalidPattern {
                    pattern,
                    reason: "pattern is empty".to_owned(),
                });
            }
            let src = rule.src.trim().to_owned();
            let dst = rule.dst.trim().to_owned();
            validate_relative(&src)?;
            validate_relative(&dst)?;
            artifacts.push(NormalizedArtifactRule {
                pattern,
                src,
                dst,
                keep_path: rule.keep_path,
            });
        }

        let consumer_libs = normalize_lib_list(&self.consumer.libs);
        if consumer_libs.is_empty() {
            return Err(RecipeError::NoConsumerLibs);
        }

        let mut consumer_variants = Vec::with_capacity(self.consumer.variants.len());
        for variant in &self.consumer.variants {
            let option = variant.option.trim().to_owned();
            if !options.iter().any(|o| o.name == option) {
                return Err(RecipeError::UnknownVariantOption(option));
            }
            let libs = normalize_lib_list(&variant.libs);
            if libs.is_empty() {
                return Err(RecipeError::NoConsumerLibs);
            }
            consumer_variants.push(NormalizedConsumerVariant {
                option,
                value: variant.value,
                libs,
            });
        }

        Ok(NormalizedRecipe {
            recipe_version: self.recipe_version,
            name,
            version,
            license: trimmed_opt(self.package.license.as_deref()),
            author: trimmed_opt(self.package.author.as_deref()),
            url: trimmed_opt(self.package.url.as_deref()),
            description: trimmed_opt(self.package.description.as_deref()),
            declared_settings,
            options,
            source,
            generator,
            steps,
            artifacts,
            consumer_libs,
            consumer_variants,
        })
    }
}

impl NormalizedRecipe {
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn declares_setting(&self, setting: &str) -> bool {
        self.declared_settings.iter().any(|s| s == setting)
    }
}

fn validate_relative(path: &str) -> Result<(), RecipeError> {
    let ok = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(RecipeError::InvalidArtifactPath(path.to_owned()))
    }
}

fn sorted_os(values: &[Os]) -> Vec<Os> {
    let mut out = values.to_vec();
    out.sort();
    out.dedup();
    out
}

// Link order matters, so libs are deduplicated without sorting.
fn normalize_lib_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_owned());
        }
    }
    out
}

fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
