use crate::CoreError;
use glob::{MatchOptions, Pattern};
use kiln_schema::{NormalizedArtifactRule, RecipeError};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// `*` crosses directory separators, matching `fnmatch` on relative paths.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Files one artifact rule copied, as paths relative to the package folder.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuleOutcome {
    pub pattern: String,
    pub src: String,
    pub dst: String,
    pub copied: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PackageReport {
    pub rules: Vec<RuleOutcome>,
    /// Every file in the package folder, sorted and deduplicated.
    pub files: Vec<String>,
    pub empty_rules: Vec<String>,
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn join_rel(base: &Path, rel: &str) -> std::path::PathBuf {
    if rel.is_empty() || rel == "." {
        base.to_path_buf()
    } else {
        base.join(rel)
    }
}

/// Regular files, and symlinks resolving to one (`libX.so -> libX.so.1.0.0`).
/// Symlinked files are packaged as copies of their target.
fn is_packageable(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

fn apply_rule(
    rule: &NormalizedArtifactRule,
    build_root: &Path,
    package_dir: &Path,
) -> Result<RuleOutcome, CoreError> {
    let pattern = Pattern::new(&rule.pattern).map_err(|e| RecipeError::InvalidPattern {
        pattern: rule.pattern.clone(),
        reason: e.msg.to_owned(),
    })?;
    let root = join_rel(build_root, &rule.src);
    let dst_root = join_rel(package_dir, &rule.dst);
    let mut copied = Vec::new();

    if root.is_dir() {
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if !is_packageable(&entry) {
                continue;
            }
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let rel_str = slash_path(rel);
            if !pattern.matches_with(&rel_str, MATCH_OPTIONS) {
                continue;
            }

            let target = if rule.keep_path {
                dst_root.join(rel)
            } else {
                dst_root.join(entry.file_name())
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;

            let packaged = slash_path(target.strip_prefix(package_dir).unwrap_or(&target));
            debug!("packaged {rel_str} -> {packaged}");
            copied.push(packaged);
        }
    } else {
        debug!("artifact source folder {} does not exist", root.display());
    }

    Ok(RuleOutcome {
        pattern: rule.pattern.clone(),
        src: rule.src.clone(),
        dst: rule.dst.clone(),
        copied,
    })
}

/// Copy build outputs into `package_dir` according to `rules`, in order.
///
/// The package folder is emptied first, so repeated runs over the same build
/// folder produce identical contents. A file matched by several rules is
/// copied once per rule; later copies overwrite earlier ones. A rule that
/// matches nothing is a warning, or `CoreError::EmptyArtifactRule` when
/// `strict` is set.
pub fn package_artifacts(
    rules: &[NormalizedArtifactRule],
    build_root: &Path,
    package_dir: &Path,
    strict: bool,
) -> Result<PackageReport, CoreError> {
    if package_dir.exists() {
        fs::remove_dir_all(package_dir)?;
    }
    fs::create_dir_all(package_dir)?;

    let mut report = PackageReport::default();
    for rule in rules {
        let outcome = apply_rule(rule, build_root, package_dir)?;
        if outcome.copied.is_empty() {
            if strict {
                return Err(CoreError::EmptyArtifactRule {
                    pattern: rule.pattern.clone(),
                    src: rule.src.clone(),
                });
            }
            warn!(
                "artifact rule '{}' (src '{}') matched no files",
                rule.pattern, rule.src
            );
            report.empty_rules.push(rule.pattern.clone());
        }
        report.files.extend(outcome.copied.iter().cloned());
        report.rules.push(outcome);
    }
    report.files.sort();
    report.files.dedup();
    Ok(report)
}

fn provides_lib(file_name: &str, lib: &str) -> bool {
    file_name == format!("lib{lib}.a")
        || file_name == format!("{lib}.lib")
        || file_name == format!("lib{lib}.dylib")
        || file_name == format!("lib{lib}.so")
        || file_name.starts_with(&format!("lib{lib}.so."))
}

/// Check that every consumer lib has a link artifact among `files`.
///
/// Returns the libs without one. Under `strict` the first such lib is an error.
pub fn check_consumer_libs(
    libs: &[String],
    files: &[String],
    strict: bool,
) -> Result<Vec<String>, CoreError> {
    let mut missing = Vec::new();
    for lib in libs {
        let found = files.iter().any(|f| {
            let name = f.rsplit('/').next().unwrap_or(f);
            provides_lib(name, lib)
        });
        if found {
            continue;
        }
        if strict {
            return Err(CoreError::ConsumerMismatch { lib: lib.clone() });
        }
        warn!("consumer lib '{lib}' has no matching link artifact in the package");
        missing.push(lib.clone());
    }
    Ok(missing)
}
