use crate::normalize::NormalizedOption;
use crate::recipe::RecipeError;
use crate::settings::{Os, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Declarative predicate deciding whether an option exists for given settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "os", rename_all = "snake_case")]
pub enum Applicability {
    Always,
    ExcludeOs(Vec<Os>),
    OnlyOs(Vec<Os>),
}

impl Applicability {
    pub fn applies_to(&self, settings: &Settings) -> bool {
        match self {
            Applicability::Always => true,
            Applicability::ExcludeOs(excluded) => !excluded.contains(&settings.os),
            Applicability::OnlyOs(allowed) => allowed.contains(&settings.os),
        }
    }
}

/// Option values requested by the caller (profile or command line).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct OptionOverrides(BTreeMap<String, bool>);

impl OptionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        self.0.insert(name.into(), value);
    }

    /// Apply a `name=value` assignment as given on the command line.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), RecipeError> {
        let Some((name, raw)) = assignment.split_once('=') else {
            return Err(RecipeError::InvalidOptionValue {
                option: assignment.to_owned(),
                value: String::new(),
            });
        };
        let value = parse_bool(raw).ok_or_else(|| RecipeError::InvalidOptionValue {
            option: name.trim().to_owned(),
            value: raw.to_owned(),
        })?;
        self.set(name.trim(), value);
        Ok(())
    }

    /// Merge `other` on top of `self`; values in `other` win.
    pub fn merge(&mut self, other: &OptionOverrides) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The options schema after configuration: only applicable options, each with a value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ResolvedOptions(BTreeMap<String, bool>);

impl ResolvedOptions {
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve the options schema for `settings`.
///
/// Options whose applicability predicate fails are removed entirely. An
/// override naming a removed option is ignored; an override naming an option
/// the recipe never declared is an error.
pub fn configure_options(
    declared: &[NormalizedOption],
    settings: &Settings,
    overrides: &OptionOverrides,
) -> Result<ResolvedOptions, RecipeError> {
    for (name, _) in overrides.iter() {
        if !declared.iter().any(|o| o.name == name) {
            return Err(RecipeError::UnknownOption(name.to_owned()));
        }
    }

    let mut resolved = BTreeMap::new();
    for option in declared {
        if !option.applicability.applies_to(settings) {
            if overrides.0.contains_key(&option.name) {
                debug!(
                    "ignoring value for option '{}': not applicable on {}",
                    option.name, settings.os
                );
            }
            continue;
        }
        let value = overrides
            .0
            .get(&option.name)
            .copied()
            .unwrap_or(option.default);
        resolved.insert(option.name.clone(), value);
    }

    Ok(ResolvedOptions(resolved))
}
