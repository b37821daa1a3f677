pub mod completions;
pub mod create;
pub mod export;
pub mod info;
pub mod inspect;
pub mod list;
pub mod man_pages;
pub mod new;
pub mod options;
pub mod remove;
pub mod verify;

use indicatif::{ProgressBar, ProgressStyle};
use kiln_core::load_recipe;
use kiln_schema::{
    get_builtin, list_builtins, parse_recipe_str, NormalizedRecipe, OptionOverrides, Profile,
    Settings,
};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_RECIPE_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "described" => Style::new().green().apply_to(state).to_string(),
        "packaged" => Style::new().cyan().apply_to(state).to_string(),
        "built" | "source-acquired" => Style::new().yellow().apply_to(state).to_string(),
        "configured" => Style::new().dim().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

pub fn warning(msg: &str) -> String {
    console::Style::new()
        .yellow()
        .apply_to(format!("warning: {msg}"))
        .to_string()
}

/// Settings and option overrides for one invocation.
///
/// Layered as host defaults, then the profile, then `-s`/`-o` flags.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub settings: Settings,
    pub overrides: OptionOverrides,
}

pub fn build_context(
    profile: Option<&Path>,
    settings: &[String],
    options: &[String],
) -> Result<BuildContext, String> {
    let profile = match profile {
        Some(path) => Profile::load(path),
        None => Profile::load_default(),
    }
    .map_err(|e| format!("profile error: {e}"))?;

    let mut resolved = profile
        .resolve_settings(Settings::detect_host())
        .map_err(|e| format!("profile error: {e}"))?;
    for assignment in settings {
        resolved
            .apply_assignment(assignment)
            .map_err(|e| format!("settings error: {e}"))?;
    }

    let mut overrides = profile.options.clone();
    for assignment in options {
        overrides
            .apply_assignment(assignment)
            .map_err(|e| format!("recipe error: {e}"))?;
    }

    Ok(BuildContext {
        settings: resolved,
        overrides,
    })
}

fn builtin_names() -> String {
    list_builtins()
        .iter()
        .map(|b| b.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a recipe from `--builtin <name>` if given, otherwise from `path`.
pub fn load_recipe_arg(path: &Path, builtin: Option<&str>) -> Result<NormalizedRecipe, String> {
    if let Some(name) = builtin {
        let b = get_builtin(name).ok_or_else(|| {
            format!(
                "recipe error: unknown built-in recipe '{name}' (available: {})",
                builtin_names()
            )
        })?;
        return parse_recipe_str(b.recipe)
            .and_then(|r| r.normalize())
            .map_err(|e| format!("recipe error: {e}"));
    }
    load_recipe(path).map_err(|e| e.to_string())
}
