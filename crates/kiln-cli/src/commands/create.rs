use super::{json_pretty, spin_fail, spin_ok, spinner, warning, BuildContext, EXIT_SUCCESS};
use kiln_core::{load_recipe, CreateOptions, Engine, StoreLock};
use kiln_runtime::{check_tool_prereqs, format_missing, select_runner};
use kiln_schema::{NormalizedRecipe, Os, SourceKind};
use kiln_store::StoreLayout;
use std::path::Path;

/// Programs the system runner will need for this recipe on `os`.
fn required_programs(recipe: &NormalizedRecipe, os: Os) -> Vec<&str> {
    let mut programs: Vec<&str> = recipe
        .steps
        .iter()
        .filter(|s| s.runs_on(os))
        .map(|s| s.program.as_str())
        .collect();
    if recipe.source.kind == SourceKind::Git {
        programs.push("git");
    }
    programs.sort_unstable();
    programs.dedup();
    programs
}

pub struct CreateFlags<'a> {
    pub runner: &'a str,
    pub locked: bool,
    pub strict: bool,
    pub keep_build: bool,
}

pub fn run(
    engine: &Engine,
    store_path: &Path,
    recipe: &Path,
    ctx: &BuildContext,
    flags: &CreateFlags<'_>,
    json: bool,
) -> Result<u8, String> {
    let runner = select_runner(flags.runner).map_err(|e| e.to_string())?;

    if runner.name() == "system" && std::env::var("KILN_SKIP_PREREQS").as_deref() != Ok("1") {
        let normalized = load_recipe(recipe).map_err(|e| e.to_string())?;
        let missing = check_tool_prereqs(&required_programs(&normalized, ctx.settings.os));
        if !missing.is_empty() {
            return Err(format_missing(&missing));
        }
    }

    let layout = StoreLayout::new(store_path);
    let _lock = StoreLock::acquire(&layout.lock_file()).map_err(|e| format!("store lock: {e}"))?;

    let pb = if json {
        None
    } else {
        Some(spinner("creating package..."))
    };
    let options = CreateOptions {
        overrides: ctx.overrides.clone(),
        locked: flags.locked,
        strict_artifacts: flags.strict,
        keep_intermediates: flags.keep_build,
    };

    let result = match engine.create(recipe, &ctx.settings, runner.as_ref(), &options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "package created");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "create failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "package_id": result.identity.package_id,
            "short_id": result.identity.short_id,
            "reference": result.metadata.reference(),
            "revision": result.metadata.revision,
            "settings": result.metadata.settings,
            "options": result.metadata.options,
            "files": result.metadata.files,
            "libs": result.consumer.libs,
            "empty_rules": result.report.empty_rules,
            "unmatched_libs": result.unmatched_libs,
            "package_dir": result.package_dir,
            "status": "created",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for pattern in &result.report.empty_rules {
            eprintln!("{}", warning(&format!("artifact rule '{pattern}' matched no files")));
        }
        for lib in &result.unmatched_libs {
            eprintln!(
                "{}",
                warning(&format!("consumer lib '{lib}' has no link artifact in the package"))
            );
        }
        println!(
            "created {} ({})",
            result.metadata.reference(),
            result.identity.short_id
        );
        println!("package_id: {}", result.identity.package_id);
        println!("revision:   {}", result.metadata.revision);
        println!("files:      {}", result.metadata.files.len());
        println!("libs:       {}", result.consumer.libs.join(", "));
        println!("folder:     {}", result.package_dir.display());
    }
    Ok(EXIT_SUCCESS)
}
