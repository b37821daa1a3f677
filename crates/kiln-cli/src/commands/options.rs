use super::{json_pretty, load_recipe_arg, BuildContext, EXIT_SUCCESS};
use kiln_core::Engine;
use std::path::Path;

pub fn run(recipe: &Path, builtin: Option<&str>, ctx: &BuildContext, json: bool) -> Result<u8, String> {
    let normalized = load_recipe_arg(recipe, builtin)?;
    let plan = Engine::plan(&normalized, &ctx.settings, &ctx.overrides).map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&plan)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("{}/{}", normalized.name, normalized.version);
    println!("package_id: {}", plan.identity.package_id);
    println!();
    println!("settings:");
    for (key, value) in plan.settings.entries() {
        println!("  {key:<12} {value}");
    }
    println!("options:");
    if plan.options.is_empty() {
        println!("  (none)");
    }
    for (name, value) in plan.options.iter() {
        println!("  {name:<12} {value}");
    }
    let dropped: Vec<&str> = normalized
        .options
        .iter()
        .filter(|o| !plan.options.contains(&o.name))
        .map(|o| o.name.as_str())
        .collect();
    if !dropped.is_empty() {
        println!("  not applicable on {}: {}", plan.settings.os, dropped.join(", "));
    }
    println!("build steps:");
    for step in &plan.steps {
        println!("  {step}");
    }
    println!("libs: {}", plan.consumer.libs.join(", "));
    Ok(EXIT_SUCCESS)
}
