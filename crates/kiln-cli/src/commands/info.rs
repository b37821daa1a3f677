use super::{json_pretty, load_recipe_arg, EXIT_SUCCESS};
use std::path::Path;

pub fn run(recipe: &Path, builtin: Option<&str>, json: bool) -> Result<u8, String> {
    let r = load_recipe_arg(recipe, builtin)?;
    if json {
        println!("{}", json_pretty(&r)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("name:        {}", r.name);
    println!("version:     {}", r.version);
    for (label, value) in [
        ("license", &r.license),
        ("author", &r.author),
        ("url", &r.url),
        ("description", &r.description),
    ] {
        if let Some(v) = value {
            println!("{:<12} {v}", format!("{label}:"));
        }
    }
    println!("settings:    {}", r.declared_settings.join(", "));
    println!(
        "source:      {} {} (revision {})",
        r.source.kind, r.source.url, r.source.revision
    );
    println!("generator:   {}", r.generator);
    println!("options:");
    for o in &r.options {
        println!("  {:<10} default {:<5} {:?}", o.name, o.default, o.applicability);
    }
    println!("build steps:");
    for s in &r.steps {
        if s.os.is_empty() {
            println!("  {}", s.command_line());
        } else {
            let os: Vec<&str> = s.os.iter().map(|o| o.as_str()).collect();
            println!("  {} [{}]", s.command_line(), os.join(", "));
        }
    }
    println!("artifacts:");
    for a in &r.artifacts {
        let src = if a.src.is_empty() { "." } else { &a.src };
        let mode = if a.keep_path { "keep path" } else { "flatten" };
        println!("  {:<10} {src} -> {} ({mode})", a.pattern, a.dst);
    }
    println!("libs:        {}", r.consumer_libs.join(", "));
    Ok(EXIT_SUCCESS)
}
