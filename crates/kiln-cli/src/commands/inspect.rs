use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;

pub fn run(engine: &Engine, package: &str, json: bool) -> Result<u8, String> {
    let meta = engine.inspect(package).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&meta)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("package_id:  {}", meta.package_id);
    println!("short_id:    {}", meta.short_id);
    println!("reference:   {}", meta.reference());
    println!("state:       {}", colorize_state(&meta.state.to_string()));
    println!("revision:    {}", meta.revision);
    let settings: Vec<String> = meta
        .settings
        .entries()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    println!("settings:    {}", settings.join(" "));
    let options: Vec<String> = meta
        .options
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    println!("options:     {}", options.join(" "));
    println!("libs:        {}", meta.libs.join(", "));
    println!("created_at:  {}", meta.created_at);
    println!("updated_at:  {}", meta.updated_at);
    println!("files:");
    for f in &meta.files {
        println!("  {f}");
    }
    Ok(EXIT_SUCCESS)
}
