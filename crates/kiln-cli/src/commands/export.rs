use super::{json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;
use kiln_runtime::select_runner;
use std::path::Path;

pub fn run(engine: &Engine, recipe: &Path, runner: &str, json: bool) -> Result<u8, String> {
    let runner = select_runner(runner).map_err(|e| e.to_string())?;
    let result = engine
        .export(recipe, runner.as_ref())
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "lock": result.lock,
            "path": result.path,
            "status": "exported",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "exported {}/{} at {} {}",
            result.lock.name, result.lock.version, result.lock.kind, result.lock.revision
        );
        println!("wrote {}", result.path.display());
    }
    Ok(EXIT_SUCCESS)
}
