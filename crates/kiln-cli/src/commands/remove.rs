use super::{json_pretty, EXIT_SUCCESS};
use kiln_core::{Engine, StoreLock};
use kiln_store::StoreLayout;
use std::path::Path;

pub fn run(engine: &Engine, store_path: &Path, package: &str, json: bool) -> Result<u8, String> {
    let layout = StoreLayout::new(store_path);
    let _lock = StoreLock::acquire(&layout.lock_file()).map_err(|e| format!("store lock: {e}"))?;

    let meta = engine.remove(package).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({
            "package_id": meta.package_id,
            "reference": meta.reference(),
            "status": "removed",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("removed {} ({})", meta.reference(), meta.short_id);
    }
    Ok(EXIT_SUCCESS)
}
