use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use kiln_core::Engine;

/// Verify one package, or every package when `package` is `None`.
pub fn run(engine: &Engine, package: Option<&str>, json: bool) -> Result<u8, String> {
    let ids: Vec<String> = match package {
        Some(p) => vec![engine.resolve_package_id(p).map_err(|e| e.to_string())?],
        None => engine
            .list()
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|m| m.package_id.to_string())
            .collect(),
    };

    let mut results = Vec::new();
    let mut all_clean = true;
    for id in &ids {
        let meta = engine.inspect(id).map_err(|e| e.to_string())?;
        let report = engine.verify(id).map_err(|e| e.to_string())?;
        all_clean &= report.is_clean();
        results.push((meta, report));
    }

    if json {
        let payload: Vec<_> = results
            .iter()
            .map(|(meta, report)| {
                serde_json::json!({
                    "package_id": meta.package_id,
                    "reference": meta.reference(),
                    "clean": report.is_clean(),
                    "report": report,
                })
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else if results.is_empty() {
        println!("no packages to verify");
    } else {
        for (meta, report) in &results {
            if report.is_clean() {
                println!(
                    "ok    {} ({}): {} files",
                    meta.reference(),
                    meta.short_id,
                    report.passed
                );
                continue;
            }
            println!("FAIL  {} ({})", meta.reference(), meta.short_id);
            for f in &report.missing {
                println!("  missing:    {f}");
            }
            for f in &report.modified {
                println!("  modified:   {f}");
            }
            for f in &report.unexpected {
                println!("  unexpected: {f}");
            }
        }
    }

    Ok(if all_clean { EXIT_SUCCESS } else { EXIT_FAILURE })
}
