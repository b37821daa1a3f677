use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let packages = engine.list().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&packages)?);
    } else if packages.is_empty() {
        println!("no packages found");
    } else {
        println!(
            "{:<14} {:<28} {:<10} {:<10} {:<12} STATE",
            "SHORT_ID", "REFERENCE", "OS", "ARCH", "BUILD_TYPE"
        );
        for p in &packages {
            println!(
                "{:<14} {:<28} {:<10} {:<10} {:<12} {}",
                p.short_id.as_str(),
                p.reference(),
                p.settings.os.as_str(),
                p.settings.arch.as_str(),
                p.settings.build_type.as_str(),
                colorize_state(&p.state.to_string())
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
