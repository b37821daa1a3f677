use super::{json_pretty, EXIT_SUCCESS};
use dialoguer::{Confirm, Input, Select};
use kiln_schema::{get_builtin, list_builtins, parse_recipe_str, RecipeV1, RECIPE_FILENAME};
use std::io::{stderr, stdin, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn load_template(name: &str) -> Result<RecipeV1, String> {
    let builtin = get_builtin(name).ok_or_else(|| {
        let names: Vec<&str> = list_builtins().iter().map(|b| b.name).collect();
        format!("unknown template '{name}' (expected: {})", names.join(", "))
    })?;
    parse_recipe_str(builtin.recipe).map_err(|e| format!("template parse error: {e}"))
}

fn pick_template() -> Result<String, String> {
    let builtins = list_builtins();
    let items: Vec<String> = builtins
        .iter()
        .map(|b| format!("{:<18} {}", b.name, b.description))
        .collect();
    let idx = Select::new()
        .with_prompt("template")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    Ok(builtins[idx].name.to_owned())
}

/// Rename the template's package, carrying the name into libs and include paths.
fn customize(recipe: &mut RecipeV1, name: &str) {
    let old = std::mem::replace(&mut recipe.package.name, name.to_owned());
    if old == name {
        return;
    }
    for lib in &mut recipe.consumer.libs {
        if *lib == old {
            name.clone_into(lib);
        }
    }
    let old_include = format!("include/{old}");
    for rule in &mut recipe.artifacts {
        if rule.dst == old_include {
            rule.dst = format!("include/{name}");
        }
    }
}

fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist recipe: {}", e.error))?;
    Ok(())
}

fn ensure_can_write(dest: &Path, force: bool, is_tty: bool) -> Result<(), String> {
    if !dest.exists() || force {
        return Ok(());
    }
    let refuse = || format!("refusing to overwrite existing ./{RECIPE_FILENAME} (pass --force)");
    if !is_tty {
        return Err(refuse());
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("overwrite ./{RECIPE_FILENAME}?"))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    if overwrite {
        Ok(())
    } else {
        Err(refuse())
    }
}

pub fn run(name: &str, template: Option<&str>, force: bool, json: bool) -> Result<u8, String> {
    let dest = Path::new(RECIPE_FILENAME);
    let is_tty = stdin().is_terminal() && stderr().is_terminal();

    let template = match template {
        Some(t) => t.to_owned(),
        None if is_tty => pick_template()?,
        None => return Err("no --template provided and stdin is not a TTY".to_owned()),
    };
    let mut recipe = load_template(&template)?;
    ensure_can_write(dest, force, is_tty)?;
    customize(&mut recipe, name);

    if is_tty {
        let version: String = Input::new()
            .with_prompt("version")
            .default(recipe.package.version.clone())
            .interact_text()
            .map_err(|e| format!("prompt failed: {e}"))?;
        recipe.package.version = version;
    }

    let content = toml::to_string_pretty(&recipe).map_err(|e| format!("TOML serialization failed: {e}"))?;
    parse_recipe_str(&content)
        .and_then(|r| r.normalize())
        .map_err(|e| format!("recipe error: generated recipe is invalid: {e}"))?;
    write_atomic(dest, &content)?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": format!("./{RECIPE_FILENAME}"),
            "name": name,
            "template": template,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote ./{RECIPE_FILENAME} for '{name}'");
        println!("template: {template}");
    }
    Ok(EXIT_SUCCESS)
}
