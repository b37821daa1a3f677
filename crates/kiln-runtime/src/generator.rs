use crate::RuntimeError;
use kiln_schema::{ResolvedOptions, Settings};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// What a generated glue file tells the native build about the package.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub settings: &'a Settings,
    pub options: &'a ResolvedOptions,
}

pub fn glue_filename(generator: &str) -> Result<Option<&'static str>, RuntimeError> {
    match generator {
        "none" => Ok(None),
        "qmake" => Ok(Some("kilnbuildinfo.pri")),
        "cmake" => Ok(Some("kilnbuildinfo.cmake")),
        "txt" => Ok(Some("kilnbuildinfo.txt")),
        other => Err(RuntimeError::UnsupportedGenerator(other.to_owned())),
    }
}

fn var_suffix(key: &str) -> String {
    key.to_ascii_uppercase().replace('-', "_")
}

fn render_qmake(info: &BuildInfo<'_>) -> String {
    let mut out = String::from("# Generated by kiln. Include from the .pro file.\n");
    let _ = writeln!(out, "KILN_PACKAGE_NAME = {}", info.name);
    let _ = writeln!(out, "KILN_PACKAGE_VERSION = {}", info.version);
    for (key, value) in info.settings.entries() {
        let _ = writeln!(out, "KILN_SETTING_{} = {value}", var_suffix(key));
    }
    for (name, value) in info.options.iter() {
        let _ = writeln!(out, "KILN_OPTION_{} = {value}", var_suffix(name));
    }
    match info.options.get("shared") {
        Some(true) => out.push_str("CONFIG += shared\n"),
        Some(false) => out.push_str("CONFIG += staticlib\n"),
        None => {}
    }
    if info.options.get("fPIC") == Some(true) {
        out.push_str("QMAKE_CXXFLAGS += -fPIC\n");
    }
    out.push_str("CONFIG += kiln_basic_setup\n");
    out
}

fn render_cmake(info: &BuildInfo<'_>) -> String {
    let mut out = String::from("# Generated by kiln. include() from CMakeLists.txt.\n");
    let _ = writeln!(out, "set(KILN_PACKAGE_NAME \"{}\")", info.name);
    let _ = writeln!(out, "set(KILN_PACKAGE_VERSION \"{}\")", info.version);
    for (key, value) in info.settings.entries() {
        let _ = writeln!(out, "set(KILN_SETTING_{} \"{value}\")", var_suffix(key));
    }
    for (name, value) in info.options.iter() {
        let flag = if value { "ON" } else { "OFF" };
        let _ = writeln!(out, "set(KILN_OPTION_{} {flag})", var_suffix(name));
    }
    if let Some(shared) = info.options.get("shared") {
        let flag = if shared { "ON" } else { "OFF" };
        let _ = writeln!(out, "set(BUILD_SHARED_LIBS {flag})");
    }
    if let Some(pic) = info.options.get("fPIC") {
        let flag = if pic { "ON" } else { "OFF" };
        let _ = writeln!(out, "set(CMAKE_POSITION_INDEPENDENT_CODE {flag})");
    }
    out
}

fn render_txt(info: &BuildInfo<'_>) -> String {
    let mut out = String::from("[package]\n");
    let _ = writeln!(out, "name={}", info.name);
    let _ = writeln!(out, "version={}", info.version);
    out.push_str("\n[settings]\n");
    for (key, value) in info.settings.entries() {
        let _ = writeln!(out, "{key}={value}");
    }
    out.push_str("\n[options]\n");
    for (name, value) in info.options.iter() {
        let _ = writeln!(out, "{name}={value}");
    }
    out
}

/// Render the glue file contents for `generator`, or `None` for `none`.
pub fn render_glue(generator: &str, info: &BuildInfo<'_>) -> Result<Option<String>, RuntimeError> {
    let rendered = match generator {
        "none" => None,
        "qmake" => Some(render_qmake(info)),
        "cmake" => Some(render_cmake(info)),
        "txt" => Some(render_txt(info)),
        other => return Err(RuntimeError::UnsupportedGenerator(other.to_owned())),
    };
    Ok(rendered)
}

/// Write the glue file into `build_root`. Returns the written path, if any.
pub fn write_glue(
    generator: &str,
    info: &BuildInfo<'_>,
    build_root: &Path,
) -> Result<Option<PathBuf>, RuntimeError> {
    let (Some(filename), Some(contents)) = (glue_filename(generator)?, render_glue(generator, info)?)
    else {
        return Ok(None);
    };
    let path = build_root.join(filename);
    std::fs::write(&path, contents)?;
    Ok(Some(path))
}
