//! Engine lifecycle tests with the mock runner.

use kiln_core::{CoreError, CreateOptions, Engine, StoreLock};
use kiln_runtime::{MockRunner, RuntimeError};
use kiln_schema::{
    get_builtin, parse_recipe_str, Arch, BuildType, OptionOverrides, Os, Settings, LOCK_FILENAME,
};
use kiln_store::{PackageState, StoreLayout};
use std::fs;
use std::path::{Path, PathBuf};

fn settings(os: Os) -> Settings {
    let compiler = if os == Os::Windows { "msvc" } else { "gcc" };
    Settings {
        os,
        compiler: compiler.to_owned(),
        build_type: BuildType::Release,
        arch: Arch::X86_64,
    }
}

fn write_builtin(dir: &Path) -> PathBuf {
    let path = dir.join("kiln.toml");
    fs::write(&path, get_builtin("michaqtutilislib").unwrap().recipe).unwrap();
    path
}

/// Mock toolchain that produces a static Qt library on `make`.
fn qt_toolchain() -> MockRunner {
    MockRunner::new()
        .writes_file("qmake", "Makefile", "all:\n")
        .writes_file("make", "src/MichaQtUtilisLib.h", "#pragma once\n")
        .writes_file("make", "src/util/StringUtils.hpp", "#pragma once\n")
        .writes_file("make", "release/libMichaQtUtilisLib.a", "!<arch>\n")
}

#[test]
fn builtin_recipe_creates_package_on_linux() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let runner = qt_toolchain();

    let result = engine
        .create(&recipe, &settings(Os::Linux), &runner, &CreateOptions::default())
        .unwrap();

    assert_eq!(
        result.metadata.files,
        vec![
            "include/MichaQtUtilisLib/MichaQtUtilisLib.h",
            "include/MichaQtUtilisLib/util/StringUtils.hpp",
            "lib/libMichaQtUtilisLib.a",
        ]
    );
    assert_eq!(result.consumer.libs, vec!["MichaQtUtilisLib"]);
    assert!(result.unmatched_libs.is_empty());
    assert_eq!(result.metadata.state, PackageState::Described);
    assert_eq!(
        runner.programs(),
        vec!["git", "git", "git", "qmake", "make"],
        "rev-parse, clone, checkout, then the Linux build steps"
    );
    assert!(result.package_dir.join("kilnmanifest.txt").is_file());
}

#[test]
fn sample_tree_packages_exactly_four_files() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let runner = MockRunner::new()
        .writes_file("make", "src/a.h", "")
        .writes_file("make", "out/lib/foo.lib", "")
        .writes_file("make", "out/bin/foo.dll", "")
        .writes_file("make", "out/lib/libfoo.so", "");

    let result = engine
        .create(&recipe, &settings(Os::Linux), &runner, &CreateOptions::default())
        .unwrap();

    assert_eq!(
        result.metadata.files,
        vec![
            "bin/foo.dll",
            "include/MichaQtUtilisLib/a.h",
            "lib/foo.lib",
            "lib/libfoo.so",
        ]
    );
    // libs name MichaQtUtilisLib but only foo was built.
    assert_eq!(result.unmatched_libs, vec!["MichaQtUtilisLib"]);
}

#[test]
fn fpic_only_outside_windows() {
    let builtin = get_builtin("michaqtutilislib").unwrap();
    let recipe = parse_recipe_str(builtin.recipe).unwrap().normalize().unwrap();

    for os in Os::ALL {
        let plan = Engine::plan(&recipe, &settings(*os), &OptionOverrides::new()).unwrap();
        assert_eq!(plan.options.get("shared"), Some(false));
        if *os == Os::Windows {
            assert!(!plan.options.contains("fPIC"));
        } else {
            assert_eq!(plan.options.get("fPIC"), Some(true));
        }
    }
}

#[test]
fn consumer_libs_constant_across_option_combinations() {
    let builtin = get_builtin("michaqtutilislib").unwrap();
    let recipe = parse_recipe_str(builtin.recipe).unwrap().normalize().unwrap();

    for os in [Os::Linux, Os::Windows, Os::Macos] {
        for shared in [false, true] {
            for fpic in [false, true] {
                let mut overrides = OptionOverrides::new();
                overrides.set("shared", shared);
                overrides.set("fPIC", fpic);
                let plan = Engine::plan(&recipe, &settings(os), &overrides).unwrap();
                assert_eq!(plan.consumer.libs, vec!["MichaQtUtilisLib"]);
            }
        }
    }
}

#[test]
fn different_options_different_package_ids() {
    let builtin = get_builtin("michaqtutilislib").unwrap();
    let recipe = parse_recipe_str(builtin.recipe).unwrap().normalize().unwrap();

    let static_plan = Engine::plan(&recipe, &settings(Os::Linux), &OptionOverrides::new()).unwrap();
    let mut shared = OptionOverrides::new();
    shared.set("shared", true);
    let shared_plan = Engine::plan(&recipe, &settings(Os::Linux), &shared).unwrap();
    assert_ne!(static_plan.identity.package_id, shared_plan.identity.package_id);
}

#[test]
fn create_twice_is_idempotent() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());

    let r1 = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
        .unwrap();
    let r2 = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
        .unwrap();

    assert_eq!(r1.identity, r2.identity);
    assert_eq!(r1.metadata.files, r2.metadata.files);
    assert_eq!(r1.metadata.created_at, r2.metadata.created_at);
    assert_eq!(engine.list().unwrap().len(), 1);
    assert!(engine.verify(&r2.identity.short_id).unwrap().is_clean());
}

#[test]
fn failing_tool_leaves_no_package() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let runner = qt_toolchain().fail_program("make", 2, "undefined reference to `main'");

    let err = engine
        .create(&recipe, &settings(Os::Linux), &runner, &CreateOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Runtime(RuntimeError::ToolFailed { code: 2, .. })
    ));

    let plan = Engine::plan(
        &kiln_core::load_recipe(&recipe).unwrap(),
        &settings(Os::Linux),
        &OptionOverrides::new(),
    )
    .unwrap();
    let layout = StoreLayout::new(store.path());
    assert!(!layout.package_dir(&plan.identity.package_id).exists());
    assert!(!layout.work_path(&plan.identity.package_id).exists());
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn failing_tool_with_keep_build_keeps_only_intermediates() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let runner = qt_toolchain().fail_program("make", 2, "link error");
    let opts = CreateOptions {
        keep_intermediates: true,
        ..CreateOptions::default()
    };

    engine
        .create(&recipe, &settings(Os::Linux), &runner, &opts)
        .unwrap_err();

    let plan = Engine::plan(
        &kiln_core::load_recipe(&recipe).unwrap(),
        &settings(Os::Linux),
        &OptionOverrides::new(),
    )
    .unwrap();
    let layout = StoreLayout::new(store.path());
    assert!(layout.build_dir(&plan.identity.package_id).join("Makefile").is_file());
    assert!(!layout.package_dir(&plan.identity.package_id).exists());
}

#[test]
fn failed_rebuild_drops_previous_package() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());

    engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
        .unwrap();
    let broken = MockRunner::new().fail_program("qmake", 1, "Project ERROR");
    assert!(engine
        .create(&recipe, &settings(Os::Linux), &broken, &CreateOptions::default())
        .is_err());
    assert!(engine.list().unwrap().is_empty());
    assert_eq!(broken.programs().last().map(String::as_str), Some("qmake"));
}

#[test]
fn windows_build_runs_nmake() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let runner = MockRunner::new()
        .writes_file("nmake", "src/MichaQtUtilisLib.h", "")
        .writes_file("nmake", "release/MichaQtUtilisLib.lib", "")
        .writes_file("nmake", "release/MichaQtUtilisLib.dll", "");

    let result = engine
        .create(&recipe, &settings(Os::Windows), &runner, &CreateOptions::default())
        .unwrap();
    assert!(!result.metadata.options.contains("fPIC"));
    assert!(runner.programs().contains(&"nmake".to_owned()));
    assert!(!runner.programs().contains(&"make".to_owned()));
    assert!(result
        .metadata
        .files
        .contains(&"bin/MichaQtUtilisLib.dll".to_owned()));
    assert!(result.unmatched_libs.is_empty());
}

#[test]
fn strict_mode_rejects_empty_rules() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let opts = CreateOptions {
        strict_artifacts: true,
        ..Default::default()
    };

    let err = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &opts)
        .unwrap_err();
    assert!(matches!(err, CoreError::EmptyArtifactRule { .. }));
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn locked_create_requires_lock_file() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let opts = CreateOptions {
        locked: true,
        ..Default::default()
    };

    assert!(matches!(
        engine.create(&recipe, &settings(Os::Linux), &qt_toolchain(), &opts),
        Err(CoreError::Lock(_))
    ));

    let exported = engine.export(&recipe, &MockRunner::new()).unwrap();
    assert!(project.path().join(LOCK_FILENAME).is_file());
    let result = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &opts)
        .unwrap();
    assert_eq!(result.metadata.revision, exported.lock.revision);
}

#[test]
fn locked_create_detects_recipe_drift() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    engine.export(&recipe, &MockRunner::new()).unwrap();

    let drifted = fs::read_to_string(&recipe).unwrap().replace(
        "url = \"https://github.com/jackdaimond/MichaQtUtilisLib.git\"\nrevision",
        "url = \"https://example.invalid/fork.git\"\nrevision",
    );
    fs::write(&recipe, drifted).unwrap();

    let opts = CreateOptions {
        locked: true,
        ..Default::default()
    };
    assert!(matches!(
        engine.create(&recipe, &settings(Os::Linux), &qt_toolchain(), &opts),
        Err(CoreError::Lock(kiln_schema::LockError::RecipeDrift(_)))
    ));
}

#[test]
fn local_source_recipe_copies_tree() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    fs::create_dir_all(project.path().join("lib/include")).unwrap();
    fs::write(project.path().join("lib/include/demo.h"), "").unwrap();
    fs::write(
        project.path().join("kiln.toml"),
        r#"recipe_version = 1

[package]
name = "demo"
version = "1.0"

[source]
kind = "local"
url = "."
subfolder = "lib"

[[build.steps]]
program = "make"

[[artifacts]]
pattern = "*.h"
src = "include"
dst = "include"

[[artifacts]]
pattern = "*.a"
dst = "lib"
keep_path = false

[consumer]
libs = ["demo"]
"#,
    )
    .unwrap();

    let engine = Engine::new(store.path());
    let runner = MockRunner::new().writes_file("make", "build/libdemo.a", "");
    let result = engine
        .create(
            &project.path().join("kiln.toml"),
            &settings(Os::Linux),
            &runner,
            &CreateOptions::default(),
        )
        .unwrap();

    assert_eq!(result.metadata.files, vec!["include/demo.h", "lib/libdemo.a"]);
    let make = &runner.invocations()[0];
    assert!(make.cwd.ends_with("build/lib"));
}

#[test]
fn verify_detects_tampering_and_remove_cleans_up() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let result = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
        .unwrap();

    fs::write(
        result.package_dir.join("lib/libMichaQtUtilisLib.a"),
        "tampered",
    )
    .unwrap();
    let report = engine.verify(&result.identity.short_id).unwrap();
    assert_eq!(report.modified, vec!["lib/libMichaQtUtilisLib.a"]);

    let removed = engine.remove(&result.identity.package_id).unwrap();
    assert_eq!(removed.name, "MichaQtUtilisLib");
    assert!(!result.package_dir.exists());
    assert!(matches!(
        engine.inspect(&result.identity.short_id),
        Err(CoreError::PackageNotFound(_))
    ));
}

#[test]
fn keep_intermediates_preserves_build_folder() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let engine = Engine::new(store.path());
    let layout = StoreLayout::new(store.path());

    let dropped = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
        .unwrap();
    assert!(!layout.build_dir(&dropped.identity.package_id).exists());

    let opts = CreateOptions {
        keep_intermediates: true,
        ..Default::default()
    };
    let kept = engine
        .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &opts)
        .unwrap();
    assert!(layout
        .build_dir(&kept.identity.package_id)
        .join("kilnbuildinfo.pri")
        .is_file());
}

#[test]
fn store_lock_serializes_creates() {
    let store = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let recipe = write_builtin(project.path());
    let layout = StoreLayout::new(store.path());

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let root = store.path().to_path_buf();
            let recipe = recipe.clone();
            let lock_path = layout.lock_file();
            std::thread::spawn(move || {
                let _lock = StoreLock::acquire(&lock_path).unwrap();
                Engine::new(root)
                    .create(&recipe, &settings(Os::Linux), &qt_toolchain(), &CreateOptions::default())
                    .unwrap()
                    .identity
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(Engine::new(store.path()).list().unwrap().len(), 1);
}
