use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuiltinRecipe {
    pub name: &'static str,
    pub description: &'static str,
    pub recipe: &'static str,
}

pub const BUILTIN_RECIPES: &[BuiltinRecipe] = &[
    BuiltinRecipe {
        name: "michaqtutilislib",
        description: "MichaQtUtilisLib: Qt utility library built with qmake",
        recipe: r#"recipe_version = 1

[package]
name = "MichaQtUtilisLib"
version = "0.2"
license = "MIT - https://github.com/jackdaimond/MichaQtUtilisLib/blob/master/LICENSE"
author = "Michael Kloske"
url = "https://github.com/jackdaimond/MichaQtUtilisLib.git"
description = "Contains several functionalities often used in other Qt applications."

[settings]
declared = ["os", "compiler", "build_type", "arch"]

[options.shared]
default = false

[options.fPIC]
default = true
exclude_os = ["Windows"]

[source]
kind = "git"
url = "https://github.com/jackdaimond/MichaQtUtilisLib.git"
revision = "auto"
subfolder = ""

[build]
generator = "qmake"

[[build.steps]]
program = "qmake"
args = ["MichaQtUtilisLib.pro", "CONFIG+=release"]

[[build.steps]]
program = "nmake"
os = ["Windows"]

[[build.steps]]
program = "make"
os = ["Linux", "Macos", "FreeBSD", "Android", "iOS"]

[[artifacts]]
pattern = "*.h*"
src = "src"
dst = "include/MichaQtUtilisLib"
keep_path = true

[[artifacts]]
pattern = "*.lib"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.dll"
dst = "bin"
keep_path = false

[[artifacts]]
pattern = "*.so"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.dylib"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.a"
dst = "lib"
keep_path = false

[consumer]
libs = ["MichaQtUtilisLib"]
"#,
    },
    BuiltinRecipe {
        name: "cmake-library",
        description: "Template for a CMake-built C/C++ library",
        recipe: r#"recipe_version = 1

[package]
name = "mylib"
version = "0.1.0"

[options.shared]
default = false

[options.fPIC]
default = true
exclude_os = ["Windows"]

[source]
kind = "local"
url = "."
revision = "auto"

[build]
generator = "cmake"

[[build.steps]]
program = "cmake"
args = ["-S", ".", "-B", "out", "-DCMAKE_BUILD_TYPE=Release"]

[[build.steps]]
program = "cmake"
args = ["--build", "out", "--config", "Release"]

[[artifacts]]
pattern = "*.h"
src = "include"
dst = "include"

[[artifacts]]
pattern = "*.lib"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.dll"
dst = "bin"
keep_path = false

[[artifacts]]
pattern = "*.so"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.dylib"
dst = "lib"
keep_path = false

[[artifacts]]
pattern = "*.a"
dst = "lib"
keep_path = false

[consumer]
libs = ["mylib"]
"#,
    },
];

pub fn get_builtin(name: &str) -> Option<&'static BuiltinRecipe> {
    BUILTIN_RECIPES
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
}

pub fn list_builtins() -> &'static [BuiltinRecipe] {
    BUILTIN_RECIPES
}
