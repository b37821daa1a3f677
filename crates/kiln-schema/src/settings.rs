use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting '{0}' (expected one of: os, compiler, build_type, arch)")]
    UnknownSetting(String),
    #[error("invalid value '{value}' for setting '{setting}', expected one of: {expected}")]
    InvalidValue {
        setting: &'static str,
        value: String,
        expected: String,
    },
    #[error("malformed setting assignment '{0}', expected '<key>=<value>'")]
    MalformedAssignment(String),
}

/// Compilers a recipe can be configured for.
pub const KNOWN_COMPILERS: &[&str] = &[
    "Visual Studio",
    "msvc",
    "gcc",
    "clang",
    "apple-clang",
    "intel",
];

macro_rules! setting_enum {
    ($(#[$meta:meta])* $name:ident, $setting:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SettingsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| SettingsError::InvalidValue {
                        setting: $setting,
                        value: s.to_owned(),
                        expected: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

setting_enum!(
    /// Target operating system.
    Os, "os", {
        Windows => "Windows",
        Linux => "Linux",
        Macos => "Macos",
        FreeBsd => "FreeBSD",
        Android => "Android",
        Ios => "iOS",
    }
);

setting_enum!(
    /// Build configuration of the produced binaries.
    BuildType, "build_type", {
        Debug => "Debug",
        Release => "Release",
        RelWithDebInfo => "RelWithDebInfo",
        MinSizeRel => "MinSizeRel",
    }
);

setting_enum!(
    /// Target CPU architecture.
    Arch, "arch", {
        X86 => "x86",
        X86_64 => "x86_64",
        Armv7 => "armv7",
        Armv8 => "armv8",
    }
);

/// External build context supplied by the caller. Recipes read it, never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub os: Os,
    pub compiler: String,
    pub build_type: BuildType,
    pub arch: Arch,
}

impl Settings {
    /// Settings describing the machine kiln is running on, in Release mode.
    pub fn detect_host() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Macos,
            "freebsd" => Os::FreeBsd,
            "android" => Os::Android,
            "ios" => Os::Ios,
            _ => Os::Linux,
        };
        let arch = match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "arm" => Arch::Armv7,
            "aarch64" => Arch::Armv8,
            _ => Arch::X86_64,
        };
        let compiler = match os {
            Os::Windows => "msvc",
            Os::Macos | Os::Ios => "apple-clang",
            _ => "gcc",
        };
        Self {
            os,
            compiler: compiler.to_owned(),
            build_type: BuildType::Release,
            arch,
        }
    }

    /// Assign a single setting by name, validating the value against its domain.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key.trim() {
            "os" => self.os = value.parse()?,
            "build_type" => self.build_type = value.parse()?,
            "arch" => self.arch = value.parse()?,
            "compiler" => {
                let compiler = value.trim();
                validate_compiler(compiler)?;
                compiler.clone_into(&mut self.compiler);
            }
            other => return Err(SettingsError::UnknownSetting(other.to_owned())),
        }
        Ok(())
    }

    /// Apply a `key=value` assignment as given on the command line.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), SettingsError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| SettingsError::MalformedAssignment(assignment.to_owned()))?;
        self.set(key, value)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_compiler(&self.compiler)
    }

    /// Settings as ordered `(name, value)` pairs.
    pub fn entries(&self) -> [(&'static str, String); 4] {
        [
            ("os", self.os.to_string()),
            ("compiler", self.compiler.clone()),
            ("build_type", self.build_type.to_string()),
            ("arch", self.arch.to_string()),
        ]
    }
}

fn validate_compiler(compiler: &str) -> Result<(), SettingsError> {
    if KNOWN_COMPILERS.contains(&compiler) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue {
            setting: "compiler",
            value: compiler.to_owned(),
            expected: KNOWN_COMPILERS.join(", "),
        })
    }
}
