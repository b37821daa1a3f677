use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    let probe = if cfg!(windows) { "where" } else { "which" };
    Command::new(probe)
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn describe(program: &str) -> (&'static str, &'static str) {
    match program {
        "git" => (
            "source checkout",
            "zypper install git | apt install git | dnf install git | pacman -S git",
        ),
        "qmake" | "qmake6" => (
            "Qt project generation",
            "install the Qt development tools (apt install qt5-qmake qtbase5-dev | dnf install qt5-qtbase-devel)",
        ),
        "nmake" => (
            "building with the MSVC toolchain",
            "install Visual Studio Build Tools and run from a developer prompt",
        ),
        "make" => (
            "building generated makefiles",
            "zypper install make | apt install make | dnf install make | pacman -S make",
        ),
        "cmake" => (
            "CMake project generation",
            "zypper install cmake | apt install cmake | dnf install cmake | pacman -S cmake",
        ),
        _ => ("recipe build step", "install it and make sure it is on PATH"),
    }
}

/// Check that every program in `programs` can be found on `PATH`.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_tool_prereqs(programs: &[&str]) -> Vec<MissingPrereq> {
    programs
        .iter()
        .filter(|p| !command_exists(p))
        .map(|p| {
            let (purpose, install_hint) = describe(p);
            MissingPrereq {
                name: (*p).to_owned(),
                purpose,
                install_hint,
            }
        })
        .collect()
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nKiln requires these tools to build this recipe.");
    msg.push_str("\nSet KILN_SKIP_PREREQS=1 to skip this check.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "qmake".to_owned(),
            purpose: "Qt project generation",
            install_hint: "apt install qt5-qmake",
        };
        let s = format!("{m}");
        assert!(s.contains("qmake"));
        assert!(s.contains("Qt project generation"));
        assert!(s.contains("apt install qt5-qmake"));
    }

    #[test]
    fn absent_program_is_reported() {
        let missing = check_tool_prereqs(&["kiln-definitely-not-installed"]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "kiln-definitely-not-installed");
        assert_eq!(missing[0].purpose, "recipe build step");
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "git".to_owned(),
                purpose: "source checkout",
                install_hint: "apt install git",
            },
            MissingPrereq {
                name: "nmake".to_owned(),
                purpose: "building",
                install_hint: "Visual Studio Build Tools",
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("git"));
        assert!(output.contains("nmake"));
        assert!(output.contains("KILN_SKIP_PREREQS"));
    }
}
