//! Execution layer for Kiln recipes.
//!
//! Every external program a recipe needs (the SCM client, the build generator,
//! the make tool) is invoked through the `ToolRunner` capability. `SystemRunner`
//! spawns real processes; `MockRunner` records invocations and simulates their
//! effects for tests. The crate also acquires sources into the per-package
//! source folder, emits generator glue files, and checks tool prerequisites.

pub mod generator;
pub mod mock;
pub mod prereq;
pub mod runner;
pub mod scm;
pub mod system;

pub use generator::{glue_filename, render_glue, write_glue, BuildInfo};
pub use mock::MockRunner;
pub use prereq::{check_tool_prereqs, format_missing, MissingPrereq};
pub use runner::{select_runner, Invocation, ToolOutput, ToolRunner};
pub use scm::{acquire_source, resolve_revision, AcquiredSource};
pub use system::SystemRunner;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runner '{0}' is not available")]
    RunnerUnavailable(String),
    #[error("command '{command}' failed with exit code {code}: {stderr}")]
    ToolFailed {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("source acquisition failed: {0}")]
    SourceFailed(String),
    #[error("unsupported generator '{0}'")]
    UnsupportedGenerator(String),
    #[error("runner execution failed: {0}")]
    ExecFailed(String),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}
