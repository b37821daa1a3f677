use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One program invocation: what to run, where, and with which extra environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Capability to run external programs on behalf of a recipe.
///
/// Implementations run synchronously and never retry. Output is captured but
/// not interpreted; callers decide what a non-zero exit means.
pub trait ToolRunner: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RuntimeError>;

    /// Run and turn a non-zero exit status into `RuntimeError::ToolFailed`.
    fn run_checked(&self, invocation: &Invocation) -> Result<ToolOutput, RuntimeError> {
        let output = self.run(invocation)?;
        if output.success() {
            Ok(output)
        } else {
            Err(RuntimeError::ToolFailed {
                command: invocation.command_line(),
                code: output.code,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }
}

pub fn select_runner(name: &str) -> Result<Box<dyn ToolRunner>, RuntimeError> {
    match name {
        "system" => Ok(Box::new(crate::system::SystemRunner::new())),
        "mock" => Ok(Box::new(crate::mock::MockRunner::new())),
        other => Err(RuntimeError::RunnerUnavailable(other.to_owned())),
    }
}
