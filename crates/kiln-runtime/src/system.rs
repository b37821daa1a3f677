use crate::runner::{Invocation, ToolOutput, ToolRunner};
use crate::RuntimeError;
use std::process::Command;
use tracing::debug;

/// Runs programs on the host with `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for SystemRunner {
    fn name(&self) -> &'static str {
        "system"
    }

    fn available(&self) -> bool {
        true
    }

    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RuntimeError> {
        debug!(
            "running '{}' in {}",
            invocation.command_line(),
            invocation.cwd.display()
        );
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|source| RuntimeError::SpawnFailed {
                program: invocation.program.clone(),
                source,
            })?;

        // Killed by a signal: no exit code.
        let code = output.status.code().unwrap_or(-1);
        debug!("'{}' exited with {code}", invocation.program);

        Ok(ToolOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
