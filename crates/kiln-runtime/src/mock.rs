use crate::runner::{Invocation, ToolOutput, ToolRunner};
use crate::RuntimeError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    invocations: Vec<Invocation>,
}

/// Records invocations instead of running them.
///
/// Behaviour per program can be scripted: a failure exit code, canned stdout,
/// and files to write relative to the working directory (to simulate build
/// outputs). Unscripted programs succeed with empty output, except that
/// `git` answers with a deterministic commit hash.
#[derive(Debug)]
pub struct MockRunner {
    state: Mutex<MockState>,
    failures: HashMap<String, (i32, String)>,
    stdout: HashMap<String, String>,
    writes: HashMap<String, Vec<(PathBuf, Vec<u8>)>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        let mut stdout = HashMap::new();
        stdout.insert("git".to_owned(), format!("{}\n", mock_commit()));
        Self {
            state: Mutex::new(MockState::default()),
            failures: HashMap::new(),
            stdout,
            writes: HashMap::new(),
        }
    }
}

/// 40-hex commit id returned for every mock `git` call.
pub fn mock_commit() -> String {
    let hex = blake3::hash(b"kiln-mock-commit").to_hex();
    hex[..40].to_owned()
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fail_program(mut self, program: &str, code: i32, stderr: &str) -> Self {
        self.failures
            .insert(program.to_owned(), (code, stderr.to_owned()));
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, program: &str, stdout: &str) -> Self {
        self.stdout.insert(program.to_owned(), stdout.to_owned());
        self
    }

    #[must_use]
    pub fn writes_file(
        mut self,
        program: &str,
        relative: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        self.writes
            .entry(program.to_owned())
            .or_default()
            .push((relative.into(), contents.into()));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state
            .lock()
            .map(|s| s.invocations.clone())
            .unwrap_or_default()
    }

    pub fn programs(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.program).collect()
    }
}

impl ToolRunner for MockRunner {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .invocations
            .push(invocation.clone());

        if let Some((code, stderr)) = self.failures.get(&invocation.program) {
            return Ok(ToolOutput {
                code: *code,
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        if let Some(files) = self.writes.get(&invocation.program) {
            for (relative, contents) in files {
                let path = invocation.cwd.join(relative);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, contents)?;
            }
        }

        Ok(ToolOutput {
            code: 0,
            stdout: self
                .stdout
                .get(&invocation.program)
                .cloned()
                .unwrap_or_default(),
            stderr: String::new(),
        })
    }
}
