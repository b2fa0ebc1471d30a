use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SdkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capture {
    /// Pipe stdout/stderr and keep them as text on the result.
    #[default]
    Capture,
    /// Let the child write straight to the parent's stdout/stderr.
    Inherit,
}

impl From<bool> for Capture {
    fn from(capture_output: bool) -> Self {
        if capture_output {
            Capture::Capture
        } else {
            Capture::Inherit
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub capture: Capture,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            capture: Capture::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    /// Full command line, program first, lossily decoded for display.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|token| token.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandResult {
    /// Display copy of the command line. The child received the exact bytes.
    pub args: Vec<String>,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: f64,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn check(self, operation: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(SdkError::ProcessFailed {
                operation: operation.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs the invocation to completion. Launch failures surface as
/// `SdkError::Io` with the original error kind intact.
pub fn execute(invocation: &Invocation) -> Result<CommandResult> {
    debug!(
        program = ?invocation.program,
        args = ?invocation.args,
        capture = ?invocation.capture,
        "Invoking bunker-convert"
    );

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args);
    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }
    command.envs(&invocation.env);
    // Only the output streams are redirected; the child shares our stdin either way.
    command.stdin(Stdio::inherit());

    let started_at = Instant::now();
    let (status, stdout, stderr) = match invocation.capture {
        Capture::Capture => {
            let output = command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()?;
            (
                output.status,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        }
        Capture::Inherit => (command.status()?, String::new(), String::new()),
    };
    let duration_ms = started_at.elapsed().as_secs_f64() * 1_000.0;
    let code = exit_code(status);

    debug!(
        program = ?invocation.program,
        code, duration_ms, "bunker-convert exited"
    );

    Ok(CommandResult {
        args: invocation.command_line(),
        code,
        stdout,
        stderr,
        duration_ms,
    })
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
