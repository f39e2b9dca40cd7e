//! External process handles
//!
//! Builds child processes from a [`ProcessSpec`]:
//! - producers get a piped stdout (the stream being duplicated)
//! - consumers get a piped stdin (their leg)
//! - stderr is always inherited so diagnostics reach the operator
//!
//! Every child is spawned with `kill_on_drop`, so dropping a task's future
//! (deadline, cancellation) also terminates its process.

use fanout_core::domain::process::ProcessSpec;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// Handle for one external program invocation
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    spec: ProcessSpec,
}

impl ProcessHandle {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn program(&self) -> &str {
        &self.spec.program
    }

    /// Command line for logs
    pub fn describe(&self) -> String {
        self.spec.to_string()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(cwd) = &self.spec.cwd {
            command.current_dir(cwd);
        }

        command
    }

    /// Starts the program with its stdout piped back to us
    pub fn spawn_producer(&self) -> io::Result<(Child, ChildStdout)> {
        let mut child = self.command().stdout(Stdio::piped()).spawn()?;
        debug!("Spawned producer '{}' (pid {:?})", self.describe(), child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("producer stdout was not captured"))?;
        Ok((child, stdout))
    }

    /// Starts the program reading from a pipe, with stdout sent to `stdout`
    pub fn spawn_consumer(&self, stdout: Stdio) -> io::Result<(Child, ChildStdin)> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(stdout)
            .spawn()?;
        debug!("Spawned consumer '{}' (pid {:?})", self.describe(), child.id());

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("consumer stdin was not captured"))?;
        Ok((child, stdin))
    }

    /// Runs the program to completion with no piped streams
    ///
    /// Returns `Err` with a readable reason if it could not start or
    /// exited unsuccessfully.
    pub async fn run(&self) -> Result<(), String> {
        let status = self
            .command()
            .status()
            .await
            .map_err(|e| format!("failed to start '{}': {}", self.describe(), e))?;

        match exit_failure(status) {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Describes an unsuccessful exit status; `None` on success
pub fn exit_failure(status: ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }

    if let Some(code) = status.code() {
        return Some(format!("exit code {}", code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(format!("terminated by signal {}", signal));
        }
    }

    Some(format!("exited unsuccessfully ({})", status))
}
