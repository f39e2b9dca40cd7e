//! Command-backed and file-backed consumers

use async_trait::async_trait;
use fanout_core::domain::process::ProcessSpec;
use fanout_core::error::TaskError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{ConsumeReport, Consumer, pump};
use crate::leg::LegReader;
use crate::process::{ProcessHandle, exit_failure};

/// Feeds a leg into an external program's stdin
///
/// A program that exits before reading its whole leg fails the task, even
/// with a zero exit status: the bytes it never read would otherwise be lost
/// silently.
pub struct CommandConsumer {
    destination: String,
    handle: ProcessHandle,
    output: Option<PathBuf>,
}

impl CommandConsumer {
    /// # Arguments
    /// * `destination` - Identifier used in logs and reports
    /// * `spec` - Program to run
    /// * `output` - File receiving the program's stdout (inherited when `None`)
    pub fn new(destination: impl Into<String>, spec: ProcessSpec, output: Option<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            handle: ProcessHandle::new(spec),
            output,
        }
    }

    fn runtime_error(&self, leg: usize, reason: impl Into<String>) -> TaskError {
        TaskError::ConsumerRuntime {
            leg,
            destination: self.destination.clone(),
            reason: reason.into(),
        }
    }

    fn launch_error(&self, leg: usize, reason: impl Into<String>) -> TaskError {
        TaskError::ConsumerLaunch {
            leg,
            destination: self.destination.clone(),
            reason: reason.into(),
        }
    }

    async fn stdout(&self, leg: usize) -> Result<Stdio, TaskError> {
        let Some(path) = &self.output else {
            return Ok(Stdio::inherit());
        };

        let file = create_file(path).await.map_err(|e| {
            self.launch_error(
                leg,
                format!("failed to create output file {}: {}", path.display(), e),
            )
        })?;
        Ok(Stdio::from(file.into_std().await))
    }
}

/// How the feeding loop and the child raced
enum Feed {
    Finished(std::io::Result<()>),
    ChildExited(std::io::Result<std::process::ExitStatus>),
}

#[async_trait]
impl Consumer for CommandConsumer {
    fn destination(&self) -> &str {
        &self.destination
    }

    async fn consume(&self, leg: usize, mut source: LegReader) -> Result<ConsumeReport, TaskError> {
        let stdout = self.stdout(leg).await?;
        let (mut child, mut stdin) = self
            .handle
            .spawn_consumer(stdout)
            .map_err(|e| self.launch_error(leg, e.to_string()))?;

        debug!(
            "Consumer '{}' started for {}",
            self.handle.describe(),
            self.destination
        );

        let delivered = source.delivered();
        let feed = tokio::select! {
            fed = pump(&mut source, &mut stdin, &delivered) => Feed::Finished(fed),
            status = child.wait() => Feed::ChildExited(status),
        };

        let fed = match feed {
            Feed::Finished(fed) => fed,
            Feed::ChildExited(status) => {
                let status = status.map_err(|e| self.runtime_error(leg, e.to_string()))?;
                if let Some(reason) = exit_failure(status) {
                    source.close();
                    return Err(self.runtime_error(leg, reason));
                }
                // Exited cleanly; it must not have left input behind.
                pump(&mut source, &mut stdin, &delivered).await
            }
        };

        // EOF for the child
        drop(stdin);

        if let Err(e) = fed {
            source.close();
            let status = child.wait().await.ok().and_then(exit_failure);
            let reason = match status {
                Some(exit) => format!("{} after {} bytes", exit, delivered.get()),
                None => format!("stopped reading input after {} bytes: {}", delivered.get(), e),
            };
            return Err(self.runtime_error(leg, reason));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| self.runtime_error(leg, format!("failed to wait for exit: {}", e)))?;

        if let Some(reason) = exit_failure(status) {
            return Err(self.runtime_error(leg, reason));
        }

        Ok(ConsumeReport {
            bytes: delivered.get(),
            warnings: Vec::new(),
        })
    }
}

/// Writes a leg into a file, creating or truncating it
pub struct FileConsumer {
    destination: String,
    path: PathBuf,
}

impl FileConsumer {
    pub fn new(destination: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Consumer for FileConsumer {
    fn destination(&self) -> &str {
        &self.destination
    }

    async fn consume(&self, leg: usize, mut source: LegReader) -> Result<ConsumeReport, TaskError> {
        let mut file = create_file(&self.path)
            .await
            .map_err(|e| TaskError::ConsumerLaunch {
                leg,
                destination: self.destination.clone(),
                reason: format!(
                    "failed to create or open file {}: {}",
                    self.path.display(),
                    e
                ),
            })?;

        let delivered = source.delivered();
        if let Err(e) = pump(&mut source, &mut file, &delivered).await {
            source.close();
            return Err(TaskError::ConsumerRuntime {
                leg,
                destination: self.destination.clone(),
                reason: format!("failed to write to file {}: {}", self.path.display(), e),
            });
        }

        let mut warnings = Vec::new();
        if let Err(e) = close_file(file).await {
            let warning = format!("failed to close file {}: {}", self.path.display(), e);
            warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(ConsumeReport {
            bytes: delivered.get(),
            warnings,
        })
    }
}

async fn create_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);
    options.open(path).await
}

async fn close_file(mut file: File) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await
}
