//! Command-backed producer

use async_trait::async_trait;
use fanout_core::domain::process::ProcessSpec;
use fanout_core::error::TaskError;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::Producer;
use crate::duplicator::Duplicator;
use crate::process::{ProcessHandle, exit_failure};

/// Runs an external program and duplicates its stdout
pub struct CommandProducer {
    handle: ProcessHandle,
    chunk_size: usize,
}

impl CommandProducer {
    /// # Arguments
    /// * `spec` - Program to run
    /// * `chunk_size` - Largest chunk handed to the duplicator per write
    pub fn new(spec: ProcessSpec, chunk_size: usize) -> Self {
        Self {
            handle: ProcessHandle::new(spec),
            chunk_size: chunk_size.max(1),
        }
    }

    fn runtime_error(&self, reason: impl Into<String>) -> TaskError {
        TaskError::ProducerRuntime {
            program: self.handle.program().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Producer for CommandProducer {
    fn describe(&self) -> String {
        self.handle.describe()
    }

    async fn produce(&self, sink: &mut Duplicator) -> Result<u64, TaskError> {
        let (mut child, mut stdout) =
            self.handle
                .spawn_producer()
                .map_err(|e| TaskError::ProducerLaunch {
                    program: self.handle.program().to_string(),
                    reason: e.to_string(),
                })?;

        info!("Producer '{}' started", self.handle.describe());

        let mut buf = vec![0u8; self.chunk_size];
        let mut produced = 0u64;

        let streamed: Result<(), TaskError> = loop {
            let n = match stdout.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(self.runtime_error(format!("failed to read output: {}", e))),
            };

            if let Err(e) = sink.write(&buf[..n]).await {
                break Err(e.into_task_error());
            }
            produced += n as u64;
        };

        if let Err(err) = streamed {
            warn!(
                "Stopping producer '{}' after {} bytes: {}",
                self.handle.describe(),
                produced,
                err
            );
            drop(stdout);
            if let Err(e) = child.kill().await {
                debug!("Failed to kill producer: {}", e);
            }
            return Err(err);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| self.runtime_error(format!("failed to wait for exit: {}", e)))?;

        if let Some(reason) = exit_failure(status) {
            return Err(self.runtime_error(reason));
        }

        debug!("Producer '{}' finished after {} bytes", self.handle.describe(), produced);
        Ok(produced)
    }
}
