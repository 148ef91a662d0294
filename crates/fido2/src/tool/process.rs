use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Invocation, ToolOutput, ToolRunner};
use crate::error::ExecutionError;
use crate::{Error, Result};

/// Runs the tool as a plain child process with captured output
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<ToolOutput> {
        debug!(
            "Running {} {:?}",
            self.program.display(),
            invocation.redacted_args()
        );

        // The child is killed and reaped if the wait below is abandoned
        let child = Command::new(&self.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(ExecutionError::from)?,
            Err(_) => {
                warn!("{} did not finish within {:?}", invocation.operation(), timeout);
                return Err(Error::Timeout {
                    operation: invocation.operation(),
                    after: timeout,
                });
            }
        };

        let output = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {:?}", invocation.operation(), output.code);

        Ok(output)
    }
}
