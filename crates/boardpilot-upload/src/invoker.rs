//! External toolchain invocation.
//!
//! Everything that spawns a subprocess goes through the narrow
//! [`ToolInvoker`] interface: argv in, exit status plus combined output
//! text out, bounded by an explicit timeout. The resolver and the upload
//! orchestrator only ever see this trait, so tests run against scripted
//! fakes instead of a real toolchain installation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Result of one external tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Exit code (0 = success, -1 when the process died without one).
    pub exit_code: i32,

    /// Combined stdout and stderr, lossily decoded.
    pub output: String,
}

impl ToolOutput {
    /// Whether the invocation exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A successful output with the given text.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
        }
    }

    /// A failed output with the given exit code and text.
    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }
}

/// Errors from the invocation layer itself (the tool's own non-zero exits
/// are reported through [`ToolOutput`], not here).
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed reading output of '{program}': {source}")]
    Output {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Narrow interface over subprocess execution.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run the tool with `args`, capturing combined output. The call is
    /// cancel-safe: dropping the future kills the spawned process, so a
    /// cancelled job can never orphan a process holding a serial port.
    async fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, InvokeError>;

    /// The program this invoker runs, for diagnostics.
    fn program(&self) -> String;
}

/// Production invoker backed by `tokio::process::Command`.
pub struct CliInvoker {
    program: PathBuf,
}

impl CliInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ToolInvoker for CliInvoker {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, InvokeError> {
        let program = self.program();

        let child = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| InvokeError::Timeout {
                program: program.clone(),
                timeout,
            })?
            .map_err(|source| InvokeError::Output { program, source })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            exit_code,
            output: combined,
        })
    }

    fn program(&self) -> String {
        self.program.to_string_lossy().to_string()
    }
}
