// Subprocess tool runner
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use mtlseg_core::constants::{
    DEFAULT_C3D_PROGRAM, DEFAULT_GREEDY_PROGRAM, DEFAULT_SEGMENTER_PROGRAM,
    DEFAULT_TRIM_NECK_PROGRAM, GRACEFUL_SHUTDOWN_TIMEOUT,
};
use mtlseg_core::domain::{Tool, ToolInvocation};
use mtlseg_core::port::{
    ExecutionError, ExecutionResult, ExecutionStatus, TimeProvider, ToolRunner,
};

/// Program used for each external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub c3d: PathBuf,
    pub greedy: PathBuf,
    pub trim_neck: PathBuf,
    pub segmenter: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            c3d: PathBuf::from(DEFAULT_C3D_PROGRAM),
            greedy: PathBuf::from(DEFAULT_GREEDY_PROGRAM),
            trim_neck: PathBuf::from(DEFAULT_TRIM_NECK_PROGRAM),
            segmenter: PathBuf::from(DEFAULT_SEGMENTER_PROGRAM),
        }
    }
}

impl ToolPaths {
    pub fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Convert3D => &self.c3d,
            Tool::Greedy => &self.greedy,
            Tool::TrimNeck => &self.trim_neck,
            Tool::Segmenter => &self.segmenter,
        }
    }
}

/// Spawns the configured program for each invocation
pub struct SubprocessToolRunner {
    paths: ToolPaths,
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Option<Vec<String>>,
    timeout: Option<Duration>,
    grace_period: Duration,
}

impl SubprocessToolRunner {
    /// Create a new runner that inherits the parent environment
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessToolRunner::new(ToolPaths::default(), Arc::new(SystemTimeProvider))
    ///     .with_timeout(Duration::from_secs(3600));
    /// ```
    pub fn new(paths: ToolPaths, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            paths,
            time_provider,
            env_allowlist: None,
            timeout: None,
            grace_period: GRACEFUL_SHUTDOWN_TIMEOUT,
        }
    }

    /// Start tools with a cleared environment holding only these variables
    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = Some(allowlist);
        self
    }

    /// Terminate any tool running longer than `limit`
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Time between SIGTERM and SIGKILL once a tool has timed out
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Filter environment variables to the allowlist
    fn filter_env(
        allowlist: &[String],
        env: impl Iterator<Item = (String, String)>,
    ) -> HashMap<String, String> {
        env.filter(|(k, _)| allowlist.contains(k)).collect()
    }

    fn build_command(&self, program: &Path, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(allowlist) = &self.env_allowlist {
            command
                .env_clear()
                .envs(Self::filter_env(allowlist, std::env::vars()));
        }

        command
    }

    /// Spawn child process and wait for it, honouring the timeout
    async fn spawn_and_wait(
        &self,
        tool: Tool,
        program: &Path,
        args: &[String],
    ) -> Result<(std::process::ExitStatus, String, String), ExecutionError> {
        let mut child = self
            .build_command(program, args)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed {
                tool,
                message: format!("{}: {}", program.display(), e),
            })?;

        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match self.timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(|e| ExecutionError::IoError(e.to_string()))?,
                Err(_) => {
                    warn!(tool = %tool, limit_ms = limit.as_millis() as u64, "Tool timed out");
                    terminate_gracefully(&mut child, self.grace_period).await?;
                    return Err(ExecutionError::Timeout(limit.as_millis() as i64));
                }
            },
            None => child
                .wait()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string()))?,
        };

        let stdout = stdout
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))?;
        let stderr = stderr
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))?;

        Ok((status, stdout, stderr))
    }
}

/// Drain a child pipe into a (lossy) string
async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            warn!(error = %e, "Failed to read tool output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM first, SIGKILL if the tool is still alive after the grace period
async fn terminate_gracefully(
    child: &mut Child,
    grace_period: Duration,
) -> Result<(), ExecutionError> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(|e| ExecutionError::Killed(format!("SIGTERM failed: {}", e)))?;

            if timeout(grace_period, child.wait()).await.is_ok() {
                info!(pid = %pid, "Process exited gracefully after SIGTERM");
                return Ok(());
            }
            warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
        }
    }

    child
        .kill()
        .await
        .map_err(|e| ExecutionError::Killed(e.to_string()))
}

#[async_trait]
impl ToolRunner for SubprocessToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ExecutionResult, ExecutionError> {
        let program = self.paths.program(invocation.tool);
        let start_time = self.time_provider.now_millis();

        info!(
            tool = %invocation.tool,
            program = %program.display(),
            args = ?invocation.args,
            "Starting tool"
        );

        let (status, stdout, stderr) = self
            .spawn_and_wait(invocation.tool, program, &invocation.args)
            .await?;

        let duration_ms = self.time_provider.now_millis() - start_time;

        if !stdout.is_empty() {
            debug!(tool = %invocation.tool, stdout = %stdout, "Tool output");
        }

        let result = ExecutionResult {
            status: if status.success() {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failed
            },
            exit_code: status.code(),
            duration_ms,
            stdout: Some(stdout),
            stderr: Some(stderr),
        };

        info!(
            tool = %invocation.tool,
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            status = ?result.status,
            "Tool finished"
        );

        Ok(result)
    }
}
