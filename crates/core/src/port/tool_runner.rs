// Tool Runner Port
// Abstraction for executing external tools (registration, conversion, segmentation)

use crate::domain::{Tool, ToolInvocation};
use async_trait::async_trait;
use thiserror::Error;

/// Result of one tool call
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed for {tool}: {message}")]
    SpawnFailed { tool: Tool, message: String },

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Tool Runner trait
///
/// Implementations:
/// - SubprocessToolRunner: spawns the configured program
/// - mocks::RecordingToolRunner: records calls for tests
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run one invocation to completion
    ///
    /// A tool that starts but exits non-zero is a successful call with
    /// `ExecutionStatus::Failed`; the caller decides what that means.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the program cannot be started
    /// - ExecutionError::Timeout if the call exceeds the configured limit
    async fn run(&self, invocation: &ToolInvocation) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::filesystem::mocks::InMemoryFs;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior for one tool
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 and create every declared output
        Success,
        /// Exit 0 without creating outputs
        SuccessWithoutOutputs,
        /// Exit non-zero with the given stderr
        ExitFailure(String),
        /// Cannot start the program
        SpawnFailure(String),
    }

    /// Mock tool runner that records every invocation
    pub struct RecordingToolRunner {
        fs: Option<Arc<InMemoryFs>>,
        overrides: Mutex<Vec<(Tool, MockBehavior)>>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl RecordingToolRunner {
        pub fn new() -> Self {
            Self {
                fs: None,
                overrides: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Successful calls materialise their outputs in `fs`
        pub fn with_fs(fs: Arc<InMemoryFs>) -> Self {
            Self {
                fs: Some(fs),
                ..Self::new()
            }
        }

        pub fn set_behavior(&self, tool: Tool, behavior: MockBehavior) {
            self.overrides.lock().unwrap().push((tool, behavior));
        }

        pub fn calls(&self) -> Vec<ToolInvocation> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_for(&self, tool: Tool) -> Vec<ToolInvocation> {
            self.calls()
                .into_iter()
                .filter(|c| c.tool == tool)
                .collect()
        }

        fn behavior_for(&self, tool: Tool) -> MockBehavior {
            self.overrides
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(t, _)| *t == tool)
                .map(|(_, b)| b.clone())
                .unwrap_or(MockBehavior::Success)
        }
    }

    impl Default for RecordingToolRunner {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ToolRunner for RecordingToolRunner {
        async fn run(
            &self,
            invocation: &ToolInvocation,
        ) -> Result<ExecutionResult, ExecutionError> {
            self.calls.lock().unwrap().push(invocation.clone());

            let ok = ExecutionResult {
                status: ExecutionStatus::Success,
                duration_ms: 10,
                exit_code: Some(0),
                stdout: Some("mock output".to_string()),
                stderr: None,
            };

            match self.behavior_for(invocation.tool) {
                MockBehavior::Success => {
                    if let Some(fs) = &self.fs {
                        for output in &invocation.outputs {
                            fs.add_file(output);
                        }
                    }
                    Ok(ok)
                }
                MockBehavior::SuccessWithoutOutputs => Ok(ok),
                MockBehavior::ExitFailure(stderr) => Ok(ExecutionResult {
                    status: ExecutionStatus::Failed,
                    duration_ms: 10,
                    exit_code: Some(1),
                    stdout: None,
                    stderr: Some(stderr),
                }),
                MockBehavior::SpawnFailure(message) => Err(ExecutionError::SpawnFailed {
                    tool: invocation.tool,
                    message,
                }),
            }
        }
    }
}
