// Port Layer - Interfaces for external dependencies

pub mod filesystem;
pub mod id_provider; // Run ids in reports
pub mod placeholder;
pub mod time_provider;
pub mod tool_runner;

// Re-exports
pub use filesystem::{FsError, SubjectFs};
pub use id_provider::IdProvider;
pub use placeholder::{PlaceholderError, PlaceholderWriter};
pub use time_provider::TimeProvider;
pub use tool_runner::{ExecutionError, ExecutionResult, ExecutionStatus, ToolRunner};
