// mtlseg Infrastructure - System Adapters
// Implements: ToolRunner, SubjectFs

pub mod local_fs;
pub mod subprocess_runner;

pub use local_fs::LocalFs;
pub use subprocess_runner::{SubprocessToolRunner, ToolPaths};
