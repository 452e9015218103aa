// Application Layer - Use Cases

pub mod batch;
pub mod dataset;
pub mod pipeline;
pub mod shutdown;

// Re-exports
pub use batch::{BatchRequest, BatchRunner, BatchSummary, SubjectOutcome};
pub use dataset::{DatasetPreparer, PreparedSubject, SubjectRange};
pub use pipeline::{PipelineConfig, PipelineError, SegmenterConfig, SubjectPipeline};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
