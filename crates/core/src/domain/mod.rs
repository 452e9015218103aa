// Domain Layer - Pure pipeline vocabulary and path bookkeeping

pub mod error;
pub mod inventory;
pub mod invocation;
pub mod layout;
pub mod modality;

// Re-exports
pub use error::DomainError;
pub use inventory::{InputFile, InputInventory};
pub use invocation::{Action, PipelinePlan, Step, StepPlan, Tool, ToolInvocation};
pub use layout::{SubjectLayout, TemplateLayout};
pub use modality::{Modality, Side};
