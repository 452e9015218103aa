// mtlseg Core - Domain Logic & Ports
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod constants;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
