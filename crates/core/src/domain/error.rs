// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid subject range: {0}")]
    InvalidSubjectRange(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
