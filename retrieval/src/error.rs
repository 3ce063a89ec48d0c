//! Error types returned by the retrieval engine.
//!
//! Every variant is a local, recoverable condition. A mutation that fails
//! leaves the document store and the scoring index untouched.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Document with id {0} already exists.")]
    DuplicateId(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Search deadline exceeded")]
    DeadlineExceeded,
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::DuplicateId(_))
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateId(_) | EngineError::InvalidConfiguration(_)
        )
    }
}
