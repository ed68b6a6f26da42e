//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the pipeline uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("http status {status}: {context}")]
    Status { status: u16, context: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid kind: {0} (expected artist, album, or track)")]
    InvalidKind(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl PipelineError {
    /// True when the driver should log the failure and move on to the next
    /// artist instead of aborting the run.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            PipelineError::NotFound(_)
                | PipelineError::InvalidKind(_)
                | PipelineError::Status { .. }
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self { PipelineError::Http(e.to_string()) }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self { PipelineError::Parse(e.to_string()) }
}

impl From<redis::RedisError> for PipelineError {
    fn from(e: redis::RedisError) -> Self { PipelineError::Store(e.to_string()) }
}
