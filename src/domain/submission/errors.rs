//! Submission Context - Errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Unsupported media type: {0} (allowed: JPEG, PNG, WebP)")]
    UnsupportedType(String),

    #[error("File {name} is {size} bytes, exceeds limit of {max} bytes")]
    TooLarge { name: String, size: u64, max: u64 },

    #[error("File {0} is empty")]
    Empty(String),

    #[error("No files in submission")]
    EmptyBatch,

    #[error("Too many files: {count} (max {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("File {name} cannot be compressed below {ceiling} bytes")]
    Incompressible { name: String, ceiling: u64 },
}
