//! Error types

use thiserror::Error;

/// Error while producing code for a call helper
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The code generator backend failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Generated code did not have the expected shape
    #[error("Invalid code: {0}")]
    InvalidCode(String),
}
