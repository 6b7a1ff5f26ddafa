//! Error types for role resolution and play compilation

use thiserror::Error;

/// Errors that can occur while resolving and compiling role inclusions
///
/// All variants are fatal at this layer: nothing is retried, and errors
/// propagate unchanged to the compiler or executor that triggered the
/// resolution.
#[derive(Error, Debug)]
pub enum PlaybookError {
    /// Malformed directive or task options
    #[error("failed to parse directive: {0}")]
    Parse(String),

    /// Role could not be located or one of its definition files is invalid
    #[error("role resolution failed: {0}")]
    Resolution(String),

    /// Role-inclusion cycle detected by the locator
    #[error("recursive role inclusion detected: {0}")]
    Cycle(String),

    /// No play reachable from the directive's parent chain
    #[error("no play context available: {0}")]
    Scope(String),
}

pub type Result<T> = std::result::Result<T, PlaybookError>;
