use thiserror::Error;

use crate::database::QueryError;

/// Errors that abort the current handler. Recoverable conditions
/// (division by zero, loop caps, unknown members) never surface here —
/// they go through the host diagnostic channel and execution continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Database error: {0}")]
    Query(#[from] QueryError),
}
