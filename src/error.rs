//! Error types for the engine and the term serializer.
//!
//! Usage mistakes (calling `next()` on a closed query, bad variable names)
//! are reported synchronously and never reach the process. Process-side
//! failures arrive through the futures handed out by the engine.

use std::fmt;

use thiserror::Error;

use crate::engine::{EngineState, QueryState};

/// Why an engine ended up in the `Closed` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `Engine::close()` was called.
    Requested,
    /// The process exited with the given code (`None` when killed by a signal).
    Exited(Option<i32>),
    /// The process closed its standard output.
    OutputClosed,
    /// The process wrote a line that could not be decoded.
    Protocol(String),
    /// Writing to or reading from the process failed.
    Io(String),
    /// Every engine handle was dropped before the request was answered.
    Dropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "closed by request"),
            CloseReason::Exited(Some(code)) => write!(f, "process exited with code {}", code),
            CloseReason::Exited(None) => write!(f, "process terminated by signal"),
            CloseReason::OutputClosed => write!(f, "process output closed"),
            CloseReason::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            CloseReason::Io(msg) => write!(f, "I/O failure: {}", msg),
            CloseReason::Dropped => write!(f, "engine dropped"),
        }
    }
}

/// Errors reported by [`Engine`](crate::Engine) and [`Query`](crate::Query).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The process could not be launched.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// The query does not accept this operation in its current state.
    #[error("Invalid query state {0}")]
    InvalidQueryState(QueryState),

    /// The engine cannot send a request in its current state.
    #[error("Invalid engine state {0}")]
    InvalidEngineState(EngineState),

    /// The process reported an error for the running query.
    #[error("Query error: {0}")]
    Query(String),

    /// The process output could not be decoded, or arrived unexpectedly.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The engine is closed and takes no further requests.
    #[error("Engine closed: {0}")]
    Closed(CloseReason),

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Errors produced while building or decoding terms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TermError {
    /// Variable names must match `^[A-Z_][A-Za-z0-9]*$`.
    #[error("Variable name must match the pattern ^[A-Z_][A-Za-z0-9]*$, got {0:?}")]
    InvalidVariableName(String),

    /// The value has no term representation.
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    /// Floats must be finite to have a textual representation.
    #[error("Invalid number: {0}")]
    InvalidNumber(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::InvalidQueryState(QueryState::Waiting);
        assert_eq!(err.to_string(), "Invalid query state waiting");

        let err = EngineError::Query("Unknown procedure foo/0".to_string());
        assert_eq!(err.to_string(), "Query error: Unknown procedure foo/0");

        let err = EngineError::Closed(CloseReason::Protocol("expected value".to_string()));
        assert_eq!(
            err.to_string(),
            "Engine closed: protocol violation: expected value"
        );
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Exited(Some(1)).to_string(), "process exited with code 1");
        assert_eq!(CloseReason::Exited(None).to_string(), "process terminated by signal");
        assert_eq!(CloseReason::Requested.to_string(), "closed by request");
    }

    #[test]
    fn test_engine_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(ref msg) if msg == "pipe closed"));
    }

    #[test]
    fn test_term_error_display() {
        let err = TermError::InvalidVariableName("x".to_string());
        assert!(err.to_string().contains("\"x\""));

        let err = TermError::InvalidTerm("true".to_string());
        assert_eq!(err.to_string(), "Invalid term: true");
    }
}
