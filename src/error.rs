//! Domain error taxonomy for Brew POS.
//!
//! Every error here is local and recoverable: it maps 1:1 to a message the
//! calling layer can show the operator. None of them represent a crash
//! condition, and nothing in the core retries on its own — a validation
//! failure means the caller must supply corrected input.

use thiserror::Error;

/// Unified error type for the domain core.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested event is not defined for the current state
    /// (adjacency failure in a transition table).
    #[error("invalid transition: cannot apply {event} while {state}")]
    InvalidTransition { state: String, event: String },

    /// Adjacency was fine but a required prior workflow step is missing,
    /// or the step was already completed.
    #[error("workflow violation: {0}")]
    WorkflowViolation(String),

    /// Malformed input to a value object or aggregate constructor. Rejected
    /// before any state mutation, so no partial audit entries exist.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Aggregate does not exist at the given id. Propagated from the
    /// repository boundary unchanged.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Persistence-layer failure (SQLite or document (de)serialization).
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Shorthand for an adjacency failure.
    pub fn invalid_transition(state: impl std::fmt::Display, event: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            state: state.to_string(),
            event: event.to_string(),
        }
    }

    pub fn workflow(msg: impl Into<String>) -> Self {
        Self::WorkflowViolation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("document serialization: {e}"))
    }
}
