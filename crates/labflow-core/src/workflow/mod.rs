//! Order, exam and result workflow.
//!
//! Pipeline: Order Creation → Sample Collection → Analysis → Result Entry → Validation
//!
//! Every multi-step operation runs inside one store transaction. A transaction
//! that is dropped before `commit` rolls back, so any `?` on the way out leaves
//! the store untouched.

mod classifier;
mod exams;
mod identifiers;
mod orders;
mod results;
pub mod state_machine;

pub use classifier::*;
pub use exams::*;
pub use identifiers::*;
pub use orders::*;
pub use results::*;
pub use state_machine::{transition, ExamEvent};

use std::fmt;

use thiserror::Error;

use crate::db::DbError;

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    #[error("Invalid state transition: {event} not allowed from {from}")]
    StateTransition { from: String, event: String },
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        WorkflowError::Persistence(DbError::Sqlite(e))
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Category of a [`WorkflowError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    StateTransition,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
            ErrorKind::StateTransition => "state_transition",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Persistence(_) => ErrorKind::Persistence,
            WorkflowError::StateTransition { .. } => ErrorKind::StateTransition,
        }
    }

    pub(crate) fn not_found(what: &str, id: i64) -> Self {
        WorkflowError::NotFound(format!("{} {}", what, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            WorkflowError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(WorkflowError::not_found("order", 9).to_string(), "Not found: order 9");

        let err: WorkflowError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let err = WorkflowError::StateTransition {
            from: "validated".into(),
            event: "Reject".into(),
        };
        assert_eq!(err.kind().to_string(), "state_transition");
        assert!(err.to_string().contains("from validated"));
    }
}
