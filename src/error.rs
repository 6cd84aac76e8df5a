//! Evaluation error types
//!
//! Two families of failure cross the evaluator boundary:
//! - structural defects in the tree itself (wrong branch count, oversized
//!   branch lists) which abort the round, and
//! - recoverable absences (an unbound environment key) which callers may
//!   handle by supplying a default.
//!
//! Absent neighbor data is NOT an error: the network boundary reports it as
//! a missing entry in the aligned field.

use thiserror::Error;

/// Result alias used throughout the evaluator.
pub type EvalResult<T = ()> = Result<T, EvalError>;

/// Error raised while evaluating an annotated tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The tree violates a structural invariant. Fatal for the round.
    #[error("malformed tree: {reason}")]
    MalformedTree { reason: String },

    /// An environment read found no binding and no default was supplied.
    #[error("variable `{name}` is not bound in the execution environment")]
    UnboundVariable { name: String },

    /// An operator was applied to values it does not accept.
    #[error("type mismatch in `{operation}`: got {found}")]
    TypeMismatch {
        operation: &'static str,
        found: String,
    },

    /// A context service was requested in a scope that does not carry it,
    /// e.g. environment access from a parallel pure-branch evaluation.
    #[error("context service `{service}` is not available in this evaluation scope")]
    ServiceUnavailable { service: &'static str },
}

impl EvalError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        EvalError::MalformedTree {
            reason: reason.into(),
        }
    }
}
