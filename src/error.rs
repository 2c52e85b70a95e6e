//! Structured failure kinds.

use num_bigint::BigInt;
use thiserror::Error;

use crate::types::{BlockId, FunctionId};

/// Failure of an analysis run for one entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A loop head exceeded the configured iteration bound.
    #[error("fixpoint did not converge in {function} at loop head {head} after {iterations} iterations")]
    NoConvergence {
        function: FunctionId,
        head: BlockId,
        iterations: usize,
    },
    /// The entry value of the function is bottom: it cannot be reached under the given precondition.
    #[error("entry of {function} is unreachable")]
    UnreachableEntry { function: FunctionId },
    /// A function without body was requested as an entry point.
    #[error("{function} has no body")]
    MissingBody { function: FunctionId },
    #[error("unknown function {function}")]
    UnknownFunction { function: FunctionId },
}

/// Malformed abstract value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid congruence modulus {0} (must be non-negative)")]
    InvalidModulus(BigInt),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
