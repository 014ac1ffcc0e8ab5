//! Recoverable constraint-system errors.
//!
//! These accumulate on the system and are reported through the diagnostics
//! reporter when a call is finalized. Broken internal invariants panic
//! instead and never show up here.

use crate::bounds::ConstraintPosition;
use crate::env::TypeEnvironment;
use crate::format::TypeFormatter;
use crate::types::{TypeId, TypeVarId};
use kinfer_common::diagnostics::{Diagnostic, diagnostic_codes};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstraintSystemError {
    #[error("constraint {lower:?} <: {upper:?} cannot be satisfied")]
    NewConstraintError {
        lower: TypeId,
        upper: TypeId,
        position: ConstraintPosition,
    },

    #[error("constraining type of {var:?} is an error type")]
    ConstrainingTypeIsError {
        var: TypeVarId,
        ty: TypeId,
        position: ConstraintPosition,
    },

    #[error("not enough information to infer {var:?}")]
    NotEnoughInformation { var: TypeVarId },

    #[error("cannot infer {var:?}: candidates {candidates:?}")]
    CannotInferType { var: TypeVarId, candidates: Vec<TypeId> },

    #[error("inferred type {ty:?} of {var:?} is not one of its input types")]
    OnlyInputTypes { var: TypeVarId, ty: TypeId },

    #[error("incorporation stopped after {steps} steps")]
    IncorporationLimitExceeded { steps: u32 },
}

impl ConstraintSystemError {
    /// Whether the error makes the system inconsistent, as opposed to
    /// merely underconstrained.
    pub fn is_contradiction(&self) -> bool {
        !matches!(self, ConstraintSystemError::NotEnoughInformation { .. })
    }

    pub fn position(&self) -> Option<&ConstraintPosition> {
        match self {
            ConstraintSystemError::NewConstraintError { position, .. }
            | ConstraintSystemError::ConstrainingTypeIsError { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Render as a user diagnostic with readable type names.
    pub fn to_diagnostic(&self, env: &TypeEnvironment, call: Option<u32>) -> Diagnostic {
        let formatter = TypeFormatter::new(env);
        match self {
            ConstraintSystemError::NewConstraintError { lower, upper, .. } => Diagnostic::from_code(
                call,
                diagnostic_codes::TYPE_MISMATCH_IN_CONSTRAINT,
                &[&formatter.format(*lower), &formatter.format(*upper)],
            ),
            ConstraintSystemError::ConstrainingTypeIsError { var, .. } => Diagnostic::from_code(
                call,
                diagnostic_codes::CONSTRAINING_TYPE_IS_ERROR,
                &[&env.variable_name(*var)],
            ),
            ConstraintSystemError::NotEnoughInformation { var } => Diagnostic::from_code(
                call,
                diagnostic_codes::CANNOT_INFER_TYPE_PARAMETER,
                &[&env.variable_name(*var)],
            ),
            ConstraintSystemError::CannotInferType { var, candidates } => Diagnostic::from_code(
                call,
                diagnostic_codes::AMBIGUOUS_TYPE_INFERENCE,
                &[&env.variable_name(*var), &formatter.format_list(candidates)],
            ),
            ConstraintSystemError::OnlyInputTypes { var, ty } => Diagnostic::from_code(
                call,
                diagnostic_codes::ONLY_INPUT_TYPES_VIOLATION,
                &[&env.variable_name(*var)],
            )
            .with_related(format!("inferred type: {}", formatter.format(*ty))),
            ConstraintSystemError::IncorporationLimitExceeded { steps } => Diagnostic::from_code(
                call,
                diagnostic_codes::INCORPORATION_LIMIT_EXCEEDED,
                &[&steps.to_string()],
            ),
        }
    }
}

#[cfg(test)]
#[path = "../tests/errors_tests.rs"]
mod tests;
