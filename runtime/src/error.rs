//! Errors produced while executing.
//!
//! Static problems (linking and verification) are reported as
//! [`Diagnostic`] lists. Errors that occur while stepping are a [`Fault`]
//! and abort the cycle in which they occur.
use stint_dsl::{
    core::{Id, Located, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;
use thiserror::Error;

use crate::{memory::VarId, unit::UnitId};

/// Failures of operations on values. These are produced by the
/// implementations of [`crate::value::Value`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value exceeds the upper limit of the type")]
    Overflow,
    #[error("value exceeds the lower limit of the type")]
    Underflow,
    #[error("value is not compatible with the operation")]
    Incompatible,
    #[error("division by zero")]
    DivisionByZero,
    #[error("subscript {0} is outside of the array range")]
    IndexOutOfRange(i128),
    #[error("value has no such element")]
    NoSuchElement,
    #[error("operation is not supported by the type")]
    Unsupported,
}

/// Failures while stepping.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("unit {0} is already on the call stack")]
    Reentrant(UnitId),
    #[error("unit {0} is not available")]
    UnitUnavailable(UnitId),
    #[error("variable {0} is not available")]
    VariableUnavailable(VarId),
    #[error("call depth exceeds {0}")]
    CallDepthExceeded(usize),
    #[error("no {0} context")]
    MissingContext(&'static str),
    #[error("cycle exceeds the budget of {0} steps")]
    StepBudgetExceeded(u64),
    #[error("{0} is already executing")]
    Busy(Id),
    #[error("variable {0} is not initialized")]
    Uninitialized(Id),
    #[error("{0} is not bound")]
    Unbound(&'static str),
    #[error("program {0} has not been started")]
    NotStarted(Id),
    #[error("program {0} is not declared")]
    ProgramUndefined(Id),
}

/// Coarse classification of a fault so that a host can react differently
/// to limits of a type and to other failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultClass {
    Overflow,
    Underflow,
    Incompatible,
    Failure,
}

impl Fault {
    pub fn class(&self) -> FaultClass {
        match self {
            Fault::Value(ValueError::Overflow) => FaultClass::Overflow,
            Fault::Value(ValueError::Underflow) => FaultClass::Underflow,
            Fault::Value(ValueError::Incompatible) => FaultClass::Incompatible,
            _ => FaultClass::Failure,
        }
    }

    fn problem(&self) -> Problem {
        match self.class() {
            FaultClass::Overflow => Problem::RuntimeOverflow,
            FaultClass::Underflow => Problem::RuntimeUnderflow,
            FaultClass::Incompatible => Problem::RuntimeIncompatible,
            FaultClass::Failure => Problem::RuntimeFailure,
        }
    }
}

/// Context for a fault that aborted a cycle.
#[derive(Clone, Debug, Error)]
#[error("{fault} in program {program}")]
pub struct FaultContext {
    pub fault: Fault,
    pub program: Id,
    /// The location of the unit that was executing when the fault occurred.
    pub span: Option<SourceSpan>,
}

impl FaultContext {
    /// Converts the fault into the issue list that a host displays.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let span = self.span.clone().unwrap_or_else(|| self.program.span());
        vec![Diagnostic::problem(
            self.fault.problem(),
            Label::span(span, self.fault.to_string()),
        )
        .with_context_id("program", &self.program)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Fault::Value(ValueError::Overflow), FaultClass::Overflow)]
    #[case(Fault::Value(ValueError::Underflow), FaultClass::Underflow)]
    #[case(Fault::Value(ValueError::Incompatible), FaultClass::Incompatible)]
    #[case(Fault::Value(ValueError::DivisionByZero), FaultClass::Failure)]
    #[case(Fault::StepBudgetExceeded(10), FaultClass::Failure)]
    fn class_when_fault_then_expected_class(#[case] fault: Fault, #[case] expected: FaultClass) {
        assert_eq!(expected, fault.class());
    }

    #[test]
    fn diagnostics_when_overflow_then_runtime_overflow_code() {
        let context = FaultContext {
            fault: Fault::Value(ValueError::Overflow),
            program: Id::from("Main"),
            span: Some(SourceSpan::range(4, 9)),
        };
        let diagnostics = context.diagnostics();
        assert_eq!(1, diagnostics.len());
        assert_eq!("R0001", diagnostics[0].code);
        assert_eq!(4, diagnostics[0].primary.span.start);
    }
}
