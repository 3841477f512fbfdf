//! Statement units.
//!
//! Each statement steps its children through the cursor and keeps the
//! position within the statement so that execution can stop after any
//! step and resume later.
mod assignment;
mod case;
mod conditional;
mod iteration;
mod list;

pub use assignment::Assignment;
pub use case::{Case, CaseGroup, CaseValue};
pub use conditional::{Branch, Conditional};
pub use iteration::{ForLoop, RepeatLoop, WhileLoop};
pub use list::StatementList;

use stint_dsl::diagnostic::{Diagnostic, Label};
use stint_problems::Problem;

use crate::error::{Fault, ValueError};
use crate::machine::{Machine, StepContext};
use crate::unit::{UnitId, VerifyScope};
use crate::value::ValueClass;

/// Verifies a condition expression and checks that it is boolean.
fn verify_condition(
    machine: &Machine,
    condition: UnitId,
    scope: &mut VerifyScope,
) -> Result<(), Diagnostic> {
    machine.verify(condition, scope)?;
    let is_bool = machine
        .data_type(condition)
        .is_some_and(|data_type| data_type.class() == ValueClass::Bool);
    if !is_bool {
        let span = machine.units.span(condition).unwrap_or_default();
        return Err(Diagnostic::problem(
            Problem::ConditionNotBoolean,
            Label::span(span, "Condition"),
        ));
    }
    Ok(())
}

/// Verifies a body with one more enclosing loop.
fn verify_loop_body(
    machine: &Machine,
    body: UnitId,
    scope: &mut VerifyScope,
) -> Result<(), Diagnostic> {
    scope.loop_depth += 1;
    let result = machine.verify(body, scope);
    scope.loop_depth -= 1;
    result
}

/// Reads the value of a condition that has been evaluated.
fn condition(ctx: &StepContext<'_>, id: UnitId) -> Result<bool, Fault> {
    ctx.operand(id)?
        .as_bool()
        .ok_or(Fault::Value(ValueError::Incompatible))
}
