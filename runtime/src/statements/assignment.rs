use stint_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, VerifyScope};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AssignmentState {
    Start,
    Target,
    Value,
}

/// Assigns the value of an expression to a variable. The value is
/// converted to the target type in a temporary before the variable
/// changes so that a failed conversion leaves the variable unchanged.
#[derive(Clone, Debug)]
pub struct Assignment {
    pub target: UnitId,
    pub value: UnitId,
    state: AssignmentState,
    temp: Option<Box<dyn Value>>,
}

impl Assignment {
    pub fn new(target: UnitId, value: UnitId) -> Self {
        Self {
            target,
            value,
            state: AssignmentState::Start,
            temp: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = AssignmentState::Start;
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                AssignmentState::Start => {
                    self.state = AssignmentState::Target;
                    if ctx.needs_stepping(self.target) {
                        return ctx.enter(self.target);
                    }
                }
                AssignmentState::Target => {
                    self.state = AssignmentState::Value;
                    if ctx.needs_stepping(self.value) {
                        return ctx.enter(self.value);
                    }
                }
                AssignmentState::Value => {
                    let temp = self.temp.as_mut().ok_or(Fault::Unbound("assignment"))?;
                    temp.assign(ctx.operand(self.value)?)?;
                    ctx.store(self.target, temp.as_ref())?;
                    return Ok(StepResult::Finished);
                }
            }
        }
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        machine.verify(self.target, scope)?;
        machine.verify(self.value, scope)?;

        let target_span = machine.units.span(self.target).unwrap_or_else(|| span.clone());
        if !machine.is_variable(self.target) {
            return Err(Diagnostic::problem(
                Problem::AssignmentTargetNotVariable,
                Label::span(target_span, "Assignment target"),
            ));
        }

        let (Some(target_type), Some(value_type)) =
            (machine.data_type(self.target), machine.data_type(self.value))
        else {
            return Err(Diagnostic::internal_error(file!(), line!()));
        };
        if !target_type.is_compatible(value_type.as_ref()) {
            let value_span = machine.units.span(self.value).unwrap_or_else(|| span.clone());
            return Err(Diagnostic::problem(
                Problem::ValueNotCompatible,
                Label::span(value_span, format!("Value of type {}", value_type.name())),
            )
            .with_secondary(Label::span(
                target_span,
                format!("Target of type {}", target_type.name()),
            )));
        }
        Ok(())
    }

    pub(crate) fn allocate(&mut self, machine: &Machine, span: &SourceSpan) -> Result<(), Diagnostic> {
        let data_type = machine.data_type(self.target).ok_or_else(|| {
            Diagnostic::problem(
                Problem::AssignmentTargetNotVariable,
                Label::span(span.clone(), "Assignment"),
            )
        })?;
        self.temp = Some(data_type.create_value());
        Ok(())
    }
}
