use std::cmp::Ordering;

use stint_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
    textual::{CompareOp, Operator, UnaryOp},
};
use stint_problems::Problem;

use crate::datatypes::{bool_type, BoolValue, IntegerValue, TypeRef};
use crate::error::{Fault, ValueError};
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, VerifyScope};
use crate::value::{Value, ValueClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Arithmetic(Operator),
    Compare(CompareOp),
}

impl BinaryOperator {
    fn is_logical(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Compare(CompareOp::And | CompareOp::Or | CompareOp::Xor)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TermState {
    Start,
    Left,
    Right,
    Done,
}

/// An operator with two operands. Operands are evaluated left to right.
#[derive(Clone, Debug)]
pub struct BinaryTerm {
    pub op: BinaryOperator,
    pub left: UnitId,
    pub right: UnitId,
    state: TermState,
    result: Option<Box<dyn Value>>,
}

impl BinaryTerm {
    pub fn new(op: BinaryOperator, left: UnitId, right: UnitId) -> Self {
        Self {
            op,
            left,
            right,
            state: TermState::Start,
            result: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = TermState::Start;
    }

    pub fn value(&self) -> Result<&dyn Value, Fault> {
        self.result.as_deref().ok_or(Fault::Unbound("expression result"))
    }

    /// The type of the result. Arithmetic with a real operand is real and
    /// otherwise has the type of the left operand.
    pub fn result_type(&self, machine: &Machine) -> Option<TypeRef> {
        match self.op {
            BinaryOperator::Compare(_) if !self.is_bitwise(machine) => Some(bool_type()),
            BinaryOperator::Compare(_) => machine.data_type(self.left),
            BinaryOperator::Arithmetic(_) => {
                let left = machine.data_type(self.left)?;
                let right = machine.data_type(self.right)?;
                if left.class() != ValueClass::Real && right.class() == ValueClass::Real {
                    Some(right)
                } else {
                    Some(left)
                }
            }
        }
    }

    /// Logical operators on integers act on each bit.
    fn is_bitwise(&self, machine: &Machine) -> bool {
        self.op.is_logical()
            && machine
                .data_type(self.left)
                .is_some_and(|data_type| data_type.class() == ValueClass::Integer)
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                TermState::Start => {
                    self.state = TermState::Left;
                    if ctx.needs_stepping(self.left) {
                        return ctx.enter(self.left);
                    }
                }
                TermState::Left => {
                    self.state = TermState::Right;
                    if ctx.needs_stepping(self.right) {
                        return ctx.enter(self.right);
                    }
                }
                TermState::Right => {
                    self.evaluate(ctx.machine)?;
                    self.state = TermState::Done;
                    return Ok(StepResult::Finished);
                }
                TermState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    fn evaluate(&mut self, machine: &Machine) -> Result<(), Fault> {
        let left = machine.operand(self.left)?;
        let right = machine.operand(self.right)?;
        let result = self
            .result
            .as_mut()
            .ok_or(Fault::Unbound("expression result"))?;
        match self.op {
            BinaryOperator::Arithmetic(op) => {
                result.assign(left)?;
                result.apply(op, right)?;
            }
            BinaryOperator::Compare(op) => {
                if let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) {
                    if let Some(value) = logical(op, a, b) {
                        result.assign(&BoolValue(value))?;
                        return Ok(());
                    }
                }
                if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
                    if let Some(value) = bitwise(op, a, b) {
                        result.assign(&IntegerValue::literal(value)?)?;
                        return Ok(());
                    }
                }
                let value = match op {
                    CompareOp::Eq => left.equals(right)?,
                    CompareOp::Ne => !left.equals(right)?,
                    CompareOp::Lt => left.compare(right)? == Ordering::Less,
                    CompareOp::Gt => left.compare(right)? == Ordering::Greater,
                    CompareOp::LtEq => left.compare(right)? != Ordering::Greater,
                    CompareOp::GtEq => left.compare(right)? != Ordering::Less,
                    CompareOp::And | CompareOp::Or | CompareOp::Xor => {
                        return Err(Fault::Value(ValueError::Incompatible))
                    }
                };
                result.assign(&BoolValue(value))?;
            }
        }
        Ok(())
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        machine.verify(self.left, scope)?;
        machine.verify(self.right, scope)?;
        let (Some(left), Some(right)) = (machine.data_type(self.left), machine.data_type(self.right))
        else {
            return Err(Diagnostic::internal_error(file!(), line!()));
        };
        let supported = match self.op {
            BinaryOperator::Arithmetic(Operator::Mod) => {
                left.class() == ValueClass::Integer && right.class() == ValueClass::Integer
            }
            BinaryOperator::Arithmetic(_) => {
                matches!(
                    left.class(),
                    ValueClass::Integer | ValueClass::Real | ValueClass::Time | ValueClass::DateTime
                ) && matches!(
                    right.class(),
                    ValueClass::Integer | ValueClass::Real | ValueClass::Time
                )
            }
            BinaryOperator::Compare(CompareOp::And | CompareOp::Or | CompareOp::Xor) => {
                left.class() == right.class()
                    && matches!(left.class(), ValueClass::Bool | ValueClass::Integer)
            }
            BinaryOperator::Compare(CompareOp::Eq | CompareOp::Ne) => {
                left.is_compatible(right.as_ref()) || right.is_compatible(left.as_ref())
            }
            BinaryOperator::Compare(_) => {
                (left.is_compatible(right.as_ref()) || right.is_compatible(left.as_ref()))
                    && !matches!(
                        left.class(),
                        ValueClass::Bool | ValueClass::Array | ValueClass::Structure
                    )
            }
        };
        if !supported {
            return Err(Diagnostic::problem(
                Problem::OperatorNotSupported,
                Label::span(span.clone(), "Expression"),
            )
            .with_context("left", &left.name().to_string())
            .with_context("right", &right.name().to_string()));
        }
        Ok(())
    }

    pub(crate) fn allocate(&mut self, machine: &Machine, span: &SourceSpan) -> Result<(), Diagnostic> {
        let data_type = self.result_type(machine).ok_or_else(|| {
            Diagnostic::problem(
                Problem::OperatorNotSupported,
                Label::span(span.clone(), "Expression"),
            )
        })?;
        self.result = Some(data_type.create_value());
        Ok(())
    }
}

fn logical(op: CompareOp, a: bool, b: bool) -> Option<bool> {
    match op {
        CompareOp::And => Some(a && b),
        CompareOp::Or => Some(a || b),
        CompareOp::Xor => Some(a ^ b),
        _ => None,
    }
}

fn bitwise(op: CompareOp, a: i128, b: i128) -> Option<i128> {
    match op {
        CompareOp::And => Some(a & b),
        CompareOp::Or => Some(a | b),
        CompareOp::Xor => Some(a ^ b),
        _ => None,
    }
}

/// An operator with one operand.
#[derive(Clone, Debug)]
pub struct UnaryTerm {
    pub op: UnaryOp,
    pub term: UnitId,
    state: TermState,
    result: Option<Box<dyn Value>>,
}

impl UnaryTerm {
    pub fn new(op: UnaryOp, term: UnitId) -> Self {
        Self {
            op,
            term,
            state: TermState::Start,
            result: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = TermState::Start;
    }

    pub fn value(&self) -> Result<&dyn Value, Fault> {
        self.result.as_deref().ok_or(Fault::Unbound("expression result"))
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                TermState::Start => {
                    self.state = TermState::Right;
                    if ctx.needs_stepping(self.term) {
                        return ctx.enter(self.term);
                    }
                }
                TermState::Left | TermState::Right => {
                    let operand = ctx.operand(self.term)?;
                    let result = self
                        .result
                        .as_mut()
                        .ok_or(Fault::Unbound("expression result"))?;
                    result.assign(operand)?;
                    match self.op {
                        UnaryOp::Neg => result.negate()?,
                        UnaryOp::Not => result.complement()?,
                    }
                    self.state = TermState::Done;
                    return Ok(StepResult::Finished);
                }
                TermState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        machine.verify(self.term, scope)?;
        let data_type = machine
            .data_type(self.term)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        let supported = match self.op {
            UnaryOp::Neg => matches!(
                data_type.class(),
                ValueClass::Integer | ValueClass::Real | ValueClass::Time
            ),
            UnaryOp::Not => data_type.class() == ValueClass::Bool,
        };
        if !supported {
            return Err(Diagnostic::problem(
                Problem::OperatorNotSupported,
                Label::span(span.clone(), "Expression"),
            )
            .with_context("operand", &data_type.name().to_string()));
        }
        Ok(())
    }

    pub(crate) fn allocate(&mut self, machine: &Machine, span: &SourceSpan) -> Result<(), Diagnostic> {
        let data_type = machine.data_type(self.term).ok_or_else(|| {
            Diagnostic::problem(
                Problem::OperatorNotSupported,
                Label::span(span.clone(), "Expression"),
            )
        })?;
        self.result = Some(data_type.create_value());
        Ok(())
    }
}
