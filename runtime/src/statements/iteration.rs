use stint_dsl::diagnostic::{Diagnostic, Label};
use stint_problems::Problem;

use crate::datatypes::IntegerValue;
use crate::error::{Fault, ValueError};
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, VerifyScope};
use crate::value::ValueClass;

use super::{condition, verify_condition, verify_loop_body};

fn integer(ctx: &StepContext<'_>, id: UnitId) -> Result<i128, Fault> {
    ctx.operand(id)?
        .as_integer()
        .ok_or(Fault::Value(ValueError::Incompatible))
}

fn verify_integer(
    machine: &Machine,
    id: UnitId,
    problem: Problem,
    scope: &mut VerifyScope,
) -> Result<(), Diagnostic> {
    machine.verify(id, scope)?;
    let is_integer = machine
        .data_type(id)
        .is_some_and(|data_type| data_type.class() == ValueClass::Integer);
    if !is_integer {
        let span = machine.units.span(id).unwrap_or_default();
        return Err(Diagnostic::problem(problem, Label::span(span, "Expression")));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ForState {
    Start,
    From,
    To,
    By,
    Test,
    Body,
    Exited,
    Done,
}

/// `FOR control := from TO to BY by DO body END_FOR`. The end and the
/// increment are evaluated once before the first test.
#[derive(Clone, Debug)]
pub struct ForLoop {
    pub control: UnitId,
    pub from: UnitId,
    pub to: UnitId,
    pub by: Option<UnitId>,
    pub body: UnitId,
    state: ForState,
    end: i128,
    increment: i128,
}

impl ForLoop {
    pub fn new(control: UnitId, from: UnitId, to: UnitId, by: Option<UnitId>, body: UnitId) -> Self {
        Self {
            control,
            from,
            to,
            by,
            body,
            state: ForState::Start,
            end: 0,
            increment: 1,
        }
    }

    pub fn reset(&mut self) {
        self.state = ForState::Start;
    }

    pub fn mark_exited(&mut self) {
        self.state = ForState::Exited;
    }

    fn set_control(&self, ctx: &mut StepContext<'_>, value: i128) -> Result<(), Fault> {
        ctx.store(self.control, &IntegerValue::literal(value)?)
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                ForState::Start => {
                    ctx.cursor.push_exit_context(ctx.id);
                    self.state = ForState::From;
                    if ctx.needs_stepping(self.from) {
                        return ctx.enter(self.from);
                    }
                }
                ForState::From => {
                    let start = integer(ctx, self.from)?;
                    self.set_control(ctx, start)?;
                    self.state = ForState::To;
                    if ctx.needs_stepping(self.to) {
                        return ctx.enter(self.to);
                    }
                }
                ForState::To => {
                    self.end = integer(ctx, self.to)?;
                    self.state = ForState::By;
                    if let Some(by) = self.by.filter(|by| ctx.needs_stepping(*by)) {
                        return ctx.enter(by);
                    }
                }
                ForState::By => {
                    self.increment = match self.by {
                        Some(by) => integer(ctx, by)?,
                        None => 1,
                    };
                    self.state = ForState::Test;
                }
                ForState::Test => {
                    let control = integer(ctx, self.control)?;
                    let more = if self.increment >= 0 {
                        control <= self.end
                    } else {
                        control >= self.end
                    };
                    if more {
                        self.state = ForState::Body;
                        return ctx.enter(self.body);
                    }
                    ctx.cursor.pop_exit_context()?;
                    self.state = ForState::Done;
                    return Ok(StepResult::Finished);
                }
                ForState::Body => {
                    let next = integer(ctx, self.control)?
                        .checked_add(self.increment)
                        .ok_or(Fault::Value(ValueError::Overflow))?;
                    self.set_control(ctx, next)?;
                    self.state = ForState::Test;
                }
                ForState::Exited => {
                    ctx.cursor.pop_exit_context()?;
                    self.state = ForState::Done;
                    return Ok(StepResult::Finished);
                }
                ForState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    pub fn verify(&self, machine: &Machine, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        verify_integer(machine, self.control, Problem::ForControlNotInteger, scope)?;
        if !machine.is_variable(self.control) {
            let span = machine.units.span(self.control).unwrap_or_default();
            return Err(Diagnostic::problem(
                Problem::ForControlNotInteger,
                Label::span(span, "Control variable"),
            ));
        }
        verify_integer(machine, self.from, Problem::ValueNotCompatible, scope)?;
        verify_integer(machine, self.to, Problem::ValueNotCompatible, scope)?;
        if let Some(by) = self.by {
            verify_integer(machine, by, Problem::ValueNotCompatible, scope)?;
        }
        verify_loop_body(machine, self.body, scope)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WhileState {
    Start,
    Evaluate,
    Test,
    Exited,
    Done,
}

/// `WHILE condition DO body END_WHILE`.
#[derive(Clone, Debug)]
pub struct WhileLoop {
    pub condition: UnitId,
    pub body: UnitId,
    state: WhileState,
}

impl WhileLoop {
    pub fn new(condition: UnitId, body: UnitId) -> Self {
        Self {
            condition,
            body,
            state: WhileState::Start,
        }
    }

    pub fn reset(&mut self) {
        self.state = WhileState::Start;
    }

    pub fn mark_exited(&mut self) {
        self.state = WhileState::Exited;
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                WhileState::Start => {
                    ctx.cursor.push_exit_context(ctx.id);
                    self.state = WhileState::Evaluate;
                }
                WhileState::Evaluate => {
                    self.state = WhileState::Test;
                    if ctx.needs_stepping(self.condition) {
                        return ctx.enter(self.condition);
                    }
                }
                WhileState::Test => {
                    if condition(ctx, self.condition)? {
                        self.state = WhileState::Evaluate;
                        return ctx.enter(self.body);
                    }
                    ctx.cursor.pop_exit_context()?;
                    self.state = WhileState::Done;
                    return Ok(StepResult::Finished);
                }
                WhileState::Exited => {
                    ctx.cursor.pop_exit_context()?;
                    self.state = WhileState::Done;
                    return Ok(StepResult::Finished);
                }
                WhileState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    pub fn verify(&self, machine: &Machine, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        verify_condition(machine, self.condition, scope)?;
        verify_loop_body(machine, self.body, scope)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RepeatState {
    Start,
    Body,
    Test,
    Exited,
    Done,
}

/// `REPEAT body UNTIL condition END_REPEAT`. The body runs at least once.
#[derive(Clone, Debug)]
pub struct RepeatLoop {
    pub body: UnitId,
    pub until: UnitId,
    state: RepeatState,
}

impl RepeatLoop {
    pub fn new(body: UnitId, until: UnitId) -> Self {
        Self {
            body,
            until,
            state: RepeatState::Start,
        }
    }

    pub fn reset(&mut self) {
        self.state = RepeatState::Start;
    }

    pub fn mark_exited(&mut self) {
        self.state = RepeatState::Exited;
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                RepeatState::Start => {
                    ctx.cursor.push_exit_context(ctx.id);
                    self.state = RepeatState::Body;
                    return ctx.enter(self.body);
                }
                RepeatState::Body => {
                    self.state = RepeatState::Test;
                    if ctx.needs_stepping(self.until) {
                        return ctx.enter(self.until);
                    }
                }
                RepeatState::Test => {
                    if condition(ctx, self.until)? {
                        ctx.cursor.pop_exit_context()?;
                        self.state = RepeatState::Done;
                        return Ok(StepResult::Finished);
                    }
                    self.state = RepeatState::Body;
                    return ctx.enter(self.body);
                }
                RepeatState::Exited => {
                    ctx.cursor.pop_exit_context()?;
                    self.state = RepeatState::Done;
                    return Ok(StepResult::Finished);
                }
                RepeatState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    pub fn verify(&self, machine: &Machine, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        verify_loop_body(machine, self.body, scope)?;
        verify_condition(machine, self.until, scope)
    }
}
