//! Invocation of functions and programs.
//!
//! An invocation evaluates the input arguments into temporaries, copies
//! them to the input variables of the callee, runs the body of the
//! callee and then copies the outputs back to the caller.
use std::collections::HashMap;

use stint_dsl::{
    common::VariableClass,
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::datatypes::TypeRef;
use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::memory::VarId;
use crate::pou::PouId;
use crate::unit::{StepResult, UnitId, VerifyScope};
use crate::value::Value;

/// A parameter as written at the call site.
#[derive(Clone, Debug)]
pub enum Param {
    Positional(UnitId),
    Named { name: Id, expr: UnitId },
    /// `name => target`
    Output { name: Id, target: UnitId },
}

impl Param {
    pub fn unit(&self) -> UnitId {
        match self {
            Param::Positional(expr) | Param::Named { expr, .. } => *expr,
            Param::Output { target, .. } => *target,
        }
    }

    fn unit_mut(&mut self) -> &mut UnitId {
        match self {
            Param::Positional(expr) | Param::Named { expr, .. } => expr,
            Param::Output { target, .. } => target,
        }
    }
}

/// Connects a variable of the callee with the parameter at `source`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub param: VarId,
    pub source: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InvocationState {
    Start,
    Argument(usize),
    AwaitArgument(usize),
    AwaitBody,
    Done,
}

#[derive(Clone, Debug)]
pub struct Invocation {
    pub name: Id,
    pub params: Vec<Param>,
    pub target: Option<PouId>,
    pub inputs: Vec<Binding>,
    pub outputs: Vec<Binding>,
    args: Vec<Box<dyn Value>>,
    result: Option<Box<dyn Value>>,
    state: InvocationState,
}

impl Invocation {
    pub fn new(name: Id, params: Vec<Param>) -> Self {
        Self {
            name,
            params,
            target: None,
            inputs: vec![],
            outputs: vec![],
            args: vec![],
            result: None,
            state: InvocationState::Start,
        }
    }

    /// The invocation that a program of record runs each cycle.
    pub fn root(name: Id, target: PouId) -> Self {
        let mut invocation = Self::new(name, vec![]);
        invocation.target = Some(target);
        invocation
    }

    pub fn reset(&mut self) {
        self.state = InvocationState::Start;
    }

    /// Returns true while the body of the target is executing.
    pub(crate) fn is_called(&self) -> bool {
        self.state == InvocationState::AwaitBody
    }

    /// Invokes a copy of the target instead. The map gives the variable
    /// of the copy for each variable of the current target.
    pub(crate) fn retarget(&mut self, target: PouId, variables: &HashMap<VarId, VarId>) {
        self.target = Some(target);
        for binding in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            if let Some(param) = variables.get(&binding.param) {
                binding.param = *param;
            }
        }
    }

    pub(crate) fn units(&self) -> Vec<UnitId> {
        self.params.iter().map(Param::unit).collect()
    }

    pub(crate) fn units_mut(&mut self) -> Vec<&mut UnitId> {
        self.params.iter_mut().map(Param::unit_mut).collect()
    }

    pub fn value(&self) -> Result<&dyn Value, Fault> {
        self.result.as_deref().ok_or(Fault::Unbound("function result"))
    }

    pub fn result_type(&self, machine: &Machine) -> Option<TypeRef> {
        let pou = machine.pou(self.target?)?;
        machine.memory.get(pou.result?)?.data_type.clone()
    }

    fn input_expr(&self, index: usize) -> Option<UnitId> {
        let binding = self.inputs.get(index)?;
        self.params.get(binding.source).map(Param::unit)
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                InvocationState::Start => {
                    ctx.cursor.push_return_context(ctx.id);
                    self.state = InvocationState::Argument(0);
                }
                InvocationState::Argument(index) => {
                    let Some(expr) = self.input_expr(index) else {
                        return self.call(ctx);
                    };
                    self.state = InvocationState::AwaitArgument(index);
                    if ctx.needs_stepping(expr) {
                        return ctx.enter(expr);
                    }
                }
                InvocationState::AwaitArgument(index) => {
                    let expr = self.input_expr(index).ok_or(Fault::Unbound("argument"))?;
                    let arg = self
                        .args
                        .get_mut(index)
                        .ok_or(Fault::Unbound("argument"))?;
                    arg.assign(ctx.operand(expr)?)?;
                    self.state = InvocationState::Argument(index + 1);
                }
                InvocationState::AwaitBody => {
                    ctx.cursor.pop_return_context()?;
                    self.complete(ctx.machine)?;
                    self.state = InvocationState::Done;
                    return Ok(StepResult::Finished);
                }
                InvocationState::Done => return Ok(StepResult::Finished),
            }
        }
    }

    /// Prepares the variables of the callee and enters the body.
    fn call(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        let target = self.target.ok_or(Fault::Unbound("invocation target"))?;
        let Machine {
            pous, memory, busy, ..
        } = &mut *ctx.machine;
        let pou = pous
            .get(target.index())
            .ok_or(Fault::Unbound("invocation target"))?;
        if !busy.insert(target) {
            return Err(Fault::Busy(pou.name.clone()));
        }

        // Functions start from the initial values on every call. Programs
        // keep their state except for temporaries.
        for var in &pou.variables {
            let reset = pou.is_function()
                || memory
                    .get(*var)
                    .is_some_and(|variable| variable.class == VariableClass::Temp);
            if reset {
                memory.reset(*var)?;
            }
        }
        for (binding, arg) in self.inputs.iter().zip(&self.args) {
            memory.value_mut(binding.param)?.assign(arg.as_ref())?;
        }

        let body = pou.body.ok_or(Fault::Unbound("body"))?;
        self.state = InvocationState::AwaitBody;
        ctx.enter(body)
    }

    /// Copies the result and the outputs back to the caller.
    fn complete(&mut self, machine: &mut Machine) -> Result<(), Fault> {
        let target = self.target.ok_or(Fault::Unbound("invocation target"))?;
        let result_var = machine.pou(target).and_then(|pou| pou.result);
        if let (Some(result), Some(var)) = (self.result.as_mut(), result_var) {
            result.assign(machine.memory.value(var)?)?;
        }
        for binding in &self.outputs {
            let unit = self
                .params
                .get(binding.source)
                .map(Param::unit)
                .ok_or(Fault::Unbound("output"))?;
            let value = machine.memory.value(binding.param)?.clone_value();
            let place = machine.place(unit)?;
            machine.memory.resolve_mut(&place)?.assign(value.as_ref())?;
        }
        machine.busy.remove(&target);
        Ok(())
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        if self.target.is_none() {
            return Err(Diagnostic::problem(
                Problem::NotCallable,
                Label::span(span.clone(), "Invocation"),
            )
            .with_context_id("name", &self.name));
        }
        for param in &self.params {
            machine.verify(param.unit(), scope)?;
        }

        for binding in &self.inputs {
            let expr = self.params[binding.source].unit();
            let param_type = variable_type(machine, binding.param)?;
            let expr_type = machine
                .data_type(expr)
                .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
            if !param_type.is_compatible(expr_type.as_ref()) {
                return Err(mismatch(machine, expr, span, &expr_type, &param_type));
            }
        }

        for binding in &self.outputs {
            let target = self.params[binding.source].unit();
            if !machine.is_variable(target) {
                let target_span = machine.units.span(target).unwrap_or_else(|| span.clone());
                return Err(Diagnostic::problem(
                    Problem::AssignmentTargetNotVariable,
                    Label::span(target_span, "Output target"),
                ));
            }
            let param_type = variable_type(machine, binding.param)?;
            let target_type = machine
                .data_type(target)
                .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
            if !target_type.is_compatible(param_type.as_ref()) {
                return Err(mismatch(machine, target, span, &param_type, &target_type));
            }
        }
        Ok(())
    }

    /// Checks that the invocation produces a value.
    pub fn verify_value(&self, machine: &Machine, span: &SourceSpan) -> Result<(), Diagnostic> {
        let is_function = self
            .target
            .and_then(|target| machine.pou(target))
            .is_some_and(|pou| pou.is_function());
        if !is_function {
            return Err(Diagnostic::problem(
                Problem::PouNotValue,
                Label::span(span.clone(), "Invocation"),
            )
            .with_context_id("name", &self.name));
        }
        Ok(())
    }

    pub(crate) fn allocate(&mut self, machine: &Machine, span: &SourceSpan) -> Result<(), Diagnostic> {
        if self.target.is_none() {
            return Err(Diagnostic::problem(
                Problem::NotCallable,
                Label::span(span.clone(), "Invocation"),
            )
            .with_context_id("name", &self.name));
        }
        self.args = self
            .inputs
            .iter()
            .map(|binding| Ok(variable_type(machine, binding.param)?.create_value()))
            .collect::<Result<Vec<_>, Diagnostic>>()?;
        self.result = self
            .result_type(machine)
            .map(|data_type| data_type.create_value());
        Ok(())
    }
}

fn variable_type(machine: &Machine, var: VarId) -> Result<TypeRef, Diagnostic> {
    machine
        .memory
        .get(var)
        .and_then(|variable| variable.data_type.clone())
        .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))
}

fn mismatch(
    machine: &Machine,
    unit: UnitId,
    span: &SourceSpan,
    source: &TypeRef,
    target: &TypeRef,
) -> Diagnostic {
    let unit_span = machine.units.span(unit).unwrap_or_else(|| span.clone());
    Diagnostic::problem(
        Problem::ValueNotCompatible,
        Label::span(unit_span, format!("Value of type {}", source.name())),
    )
    .with_context("expected", &target.name().to_string())
}
