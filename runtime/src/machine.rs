//! The state shared by every program of record: the unit arena, the
//! variables and the program organization units.
use std::collections::{HashMap, HashSet};

use stint_dsl::diagnostic::{Diagnostic, Label};
use stint_problems::Problem;

use crate::config::RuntimeConfig;
use crate::cursor::Cursor;
use crate::datatypes::TypeRef;
use crate::error::{Fault, ValueError};
use crate::expressions::Access;
use crate::memory::{Memory, Place, VarId};
use crate::pou::{Pou, PouId};
use crate::unit::{StepResult, UnitId, UnitKind, Units, VerifyScope};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Machine {
    pub units: Units,
    pub memory: Memory,
    pub pous: Vec<Pou>,
    /// The units that are executing. A unit cannot be invoked again until
    /// it returns.
    pub busy: HashSet<PouId>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pou(&mut self, pou: Pou) -> PouId {
        self.pous.push(pou);
        PouId::new(self.pous.len() - 1)
    }

    pub fn pou(&self, id: PouId) -> Option<&Pou> {
        self.pous.get(id.index())
    }

    pub fn pou_mut(&mut self, id: PouId) -> Option<&mut Pou> {
        self.pous.get_mut(id.index())
    }

    /// Returns false when the value of the unit is available without
    /// stepping the unit.
    pub fn needs_stepping(&self, id: UnitId) -> bool {
        let Some(unit) = self.units.get(id) else {
            return true;
        };
        match &unit.kind {
            UnitKind::Literal(_) | UnitKind::Identifier(_) | UnitKind::EnumConstant(_) => false,
            UnitKind::Qualified(qualified) => qualified
                .subscripts()
                .any(|subscript| self.needs_stepping(subscript)),
            _ => true,
        }
    }

    /// Returns the value of an expression unit. Units that need stepping
    /// have their value once they finish.
    pub fn operand(&self, id: UnitId) -> Result<&dyn Value, Fault> {
        let unit = self.units.get(id).ok_or(Fault::UnitUnavailable(id))?;
        match &unit.kind {
            UnitKind::Literal(literal) => Ok(literal.value.as_ref()),
            UnitKind::EnumConstant(constant) => Ok(constant.value.as_ref()),
            UnitKind::Identifier(identifier) => {
                let var = identifier.var.ok_or(Fault::Unbound("variable"))?;
                self.memory.value(var)
            }
            UnitKind::Qualified(_) => {
                let place = self.place(id)?;
                self.memory.resolve(&place)
            }
            UnitKind::Binary(term) => term.value(),
            UnitKind::Unary(term) => term.value(),
            UnitKind::Call(invocation) => invocation.value(),
            _ => Err(Fault::Unbound("operand")),
        }
    }

    /// Returns the storage that a variable expression designates.
    /// Subscripts of the expression must have their value.
    pub fn place(&self, id: UnitId) -> Result<Place, Fault> {
        let unit = self.units.get(id).ok_or(Fault::UnitUnavailable(id))?;
        match &unit.kind {
            UnitKind::Identifier(identifier) => {
                let var = identifier.var.ok_or(Fault::Unbound("variable"))?;
                Ok(Place::variable(var))
            }
            UnitKind::Qualified(qualified) => {
                let var = qualified.var.ok_or(Fault::Unbound("variable"))?;
                let mut path = Vec::with_capacity(qualified.accesses.len());
                for access in &qualified.accesses {
                    match access {
                        Access::Child(index) => path.push(*index),
                        Access::Element { array, link } => {
                            let subscripts = qualified
                                .link_subscripts(*link)
                                .iter()
                                .map(|subscript| {
                                    self.operand(*subscript)?
                                        .as_integer()
                                        .ok_or(Fault::Value(ValueError::Incompatible))
                                })
                                .collect::<Result<Vec<_>, _>>()?;
                            path.push(array.element_index(&subscripts)?);
                        }
                    }
                }
                Ok(Place { var, path })
            }
            _ => Err(Fault::Unbound("place")),
        }
    }

    /// Returns the static type of an expression unit.
    pub fn data_type(&self, id: UnitId) -> Option<TypeRef> {
        let unit = self.units.get(id)?;
        match &unit.kind {
            UnitKind::Literal(literal) => Some(literal.data_type.clone()),
            UnitKind::EnumConstant(constant) => Some(constant.data_type.clone()),
            UnitKind::Identifier(identifier) => self
                .memory
                .get(identifier.var?)
                .and_then(|variable| variable.data_type.clone()),
            UnitKind::Qualified(qualified) => qualified.data_type.clone(),
            UnitKind::Binary(term) => term.result_type(self),
            UnitKind::Unary(term) => self.data_type(term.term),
            UnitKind::Call(invocation) => invocation.result_type(self),
            _ => None,
        }
    }

    /// Returns true if the unit designates storage that can be written.
    pub fn is_variable(&self, id: UnitId) -> bool {
        self.units.get(id).is_some_and(|unit| match &unit.kind {
            UnitKind::Identifier(identifier) => identifier.var.is_some(),
            UnitKind::Qualified(qualified) => qualified.var.is_some(),
            _ => false,
        })
    }

    /// Steps the unit once. The unit is out of the arena while it steps.
    pub(crate) fn step_unit(
        &mut self,
        cursor: &mut Cursor,
        id: UnitId,
        config: &RuntimeConfig,
    ) -> Result<StepResult, Fault> {
        let mut unit = self.units.take(id)?;
        let result = {
            let mut ctx = StepContext {
                machine: self,
                cursor,
                id,
                config,
            };
            unit.kind.step(&mut ctx)
        };
        self.units.restore(id, unit);
        result
    }

    /// Checks the unit and every unit below it before execution.
    pub fn verify(&self, id: UnitId, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        let unit = self
            .units
            .get(id)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        let span = &unit.span;
        match &unit.kind {
            UnitKind::StatementList(list) => list.verify(self, scope),
            UnitKind::Assignment(stmt) => stmt.verify(self, span, scope),
            UnitKind::Conditional(stmt) => stmt.verify(self, scope),
            UnitKind::Case(stmt) => stmt.verify(self, span, scope),
            UnitKind::For(stmt) => stmt.verify(self, scope),
            UnitKind::While(stmt) => stmt.verify(self, scope),
            UnitKind::Repeat(stmt) => stmt.verify(self, scope),
            UnitKind::Invoke(invocation) => invocation.verify(self, span, scope),
            UnitKind::Call(invocation) => {
                invocation.verify(self, span, scope)?;
                invocation.verify_value(self, span)
            }
            UnitKind::Exit => {
                if scope.loop_depth == 0 {
                    return Err(Diagnostic::problem(
                        Problem::ExitOutsideLoop,
                        Label::span(span.clone(), "EXIT statement"),
                    ));
                }
                Ok(())
            }
            UnitKind::Identifier(identifier) => identifier.verify(span),
            UnitKind::Qualified(qualified) => qualified.verify(self, span, scope),
            UnitKind::Binary(term) => term.verify(self, span, scope),
            UnitKind::Unary(term) => term.verify(self, span, scope),
            UnitKind::Return | UnitKind::Empty | UnitKind::Literal(_) | UnitKind::EnumConstant(_) => {
                Ok(())
            }
        }
    }

    /// Creates the temporary storage of the unit. Units below the unit
    /// must be allocated first because the storage depends on their
    /// types.
    fn allocate(&mut self, id: UnitId) -> Result<(), Diagnostic> {
        let Some(mut unit) = self.units.take(id).ok() else {
            return Err(Diagnostic::internal_error(file!(), line!()));
        };
        let result = match &mut unit.kind {
            UnitKind::Assignment(stmt) => stmt.allocate(self, &unit.span),
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => {
                invocation.allocate(self, &unit.span)
            }
            UnitKind::Binary(term) => term.allocate(self, &unit.span),
            UnitKind::Unary(term) => term.allocate(self, &unit.span),
            _ => Ok(()),
        };
        self.units.restore(id, unit);
        result
    }

    /// Allocates the unit and every unit below it.
    pub fn allocate_tree(&mut self, root: UnitId) -> Result<(), Diagnostic> {
        for id in self.units.descendants(root).into_iter().rev() {
            self.allocate(id)?;
        }
        Ok(())
    }

    /// Copies the variables and the body of the unit. The copy starts
    /// from the current values of the variables and is not added to the
    /// machine. Returns the copy and the map from the variables of the
    /// source to the variables of the copy.
    pub fn copy_pou(
        &mut self,
        source: PouId,
        active: &HashSet<UnitId>,
    ) -> Result<(Pou, HashMap<VarId, VarId>), Vec<Diagnostic>> {
        let mut pou = self
            .pou(source)
            .cloned()
            .ok_or_else(|| vec![Diagnostic::internal_error(file!(), line!())])?;

        let mut variables = HashMap::new();
        for var in &pou.variables {
            match self.memory.duplicate(*var) {
                Ok(copy) => {
                    variables.insert(*var, copy);
                }
                Err(_) => {
                    self.release_all(&variables);
                    return Err(vec![Diagnostic::internal_error(file!(), line!())]);
                }
            }
        }
        let remap = |ids: &[VarId]| -> Vec<VarId> {
            ids.iter()
                .map(|id| variables.get(id).copied().unwrap_or(*id))
                .collect()
        };
        pou.variables = remap(&pou.variables);
        pou.inputs = remap(&pou.inputs);
        pou.outputs = remap(&pou.outputs);
        pou.result = pou
            .result
            .map(|id| variables.get(&id).copied().unwrap_or(id));

        let mut issues = vec![];
        pou.body = pou
            .body
            .and_then(|body| self.units.clone_tree(body, &variables, active, &mut issues));
        if !issues.is_empty() {
            if let Some(body) = pou.body {
                self.units.destroy(body);
            }
            self.release_all(&variables);
            return Err(issues);
        }
        Ok((pou, variables))
    }

    fn release_all(&mut self, variables: &HashMap<VarId, VarId>) {
        for var in variables.values() {
            self.memory.release(*var);
        }
    }

    /// Gives the body its own copy of every function that the body
    /// invokes directly or through other functions, so that nothing
    /// else can execute or change those functions while the body is
    /// suspended in them. Copies are made from the declared function,
    /// never from another copy. Returns the copies.
    pub fn copy_callees(&mut self, body: UnitId) -> Result<Vec<PouId>, Vec<Diagnostic>> {
        let idle = HashSet::new();
        let mut copies: HashMap<PouId, PouId> = HashMap::new();
        let mut created = vec![];
        let mut pending = vec![body];

        while let Some(root) = pending.pop() {
            for id in self.units.descendants(root) {
                let Some(target) = self.function_target(id) else {
                    continue;
                };
                let declared = self
                    .pou(target)
                    .and_then(|pou| pou.instance_of)
                    .unwrap_or(target);
                let copy = match copies.get(&declared) {
                    Some(copy) => *copy,
                    None => {
                        let (mut pou, _) = self.copy_pou(declared, &idle)?;
                        pou.instance_of = Some(declared);
                        if let Some(body) = pou.body {
                            pending.push(body);
                        }
                        let copy = self.add_pou(pou);
                        copies.insert(declared, copy);
                        created.push(copy);
                        copy
                    }
                };

                // Copies keep the order of the variables of the source.
                let variables: HashMap<VarId, VarId> = match (self.pou(target), self.pou(copy)) {
                    (Some(from), Some(to)) => from
                        .variables
                        .iter()
                        .copied()
                        .zip(to.variables.iter().copied())
                        .collect(),
                    _ => return Err(vec![Diagnostic::internal_error(file!(), line!())]),
                };
                if let Some(unit) = self.units.get_mut(id) {
                    if let UnitKind::Invoke(invocation) | UnitKind::Call(invocation) =
                        &mut unit.kind
                    {
                        invocation.retarget(copy, &variables);
                    }
                }
            }
        }
        Ok(created)
    }

    /// Returns the function that the unit invokes.
    fn function_target(&self, id: UnitId) -> Option<PouId> {
        let target = match &self.units.get(id)?.kind {
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation.target?,
            _ => return None,
        };
        self.pou(target)?.is_function().then_some(target)
    }

    /// Removes the variables and the body of the unit. The identifier
    /// of the unit stays valid but the unit has nothing to execute.
    pub fn clear_pou(&mut self, id: PouId) -> usize {
        let Some(pou) = self.pou_mut(id) else {
            return 0;
        };
        let body = pou.body.take();
        let variables = std::mem::take(&mut pou.variables);
        pou.inputs.clear();
        pou.outputs.clear();
        pou.result = None;
        for var in variables {
            self.memory.release(var);
        }
        body.map(|body| self.units.destroy(body)).unwrap_or_default()
    }
}

/// What a unit can reach while it steps.
pub(crate) struct StepContext<'a> {
    pub machine: &'a mut Machine,
    pub cursor: &'a mut Cursor,
    /// The unit that is stepping.
    pub id: UnitId,
    pub config: &'a RuntimeConfig,
}

impl StepContext<'_> {
    /// Switches to the child unit. The stepping unit continues when the
    /// child finishes.
    pub fn enter(&mut self, child: UnitId) -> Result<StepResult, Fault> {
        self.cursor
            .switch_current(&mut self.machine.units, child, self.config)?;
        Ok(StepResult::InProgress)
    }

    pub fn needs_stepping(&self, id: UnitId) -> bool {
        self.machine.needs_stepping(id)
    }

    pub fn operand(&self, id: UnitId) -> Result<&dyn Value, Fault> {
        self.machine.operand(id)
    }

    /// Assigns the value to the storage that the variable expression
    /// designates.
    pub fn store(&mut self, target: UnitId, value: &dyn Value) -> Result<(), Fault> {
        let place = self.machine.place(target)?;
        self.machine.memory.resolve_mut(&place)?.assign(value)?;
        Ok(())
    }
}
