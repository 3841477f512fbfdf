//! Invocable units: the statements and expression terms of every body.
//!
//! Units are stored in an arena and refer to each other by [`UnitId`].
//! Each unit is a small state machine. Stepping a unit either completes
//! the unit or switches the cursor to a child unit, in which case the
//! unit resumes from its state when the child completes.
use std::collections::{HashMap, HashSet};
use std::fmt;

use stint_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::error::Fault;
use crate::expressions::{BinaryTerm, EnumConstant, Identifier, Literal, Qualified, UnaryTerm};
use crate::invocation::Invocation;
use crate::machine::StepContext;
use crate::memory::VarId;
use crate::statements::{
    Assignment, Case, Conditional, ForLoop, RepeatLoop, StatementList, WhileLoop,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// The outcome of stepping a unit once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// The unit completed.
    Finished,
    /// The cursor now points at another unit that must be stepped
    /// before this unit can continue.
    InProgress,
    /// There is nothing left to return to.
    AllFinished,
}

/// State carried through static verification of a body.
#[derive(Debug, Default)]
pub struct VerifyScope {
    /// The number of loops that enclose the unit being verified.
    pub loop_depth: usize,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Clone, Debug)]
pub struct Unit {
    pub span: SourceSpan,
    pub kind: UnitKind,
}

impl Unit {
    pub fn new(span: SourceSpan, kind: UnitKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Clone, Debug)]
pub enum UnitKind {
    StatementList(StatementList),
    Assignment(Assignment),
    Conditional(Conditional),
    Case(Case),
    For(ForLoop),
    While(WhileLoop),
    Repeat(RepeatLoop),
    /// A function or program invoked as a statement.
    Invoke(Invocation),
    Exit,
    Return,
    Empty,
    Literal(Literal),
    Identifier(Identifier),
    /// An identifier that names an enumerated value.
    EnumConstant(EnumConstant),
    Qualified(Qualified),
    Binary(BinaryTerm),
    Unary(UnaryTerm),
    /// A function invoked in an expression.
    Call(Invocation),
}

impl UnitKind {
    /// Returns true for units that a debugger stops at.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            UnitKind::Assignment(_)
                | UnitKind::Conditional(_)
                | UnitKind::Case(_)
                | UnitKind::For(_)
                | UnitKind::While(_)
                | UnitKind::Repeat(_)
                | UnitKind::Invoke(_)
                | UnitKind::Exit
                | UnitKind::Return
                | UnitKind::Empty
        )
    }

    pub fn children(&self) -> Vec<UnitId> {
        match self {
            UnitKind::StatementList(list) => list.statements.clone(),
            UnitKind::Assignment(stmt) => vec![stmt.target, stmt.value],
            UnitKind::Conditional(stmt) => stmt
                .branches
                .iter()
                .flat_map(|branch| [branch.condition, branch.body])
                .chain(stmt.else_body)
                .collect(),
            UnitKind::Case(stmt) => std::iter::once(stmt.selector)
                .chain(stmt.groups.iter().flat_map(|group| group.units()))
                .chain(stmt.else_body)
                .collect(),
            UnitKind::For(stmt) => [stmt.control, stmt.from, stmt.to]
                .into_iter()
                .chain(stmt.by)
                .chain([stmt.body])
                .collect(),
            UnitKind::While(stmt) => vec![stmt.condition, stmt.body],
            UnitKind::Repeat(stmt) => vec![stmt.body, stmt.until],
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation.units(),
            UnitKind::Qualified(qualified) => qualified.subscripts().collect(),
            UnitKind::Binary(term) => vec![term.left, term.right],
            UnitKind::Unary(term) => vec![term.term],
            UnitKind::Exit
            | UnitKind::Return
            | UnitKind::Empty
            | UnitKind::Literal(_)
            | UnitKind::Identifier(_)
            | UnitKind::EnumConstant(_) => vec![],
        }
    }

    /// Returns the child references so that they can be replaced.
    pub fn children_mut(&mut self) -> Vec<&mut UnitId> {
        match self {
            UnitKind::StatementList(list) => list.statements.iter_mut().collect(),
            UnitKind::Assignment(stmt) => vec![&mut stmt.target, &mut stmt.value],
            UnitKind::Conditional(stmt) => stmt
                .branches
                .iter_mut()
                .flat_map(|branch| [&mut branch.condition, &mut branch.body])
                .chain(stmt.else_body.as_mut())
                .collect(),
            UnitKind::Case(stmt) => std::iter::once(&mut stmt.selector)
                .chain(stmt.groups.iter_mut().flat_map(|group| group.units_mut()))
                .chain(stmt.else_body.as_mut())
                .collect(),
            UnitKind::For(stmt) => {
                let mut children = vec![&mut stmt.control, &mut stmt.from, &mut stmt.to];
                children.extend(stmt.by.as_mut());
                children.push(&mut stmt.body);
                children
            }
            UnitKind::While(stmt) => vec![&mut stmt.condition, &mut stmt.body],
            UnitKind::Repeat(stmt) => vec![&mut stmt.body, &mut stmt.until],
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation.units_mut(),
            UnitKind::Qualified(qualified) => qualified.subscripts_mut(),
            UnitKind::Binary(term) => vec![&mut term.left, &mut term.right],
            UnitKind::Unary(term) => vec![&mut term.term],
            UnitKind::Exit
            | UnitKind::Return
            | UnitKind::Empty
            | UnitKind::Literal(_)
            | UnitKind::Identifier(_)
            | UnitKind::EnumConstant(_) => vec![],
        }
    }

    /// Replaces variable bindings according to the map.
    pub fn remap_variables(&mut self, variables: &HashMap<VarId, VarId>) {
        let var = match self {
            UnitKind::Identifier(identifier) => &mut identifier.var,
            UnitKind::Qualified(qualified) => &mut qualified.var,
            _ => return,
        };
        if let Some(mapped) = var.and_then(|id| variables.get(&id)) {
            *var = Some(*mapped);
        }
    }

    /// Clears the state so that the next step starts the unit from the
    /// beginning.
    pub fn reset(&mut self) {
        match self {
            UnitKind::StatementList(list) => list.reset(),
            UnitKind::Assignment(stmt) => stmt.reset(),
            UnitKind::Conditional(stmt) => stmt.reset(),
            UnitKind::Case(stmt) => stmt.reset(),
            UnitKind::For(stmt) => stmt.reset(),
            UnitKind::While(stmt) => stmt.reset(),
            UnitKind::Repeat(stmt) => stmt.reset(),
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation.reset(),
            UnitKind::Qualified(qualified) => qualified.reset(),
            UnitKind::Binary(term) => term.reset(),
            UnitKind::Unary(term) => term.reset(),
            UnitKind::Exit
            | UnitKind::Return
            | UnitKind::Empty
            | UnitKind::Literal(_)
            | UnitKind::Identifier(_)
            | UnitKind::EnumConstant(_) => {}
        }
    }

    /// Tells a loop that an `EXIT` in the body completed the loop.
    /// Returns false if the unit is not a loop.
    pub fn mark_exited(&mut self) -> bool {
        match self {
            UnitKind::For(stmt) => stmt.mark_exited(),
            UnitKind::While(stmt) => stmt.mark_exited(),
            UnitKind::Repeat(stmt) => stmt.mark_exited(),
            _ => return false,
        }
        true
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        match self {
            UnitKind::StatementList(list) => list.step(ctx),
            UnitKind::Assignment(stmt) => stmt.step(ctx),
            UnitKind::Conditional(stmt) => stmt.step(ctx),
            UnitKind::Case(stmt) => stmt.step(ctx),
            UnitKind::For(stmt) => stmt.step(ctx),
            UnitKind::While(stmt) => stmt.step(ctx),
            UnitKind::Repeat(stmt) => stmt.step(ctx),
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation.step(ctx),
            UnitKind::Exit => ctx.cursor.jump_exit(&mut ctx.machine.units),
            UnitKind::Return => Ok(ctx.cursor.jump_return()),
            UnitKind::Qualified(qualified) => qualified.step(ctx),
            UnitKind::Binary(term) => term.step(ctx),
            UnitKind::Unary(term) => term.step(ctx),
            UnitKind::Empty
            | UnitKind::Literal(_)
            | UnitKind::Identifier(_)
            | UnitKind::EnumConstant(_) => Ok(StepResult::Finished),
        }
    }
}

/// The arena of units.
#[derive(Debug, Default)]
pub struct Units {
    slots: Vec<Option<Unit>>,
}

impl Units {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: Unit) -> UnitId {
        self.slots.push(Some(unit));
        UnitId((self.slots.len() - 1) as u32)
    }

    /// The number of units in the arena.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn span(&self, id: UnitId) -> Option<SourceSpan> {
        self.get(id).map(|unit| unit.span.clone())
    }

    pub fn is_statement(&self, id: UnitId) -> bool {
        self.get(id).is_some_and(|unit| unit.kind.is_statement())
    }

    /// Takes the unit out of the arena while it is stepped. The unit is
    /// unavailable until it is restored.
    pub(crate) fn take(&mut self, id: UnitId) -> Result<Unit, Fault> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(Fault::UnitUnavailable(id))
    }

    pub(crate) fn restore(&mut self, id: UnitId, unit: Unit) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = Some(unit);
        }
    }

    pub fn reset(&mut self, id: UnitId) -> Result<(), Fault> {
        let unit = self.get_mut(id).ok_or(Fault::UnitUnavailable(id))?;
        unit.kind.reset();
        Ok(())
    }

    /// Returns the unit and every unit below it, parents before children.
    pub fn descendants(&self, root: UnitId) -> Vec<UnitId> {
        let mut found = vec![];
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if let Some(unit) = self.get(id) {
                found.push(id);
                pending.extend(unit.kind.children().into_iter().rev());
            }
        }
        found
    }

    /// Resets the unit and every unit below it.
    pub fn reset_tree(&mut self, root: UnitId) {
        for id in self.descendants(root) {
            if let Some(unit) = self.get_mut(id) {
                unit.kind.reset();
            }
        }
    }

    /// Copies the unit and every unit below it. Variables bindings are
    /// replaced according to the map. A unit that is active (executing)
    /// cannot be copied and is reported in the issues; the copy is made
    /// anyway so that the caller can destroy it.
    pub fn clone_tree(
        &mut self,
        root: UnitId,
        variables: &HashMap<VarId, VarId>,
        active: &HashSet<UnitId>,
        issues: &mut Vec<Diagnostic>,
    ) -> Option<UnitId> {
        let unit = self.get(root)?;
        if active.contains(&root) {
            issues.push(
                Diagnostic::problem(Problem::UnitExecuting, Label::span(unit.span.clone(), "Unit"))
                    .with_context("unit", &root.to_string()),
            );
        }
        let mut copy = unit.clone();
        copy.kind.reset();
        copy.kind.remap_variables(variables);
        for child in copy.kind.children_mut() {
            if let Some(cloned) = self.clone_tree(*child, variables, active, issues) {
                *child = cloned;
            }
        }
        Some(self.insert(copy))
    }

    /// Removes the unit and every unit below it. Returns the number of
    /// units removed.
    pub fn destroy(&mut self, root: UnitId) -> usize {
        let ids = self.descendants(root);
        for id in &ids {
            if let Some(slot) = self.slots.get_mut(id.index()) {
                *slot = None;
            }
        }
        ids.len()
    }
}
