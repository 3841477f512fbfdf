use stint_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::datatypes::TypeRef;
use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::memory::VarId;
use crate::unit::{StepResult, UnitId, VerifyScope};
use crate::value::ValueClass;

#[derive(Clone, Debug)]
pub enum LinkKind {
    /// `.name`
    Field(Id),
    /// `[a, b]`
    Index(Vec<UnitId>),
}

/// One element of a qualified identifier after the root.
#[derive(Clone, Debug)]
pub struct Link {
    pub kind: LinkKind,
    pub span: SourceSpan,
}

/// How to move from a value to a sub-value. Known once the links are
/// bound to the type of the root variable.
#[derive(Clone, Debug)]
pub enum Access {
    /// A structure element or an array element with constant subscripts.
    Child(usize),
    /// An array element whose subscripts are computed from the link.
    Element { array: TypeRef, link: usize },
}

/// A variable reference of the form `root.field[index]...`. The root may
/// name a program, in which case the first link names a variable of the
/// program.
#[derive(Clone, Debug)]
pub struct Qualified {
    pub root: Id,
    pub links: Vec<Link>,
    /// The number of links that name the variable together with the
    /// root rather than a sub-value.
    pub prefix: usize,
    pub var: Option<VarId>,
    pub accesses: Vec<Access>,
    /// The type of the designated sub-value.
    pub data_type: Option<TypeRef>,
    next: usize,
}

impl Qualified {
    pub fn new(root: Id, links: Vec<Link>) -> Self {
        Self {
            root,
            links,
            prefix: 0,
            var: None,
            accesses: vec![],
            data_type: None,
            next: 0,
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn subscripts(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.links
            .iter()
            .filter_map(|link| match &link.kind {
                LinkKind::Index(subscripts) => Some(subscripts),
                LinkKind::Field(_) => None,
            })
            .flatten()
            .copied()
    }

    pub(crate) fn subscripts_mut(&mut self) -> Vec<&mut UnitId> {
        self.links
            .iter_mut()
            .filter_map(|link| match &mut link.kind {
                LinkKind::Index(subscripts) => Some(subscripts),
                LinkKind::Field(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn link_subscripts(&self, link: usize) -> &[UnitId] {
        match self.links.get(link).map(|link| &link.kind) {
            Some(LinkKind::Index(subscripts)) => subscripts,
            _ => &[],
        }
    }

    /// Evaluates the subscripts that are not available in place, one per
    /// step.
    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        let pending = self
            .subscripts()
            .filter(|subscript| ctx.needs_stepping(*subscript))
            .nth(self.next);
        match pending {
            Some(subscript) => {
                self.next += 1;
                ctx.enter(subscript)
            }
            None => Ok(StepResult::Finished),
        }
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        if self.var.is_none() || self.data_type.is_none() {
            return Err(Diagnostic::problem(
                Problem::VariableUndefined,
                Label::span(span.clone(), "Variable"),
            )
            .with_context_id("identifier", &self.root));
        }
        for subscript in self.subscripts() {
            machine.verify(subscript, scope)?;
            let is_integer = machine
                .data_type(subscript)
                .is_some_and(|data_type| data_type.class() == ValueClass::Integer);
            if !is_integer {
                let span = machine.units.span(subscript).unwrap_or_else(|| span.clone());
                return Err(Diagnostic::problem(
                    Problem::ValueNotCompatible,
                    Label::span(span, "Subscript"),
                ));
            }
        }
        Ok(())
    }
}
