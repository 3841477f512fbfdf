use stint_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::memory::VarId;

/// A reference to a variable by name. The variable is bound when the
/// linker resolves the body.
#[derive(Clone, Debug)]
pub struct Identifier {
    pub name: Id,
    pub var: Option<VarId>,
}

impl Identifier {
    pub fn new(name: Id) -> Self {
        Self { name, var: None }
    }

    pub fn verify(&self, span: &SourceSpan) -> Result<(), Diagnostic> {
        if self.var.is_none() {
            return Err(Diagnostic::problem(
                Problem::VariableUndefined,
                Label::span(span.clone(), "Variable"),
            )
            .with_context_id("identifier", &self.name));
        }
        Ok(())
    }
}
