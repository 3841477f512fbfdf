use stint_dsl::diagnostic::Diagnostic;

use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, VerifyScope};

/// A sequence of statements executed in order.
#[derive(Clone, Debug)]
pub struct StatementList {
    pub statements: Vec<UnitId>,
    next: usize,
}

impl StatementList {
    pub fn new(statements: Vec<UnitId>) -> Self {
        Self {
            statements,
            next: 0,
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        match self.statements.get(self.next).copied() {
            Some(statement) => {
                self.next += 1;
                ctx.enter(statement)
            }
            None => Ok(StepResult::Finished),
        }
    }

    /// Verifies the statements in order and stops at the first problem.
    pub fn verify(&self, machine: &Machine, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        for statement in &self.statements {
            machine.verify(*statement, scope)?;
        }
        Ok(())
    }
}
