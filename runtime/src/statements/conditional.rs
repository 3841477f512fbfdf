use stint_dsl::diagnostic::Diagnostic;

use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, VerifyScope};

use super::{condition, verify_condition};

/// One `IF` or `ELSIF` arm.
#[derive(Clone, Copy, Debug)]
pub struct Branch {
    pub condition: UnitId,
    pub body: UnitId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConditionalState {
    /// Evaluating the condition of the branch.
    Evaluate(usize),
    /// The condition of the branch has its value.
    Test(usize),
    Body,
}

/// `IF` with any number of `ELSIF` arms and an optional `ELSE`.
#[derive(Clone, Debug)]
pub struct Conditional {
    pub branches: Vec<Branch>,
    pub else_body: Option<UnitId>,
    state: ConditionalState,
}

impl Conditional {
    pub fn new(branches: Vec<Branch>, else_body: Option<UnitId>) -> Self {
        Self {
            branches,
            else_body,
            state: ConditionalState::Evaluate(0),
        }
    }

    pub fn reset(&mut self) {
        self.state = ConditionalState::Evaluate(0);
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        loop {
            match self.state {
                ConditionalState::Evaluate(index) => {
                    let Some(branch) = self.branches.get(index) else {
                        return match self.else_body {
                            Some(body) => {
                                self.state = ConditionalState::Body;
                                ctx.enter(body)
                            }
                            None => Ok(StepResult::Finished),
                        };
                    };
                    self.state = ConditionalState::Test(index);
                    if ctx.needs_stepping(branch.condition) {
                        return ctx.enter(branch.condition);
                    }
                }
                ConditionalState::Test(index) => {
                    let branch = self.branches[index];
                    if condition(ctx, branch.condition)? {
                        self.state = ConditionalState::Body;
                        return ctx.enter(branch.body);
                    }
                    self.state = ConditionalState::Evaluate(index + 1);
                }
                ConditionalState::Body => return Ok(StepResult::Finished),
            }
        }
    }

    pub fn verify(&self, machine: &Machine, scope: &mut VerifyScope) -> Result<(), Diagnostic> {
        for branch in &self.branches {
            verify_condition(machine, branch.condition, scope)?;
            machine.verify(branch.body, scope)?;
        }
        if let Some(body) = self.else_body {
            machine.verify(body, scope)?;
        }
        Ok(())
    }
}
