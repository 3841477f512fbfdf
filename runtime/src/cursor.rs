//! The execution cursor of one program of record.
//!
//! The cursor points at the unit that runs on the next step and holds
//! the units that resume when it finishes. Invocations record a return
//! context and loops record an exit context so that `RETURN` and `EXIT`
//! can abandon the units in between.
use std::collections::HashSet;

use log::trace;

use crate::config::RuntimeConfig;
use crate::error::Fault;
use crate::machine::Machine;
use crate::unit::{StepResult, UnitId, Units};

/// The depths of the stacks when a context was pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Context {
    pub unit: UnitId,
    pub call_depth: usize,
    pub exit_depth: usize,
    pub return_depth: usize,
}

#[derive(Debug, Default)]
pub struct Cursor {
    current: Option<UnitId>,
    call_stack: Vec<UnitId>,
    return_context: Vec<Context>,
    exit_context: Vec<Context>,
    /// Set when the last step moved the cursor into a new unit.
    entered: bool,
    /// The number of steps since the cursor started.
    steps: u64,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<UnitId> {
        self.current
    }

    pub fn call_stack(&self) -> &[UnitId] {
        &self.call_stack
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn return_depth(&self) -> usize {
        self.return_context.len()
    }

    pub fn exit_depth(&self) -> usize {
        self.exit_context.len()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Returns true when no cycle is in progress.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// The units that are executing: the current unit and every unit that
    /// resumes after it.
    pub fn active_units(&self) -> HashSet<UnitId> {
        self.call_stack.iter().copied().chain(self.current).collect()
    }

    /// Points the cursor at the root unit of a new cycle.
    pub fn start(&mut self, units: &mut Units, root: UnitId) -> Result<(), Fault> {
        self.clear();
        units.reset(root)?;
        self.current = Some(root);
        self.entered = true;
        trace!("start {}", root);
        Ok(())
    }

    /// Abandons the cycle in progress.
    pub fn clear(&mut self) {
        self.current = None;
        self.call_stack.clear();
        self.return_context.clear();
        self.exit_context.clear();
        self.entered = false;
        self.steps = 0;
    }

    /// Makes the unit current so that it runs on the next step. The unit
    /// is reset and the previous unit resumes when the unit finishes.
    pub fn switch_current(
        &mut self,
        units: &mut Units,
        to: UnitId,
        config: &RuntimeConfig,
    ) -> Result<(), Fault> {
        if self.current == Some(to) || self.call_stack.contains(&to) {
            return Err(Fault::Reentrant(to));
        }
        if self.call_stack.len() >= config.max_call_depth {
            return Err(Fault::CallDepthExceeded(config.max_call_depth));
        }
        units.reset(to)?;
        if let Some(current) = self.current {
            self.call_stack.push(current);
        }
        trace!("enter {} at depth {}", to, self.call_stack.len());
        self.current = Some(to);
        self.entered = true;
        Ok(())
    }

    fn context(&self, unit: UnitId) -> Context {
        Context {
            unit,
            call_depth: self.call_stack.len(),
            exit_depth: self.exit_context.len(),
            return_depth: self.return_context.len(),
        }
    }

    pub fn push_return_context(&mut self, unit: UnitId) {
        let context = self.context(unit);
        self.return_context.push(context);
    }

    pub fn pop_return_context(&mut self) -> Result<Context, Fault> {
        self.return_context
            .pop()
            .ok_or(Fault::MissingContext("return"))
    }

    pub fn push_exit_context(&mut self, unit: UnitId) {
        let context = self.context(unit);
        self.exit_context.push(context);
    }

    pub fn pop_exit_context(&mut self) -> Result<Context, Fault> {
        self.exit_context.pop().ok_or(Fault::MissingContext("exit"))
    }

    /// Abandons the units above the innermost invocation and resumes the
    /// invocation. The invocation pops its own return context.
    pub fn jump_return(&mut self) -> StepResult {
        let Some(context) = self.return_context.last().copied() else {
            trace!("return without context");
            return StepResult::AllFinished;
        };
        self.call_stack.truncate(context.call_depth);
        self.exit_context.truncate(context.exit_depth);
        self.current = Some(context.unit);
        trace!("return to {}", context.unit);
        StepResult::InProgress
    }

    /// Abandons the units above the innermost loop and resumes the loop,
    /// which then completes. The loop pops its own exit context.
    pub fn jump_exit(&mut self, units: &mut Units) -> Result<StepResult, Fault> {
        let context = self
            .exit_context
            .last()
            .copied()
            .ok_or(Fault::MissingContext("exit"))?;
        self.call_stack.truncate(context.call_depth);
        self.return_context.truncate(context.return_depth);
        let unit = units
            .get_mut(context.unit)
            .ok_or(Fault::UnitUnavailable(context.unit))?;
        if !unit.kind.mark_exited() {
            return Err(Fault::MissingContext("exit"));
        }
        self.current = Some(context.unit);
        trace!("exit to {}", context.unit);
        Ok(StepResult::InProgress)
    }

    /// Steps the current unit once.
    pub fn step(
        &mut self,
        machine: &mut Machine,
        config: &RuntimeConfig,
    ) -> Result<StepResult, Fault> {
        let Some(current) = self.current else {
            return Ok(StepResult::AllFinished);
        };
        self.steps += 1;
        if let Some(limit) = config.max_steps_per_cycle {
            if self.steps > limit {
                return Err(Fault::StepBudgetExceeded(limit));
            }
        }

        self.entered = false;
        let result = machine.step_unit(self, current, config)?;
        if config.trace_steps {
            trace!("step {} {:?}", current, result);
        }

        match result {
            StepResult::Finished => match self.call_stack.pop() {
                Some(previous) => {
                    self.current = Some(previous);
                    Ok(StepResult::Finished)
                }
                None => {
                    self.current = None;
                    Ok(StepResult::AllFinished)
                }
            },
            StepResult::InProgress => Ok(StepResult::InProgress),
            StepResult::AllFinished => {
                self.clear();
                Ok(StepResult::AllFinished)
            }
        }
    }

    fn stopped_at_statement(&self, machine: &Machine) -> bool {
        self.entered && self.current.is_some_and(|id| machine.units.is_statement(id))
    }

    /// Steps until the cursor enters a statement, including statements
    /// in the body of an invoked unit.
    pub fn step_in(
        &mut self,
        machine: &mut Machine,
        config: &RuntimeConfig,
    ) -> Result<StepResult, Fault> {
        loop {
            let result = self.step(machine, config)?;
            if result == StepResult::AllFinished || self.stopped_at_statement(machine) {
                return Ok(result);
            }
        }
    }

    /// Steps until the cursor enters a statement that is not inside a
    /// unit invoked from here.
    pub fn step_over(
        &mut self,
        machine: &mut Machine,
        config: &RuntimeConfig,
    ) -> Result<StepResult, Fault> {
        let depth = self.return_context.len();
        loop {
            let result = self.step(machine, config)?;
            if result == StepResult::AllFinished
                || (self.return_context.len() <= depth && self.stopped_at_statement(machine))
            {
                return Ok(result);
            }
        }
    }

    /// Steps until the innermost invoked unit returns to its caller.
    pub fn step_out(
        &mut self,
        machine: &mut Machine,
        config: &RuntimeConfig,
    ) -> Result<StepResult, Fault> {
        let depth = self.return_context.len();
        loop {
            let result = self.step(machine, config)?;
            if result == StepResult::AllFinished || self.return_context.len() < depth {
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::WhileLoop;
    use crate::unit::{Unit, UnitKind};
    use stint_dsl::core::SourceSpan;

    fn units(count: usize) -> (Units, Vec<UnitId>) {
        let mut units = Units::new();
        let ids = (0..count)
            .map(|_| units.insert(Unit::new(SourceSpan::default(), UnitKind::Empty)))
            .collect();
        (units, ids)
    }

    #[test]
    fn switch_current_when_on_stack_then_reentrant() {
        let (mut units, ids) = units(2);
        let config = RuntimeConfig::default();
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.switch_current(&mut units, ids[1], &config).unwrap();

        assert_eq!(
            Err(Fault::Reentrant(ids[0])),
            cursor.switch_current(&mut units, ids[0], &config)
        );
        assert_eq!(
            Err(Fault::Reentrant(ids[1])),
            cursor.switch_current(&mut units, ids[1], &config)
        );
    }

    #[test]
    fn switch_current_when_depth_limit_then_call_depth_exceeded() {
        let (mut units, ids) = units(3);
        let config = RuntimeConfig::default().with_max_call_depth(1);
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.switch_current(&mut units, ids[1], &config).unwrap();

        assert_eq!(
            Err(Fault::CallDepthExceeded(1)),
            cursor.switch_current(&mut units, ids[2], &config)
        );
    }

    #[test]
    fn jump_return_when_nested_then_truncates_to_recorded_depths() {
        let (mut units, ids) = units(5);
        let config = RuntimeConfig::default();
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.switch_current(&mut units, ids[1], &config).unwrap();
        cursor.push_return_context(ids[1]);
        cursor.switch_current(&mut units, ids[2], &config).unwrap();
        cursor.push_exit_context(ids[2]);
        cursor.switch_current(&mut units, ids[3], &config).unwrap();
        cursor.switch_current(&mut units, ids[4], &config).unwrap();

        assert_eq!(StepResult::InProgress, cursor.jump_return());

        assert_eq!(Some(ids[1]), cursor.current());
        assert_eq!(&[ids[0]], cursor.call_stack());
        assert_eq!(0, cursor.exit_depth());
        assert_eq!(1, cursor.return_depth());
    }

    #[test]
    fn jump_return_when_no_context_then_all_finished() {
        let mut cursor = Cursor::new();
        assert_eq!(StepResult::AllFinished, cursor.jump_return());
    }

    #[test]
    fn jump_exit_when_nested_then_truncates_to_recorded_depths() {
        let (mut units, ids) = units(6);
        let config = RuntimeConfig::default();
        let looping = units.insert(Unit::new(
            SourceSpan::default(),
            UnitKind::While(WhileLoop::new(ids[4], ids[5])),
        ));
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.switch_current(&mut units, ids[1], &config).unwrap();
        cursor.switch_current(&mut units, looping, &config).unwrap();
        cursor.push_exit_context(looping);
        cursor.switch_current(&mut units, ids[2], &config).unwrap();
        cursor.push_return_context(ids[2]);
        cursor.switch_current(&mut units, ids[3], &config).unwrap();

        assert_eq!(Ok(StepResult::InProgress), cursor.jump_exit(&mut units));

        assert_eq!(Some(looping), cursor.current());
        assert_eq!(&[ids[0], ids[1]], cursor.call_stack());
        assert_eq!(0, cursor.return_depth());
        assert_eq!(1, cursor.exit_depth());
    }

    #[test]
    fn jump_exit_when_not_loop_then_missing_context() {
        let (mut units, ids) = units(2);
        let config = RuntimeConfig::default();
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.push_exit_context(ids[0]);
        cursor.switch_current(&mut units, ids[1], &config).unwrap();

        assert_eq!(
            Err(Fault::MissingContext("exit")),
            cursor.jump_exit(&mut units)
        );
    }

    #[test]
    fn pop_return_context_when_empty_then_missing_context() {
        let mut cursor = Cursor::new();
        assert_eq!(
            Err(Fault::MissingContext("return")),
            cursor.pop_return_context()
        );
    }

    #[test]
    fn active_units_when_nested_then_current_and_stack() {
        let (mut units, ids) = units(3);
        let config = RuntimeConfig::default();
        let mut cursor = Cursor::new();
        cursor.start(&mut units, ids[0]).unwrap();
        cursor.switch_current(&mut units, ids[1], &config).unwrap();

        let active = cursor.active_units();
        assert!(active.contains(&ids[0]));
        assert!(active.contains(&ids[1]));
        assert!(!active.contains(&ids[2]));
    }
}
