//! The linked application and the programs of record that a host runs.
//!
//! Each program of record has its own cursor. A cycle runs the body of
//! the program once. The host either runs a complete cycle or steps
//! through the cycle for debugging and then finishes the cycle with
//! [`Application::run_cycle`].
use std::collections::HashSet;

use log::{debug, trace, warn};
use stint_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::config::RuntimeConfig;
use crate::cursor::Cursor;
use crate::error::{Fault, FaultContext};
use crate::invocation::Invocation;
use crate::machine::Machine;
use crate::memory::VarId;
use crate::pou::PouId;
use crate::unit::{StepResult, Unit, UnitId, UnitKind};
use crate::value::Value;

/// A program that the host runs cycle by cycle.
#[derive(Debug)]
pub struct ProgramOfRecord {
    name: Id,
    pou: PouId,
    /// The invocation of the program that starts each cycle.
    root: UnitId,
    cursor: Cursor,
    started: bool,
    /// The copies of the functions that the program invokes. No other
    /// program executes them.
    functions: Vec<PouId>,
}

impl ProgramOfRecord {
    pub fn name(&self) -> &Id {
        &self.name
    }
}

/// The outcome of a debugging step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepEvent {
    /// The cycle is suspended and continues with the next step.
    Suspended,
    /// The cycle completed.
    CycleFinished,
}

type DebugStep = fn(&mut Cursor, &mut Machine, &RuntimeConfig) -> Result<StepResult, Fault>;

#[derive(Debug)]
pub struct Application {
    machine: Machine,
    programs: Vec<ProgramOfRecord>,
    globals: Vec<VarId>,
    warnings: Vec<Diagnostic>,
    config: RuntimeConfig,
}

impl Application {
    /// Creates a program of record for each program. Each program of
    /// record gets its own copy of the functions that it invokes.
    pub fn new(
        mut machine: Machine,
        programs: &[PouId],
        globals: Vec<VarId>,
        warnings: Vec<Diagnostic>,
        config: RuntimeConfig,
    ) -> Result<Self, Vec<Diagnostic>> {
        let mut records = Vec::with_capacity(programs.len());
        for pou in programs {
            let Some(declared) = machine.pou(*pou) else {
                continue;
            };
            let (name, span, body) = (declared.name.clone(), declared.span.clone(), declared.body);
            let functions = match body {
                Some(body) => machine.copy_callees(body)?,
                None => vec![],
            };
            records.push(Self::record(&mut machine, name, span, *pou, functions));
        }
        Ok(Self {
            machine,
            programs: records,
            globals,
            warnings,
            config,
        })
    }

    fn record(
        machine: &mut Machine,
        name: Id,
        span: SourceSpan,
        pou: PouId,
        functions: Vec<PouId>,
    ) -> ProgramOfRecord {
        let root = machine.units.insert(Unit::new(
            span,
            UnitKind::Invoke(Invocation::root(name.clone(), pou)),
        ));
        ProgramOfRecord {
            name,
            pou,
            root,
            cursor: Cursor::new(),
            started: false,
            functions,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Warnings reported while linking.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn programs(&self) -> impl Iterator<Item = &ProgramOfRecord> {
        self.programs.iter()
    }

    fn index(&self, name: &Id) -> Option<usize> {
        self.programs.iter().position(|record| record.name == *name)
    }

    fn program_index(&self, name: &Id) -> Result<usize, FaultContext> {
        self.index(name).ok_or_else(|| FaultContext {
            fault: Fault::ProgramUndefined(name.clone()),
            program: name.clone(),
            span: None,
        })
    }

    /// Restores the variables of the program to their initial values and
    /// abandons any cycle in progress.
    pub fn start(&mut self, name: &Id) -> Result<(), FaultContext> {
        let index = self.program_index(name)?;
        self.release(index);
        if let Err(fault) = self.restart(index) {
            return Err(self.abort(index, fault));
        }
        debug!("Started program {}", name);
        Ok(())
    }

    fn restart(&mut self, index: usize) -> Result<(), Fault> {
        let record = &mut self.programs[index];
        let (variables, body) = self
            .machine
            .pou(record.pou)
            .map(|pou| (pou.variables.clone(), pou.body))
            .ok_or(Fault::ProgramUndefined(record.name.clone()))?;
        for var in variables {
            self.machine.memory.reset(var)?;
        }
        if let Some(body) = body {
            self.machine.units.reset_tree(body);
        }
        self.machine.units.reset_tree(record.root);
        record.started = true;
        Ok(())
    }

    /// Starts every program of record.
    pub fn start_all(&mut self) -> Result<(), FaultContext> {
        let names: Vec<Id> = self.programs.iter().map(|record| record.name.clone()).collect();
        for name in names {
            self.start(&name)?;
        }
        Ok(())
    }

    /// Runs the program until the cycle completes. A cycle that is
    /// suspended by a debugging step continues where it stopped.
    pub fn run_cycle(&mut self, name: &Id) -> Result<(), FaultContext> {
        let index = self.program_index(name)?;
        if let Err(fault) = self.begin(index) {
            return Err(self.abort(index, fault));
        }
        loop {
            let record = &mut self.programs[index];
            match record.cursor.step(&mut self.machine, &self.config) {
                Ok(StepResult::AllFinished) => {
                    trace!("cycle of {} finished", name);
                    return Ok(());
                }
                Ok(_) => {}
                Err(fault) => return Err(self.abort(index, fault)),
            }
        }
    }

    /// Runs the program for a number of cycles.
    pub fn run_cycles(&mut self, name: &Id, cycles: usize) -> Result<(), FaultContext> {
        for _ in 0..cycles {
            self.run_cycle(name)?;
        }
        Ok(())
    }

    /// Points the cursor at the root of a new cycle unless a cycle is in
    /// progress. Returns true if a new cycle started.
    fn begin(&mut self, index: usize) -> Result<bool, Fault> {
        let record = &mut self.programs[index];
        if !record.started {
            return Err(Fault::NotStarted(record.name.clone()));
        }
        if !record.cursor.is_idle() {
            return Ok(false);
        }
        record.cursor.start(&mut self.machine.units, record.root)?;
        Ok(true)
    }

    /// Runs a debugging step. A step that starts a new cycle stops at the
    /// first statement of the body.
    fn debug_step(&mut self, name: &Id, operation: DebugStep) -> Result<StepEvent, FaultContext> {
        let index = self.program_index(name)?;
        let result = self.begin(index).and_then(|started| {
            let record = &mut self.programs[index];
            if started {
                record.cursor.step_in(&mut self.machine, &self.config)
            } else {
                operation(&mut record.cursor, &mut self.machine, &self.config)
            }
        });
        match result {
            Ok(StepResult::AllFinished) => Ok(StepEvent::CycleFinished),
            Ok(_) => Ok(StepEvent::Suspended),
            Err(fault) => Err(self.abort(index, fault)),
        }
    }

    /// Performs a single primitive step.
    pub fn step(&mut self, name: &Id) -> Result<StepEvent, FaultContext> {
        self.debug_step(name, Cursor::step)
    }

    /// Steps to the next statement, entering invoked units.
    pub fn step_in(&mut self, name: &Id) -> Result<StepEvent, FaultContext> {
        self.debug_step(name, Cursor::step_in)
    }

    /// Steps to the next statement without stopping in invoked units.
    pub fn step_over(&mut self, name: &Id) -> Result<StepEvent, FaultContext> {
        self.debug_step(name, Cursor::step_over)
    }

    /// Steps until the innermost invoked unit returns.
    pub fn step_out(&mut self, name: &Id) -> Result<StepEvent, FaultContext> {
        self.debug_step(name, Cursor::step_out)
    }

    /// The location of the unit that runs on the next step of the program.
    pub fn current_span(&self, name: &Id) -> Option<SourceSpan> {
        let record = &self.programs[self.index(name)?];
        self.machine.units.span(record.cursor.current()?)
    }

    pub fn call_depth(&self, name: &Id) -> usize {
        self.index(name)
            .map(|index| self.programs[index].cursor.call_depth())
            .unwrap_or_default()
    }

    /// Returns true while a cycle of the program is in progress.
    pub fn is_suspended(&self, name: &Id) -> bool {
        self.index(name)
            .is_some_and(|index| !self.programs[index].cursor.is_idle())
    }

    /// Finds a variable by path. The path is either `Program.Variable`
    /// or the name of a global variable.
    fn lookup(&self, path: &str) -> Option<VarId> {
        match path.split_once('.') {
            Some((program, variable)) => {
                let record = &self.programs[self.index(&Id::from(program))?];
                self.machine
                    .pou(record.pou)?
                    .variable(&self.machine.memory, &Id::from(variable))
            }
            None => self.global(&Id::from(path)),
        }
    }

    pub fn global(&self, name: &Id) -> Option<VarId> {
        self.globals.iter().copied().find(|var| {
            self.machine
                .memory
                .get(*var)
                .is_some_and(|variable| variable.name == *name)
        })
    }

    /// Returns the value of the variable at the path.
    pub fn variable(&self, path: &str) -> Option<&dyn Value> {
        let var = self.lookup(path)?;
        self.machine.memory.value(var).ok()
    }

    /// Returns the value of the variable at the path so that a host can
    /// set the value.
    pub fn variable_mut(&mut self, path: &str) -> Option<&mut dyn Value> {
        let var = self.lookup(path)?;
        self.machine.memory.value_mut(var).ok()
    }

    /// Creates a program of record from a copy of the variables and the
    /// body of another program. The copy starts from the current values
    /// of the variables.
    pub fn instantiate(&mut self, program: &Id, name: Id) -> Result<(), Vec<Diagnostic>> {
        let Some(source) = self.index(program) else {
            return Err(vec![Diagnostic::problem(
                Problem::ProgramNotFound,
                Label::located(program, "Program"),
            )
            .with_context_id("program", program)]);
        };
        let taken = self.programs.iter().any(|record| record.name == name)
            || self
                .machine
                .pous
                .iter()
                .any(|pou| pou.is_function() && pou.name == name);
        if taken {
            return Err(vec![Diagnostic::problem(
                Problem::PouDeclNameDuplicated,
                Label::located(&name, "Instance"),
            )
            .with_context_id("name", &name)]);
        }

        let source_pou = self.programs[source].pou;
        let active: HashSet<UnitId> = self
            .programs
            .iter()
            .flat_map(|record| record.cursor.active_units())
            .collect();
        let (mut pou, _) = self.machine.copy_pou(source_pou, &active)?;
        pou.instance_of = Some(pou.instance_of.unwrap_or(source_pou));
        pou.name = name.clone();
        pou.span = name.span.clone();
        let span = pou.span.clone();
        let body = pou.body;
        let id = self.machine.add_pou(pou);

        let functions = match body.map(|body| self.machine.copy_callees(body)) {
            Some(Ok(functions)) => functions,
            Some(Err(issues)) => {
                self.machine.clear_pou(id);
                return Err(issues);
            }
            None => vec![],
        };
        let record = Self::record(&mut self.machine, name, span, id, functions);
        debug!("Instantiated {} from {}", record.name, program);
        self.programs.push(record);
        Ok(())
    }

    /// Removes a program of record that was created by
    /// [`Self::instantiate`] together with its variables and units.
    pub fn destroy(&mut self, name: &Id) -> Result<(), Vec<Diagnostic>> {
        let index = self.index(name);
        let instance = index.filter(|index| {
            self.machine
                .pou(self.programs[*index].pou)
                .is_some_and(|pou| pou.instance_of.is_some())
        });
        let Some(index) = instance else {
            return Err(vec![Diagnostic::problem(
                Problem::ProgramNotInstance,
                Label::located(name, "Program"),
            )
            .with_context_id("program", name)]);
        };

        self.release(index);
        let record = self.programs.remove(index);
        let mut removed = self.machine.units.destroy(record.root);
        removed += self.machine.clear_pou(record.pou);
        for function in &record.functions {
            removed += self.machine.clear_pou(*function);
        }
        debug!("Destroyed {} with {} units", name, removed);
        Ok(())
    }

    /// Abandons the cycle in progress and releases the units that the
    /// cycle invoked.
    fn release(&mut self, index: usize) {
        let record = &mut self.programs[index];
        for id in record.cursor.active_units() {
            let target = self.machine.units.get(id).and_then(|unit| match &unit.kind {
                UnitKind::Invoke(invocation) | UnitKind::Call(invocation)
                    if invocation.is_called() =>
                {
                    invocation.target
                }
                _ => None,
            });
            if let Some(target) = target {
                self.machine.busy.remove(&target);
            }
        }
        record.cursor.clear();
    }

    fn abort(&mut self, index: usize, fault: Fault) -> FaultContext {
        let record = &self.programs[index];
        let span = record
            .cursor
            .current()
            .and_then(|id| self.machine.units.span(id));
        let program = record.name.clone();
        self.release(index);
        warn!("Aborted cycle of {}: {}", program, fault);
        FaultContext {
            fault,
            program,
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use stint_dsl::common::{FunctionDeclaration, Library, ProgramDeclaration, VarDecl};
    use stint_dsl::core::Id;
    use stint_dsl::textual::{ExprKind, Operator, StmtKind};
    use stint_problems::Problem;

    use crate::config::RuntimeConfig;
    use crate::error::Fault;
    use crate::linker::link;

    use super::{Application, StepEvent};

    fn counter() -> Application {
        let library = Library::new().with_program(
            ProgramDeclaration::new("Main")
                .with_variables(vec![VarDecl::simple("Count", "INT")])
                .with_body(vec![StmtKind::simple_assignment(
                    "Count",
                    ExprKind::binary(
                        Operator::Add,
                        ExprKind::named_variable("Count"),
                        ExprKind::integer(1),
                    ),
                )]),
        );
        link(vec![library], RuntimeConfig::default())
            .unwrap_or_else(|errors| panic!("expected link to succeed: {errors:?}"))
    }

    /// Programs `A` and `B` that both increment `X` through a function.
    fn shared_function() -> Application {
        let program = |name: &str| {
            ProgramDeclaration::new(name)
                .with_variables(vec![VarDecl::simple("X", "INT")])
                .with_body(vec![StmtKind::simple_assignment(
                    "X",
                    ExprKind::call("Inc", vec![ExprKind::named_variable("X")]),
                )])
        };
        let library = Library::new()
            .with_function(
                FunctionDeclaration::new("Inc", "INT")
                    .with_variables(vec![VarDecl::input("Value", "INT")])
                    .with_body(vec![StmtKind::simple_assignment(
                        "Inc",
                        ExprKind::binary(
                            Operator::Add,
                            ExprKind::named_variable("Value"),
                            ExprKind::integer(1),
                        ),
                    )]),
            )
            .with_program(program("A"))
            .with_program(program("B"));
        link(vec![library], RuntimeConfig::default())
            .unwrap_or_else(|errors| panic!("expected link to succeed: {errors:?}"))
    }

    fn count(app: &Application) -> Option<i128> {
        app.variable("Main.Count")?.as_integer()
    }

    #[test]
    fn run_cycle_when_not_started_then_not_started() {
        let mut app = counter();

        let err = app.run_cycle(&Id::from("Main")).unwrap_err();

        assert_eq!(Fault::NotStarted(Id::from("Main")), err.fault);
    }

    #[test]
    fn run_cycle_when_program_undefined_then_program_undefined() {
        let mut app = counter();

        let err = app.run_cycle(&Id::from("Other")).unwrap_err();

        assert_eq!(Fault::ProgramUndefined(Id::from("Other")), err.fault);
    }

    #[test]
    fn run_cycles_when_started_then_state_kept_between_cycles() {
        let mut app = counter();
        let main = Id::from("Main");
        app.start(&main).unwrap();

        app.run_cycles(&main, 3).unwrap();

        assert_eq!(Some(3), count(&app));
    }

    #[test]
    fn start_when_started_again_then_initial_values() {
        let mut app = counter();
        let main = Id::from("Main");
        app.start(&main).unwrap();
        app.run_cycles(&main, 2).unwrap();

        app.start(&main).unwrap();

        assert_eq!(Some(0), count(&app));
        assert!(!app.is_suspended(&main));
    }

    #[test]
    fn step_in_when_idle_then_stops_at_first_statement() {
        let mut app = counter();
        let main = Id::from("Main");
        app.start(&main).unwrap();

        assert_eq!(StepEvent::Suspended, app.step_in(&main).unwrap());

        assert!(app.is_suspended(&main));
        assert!(app.current_span(&main).is_some());
        assert_eq!(Some(0), count(&app));

        app.run_cycle(&main).unwrap();
        assert_eq!(Some(1), count(&app));
        assert!(!app.is_suspended(&main));
    }

    #[test]
    fn instantiate_when_program_then_independent_state() {
        let mut app = counter();
        let main = Id::from("Main");
        let copy = Id::from("Copy");
        app.instantiate(&main, copy.clone()).unwrap();
        app.start_all().unwrap();

        app.run_cycles(&copy, 2).unwrap();
        app.run_cycle(&main).unwrap();

        assert_eq!(Some(1), count(&app));
        assert_eq!(Some(2), app.variable("Copy.Count").unwrap().as_integer());
    }

    #[test]
    fn run_cycle_when_other_program_suspended_in_function_then_runs() {
        let mut app = shared_function();
        let (a, b) = (Id::from("A"), Id::from("B"));
        app.start_all().unwrap();
        app.step_in(&a).unwrap();
        let depth = app.call_depth(&a);
        app.step_in(&a).unwrap();
        assert!(app.call_depth(&a) > depth);

        app.run_cycle(&b).unwrap();
        app.run_cycle(&b).unwrap();
        app.run_cycle(&a).unwrap();

        assert_eq!(Some(1), app.variable("A.X").unwrap().as_integer());
        assert_eq!(Some(2), app.variable("B.X").unwrap().as_integer());
    }

    #[test]
    fn run_cycle_when_instance_suspended_in_function_then_source_runs() {
        let mut app = shared_function();
        let (a, copy) = (Id::from("A"), Id::from("Copy"));
        app.instantiate(&a, copy.clone()).unwrap();
        app.start_all().unwrap();
        app.step_in(&copy).unwrap();
        app.step_in(&copy).unwrap();

        app.run_cycle(&a).unwrap();
        app.run_cycle(&copy).unwrap();

        assert_eq!(Some(1), app.variable("A.X").unwrap().as_integer());
        assert_eq!(Some(1), app.variable("Copy.X").unwrap().as_integer());
    }

    #[test]
    fn destroy_when_instance_invokes_function_then_source_still_runs() {
        let mut app = shared_function();
        let (a, copy) = (Id::from("A"), Id::from("Copy"));
        app.instantiate(&a, copy.clone()).unwrap();
        app.start_all().unwrap();
        app.run_cycle(&copy).unwrap();

        app.destroy(&copy).unwrap();
        app.run_cycle(&a).unwrap();

        assert_eq!(Some(1), app.variable("A.X").unwrap().as_integer());
    }

    #[test]
    fn instantiate_when_program_undefined_then_program_not_found() {
        let mut app = counter();

        let errors = app
            .instantiate(&Id::from("Other"), Id::from("Copy"))
            .unwrap_err();

        assert_eq!(Problem::ProgramNotFound.code(), errors[0].code);
    }

    #[test]
    fn instantiate_when_name_taken_then_duplicated() {
        let mut app = counter();

        let errors = app
            .instantiate(&Id::from("Main"), Id::from("Main"))
            .unwrap_err();

        assert_eq!(Problem::PouDeclNameDuplicated.code(), errors[0].code);
    }

    #[test]
    fn instantiate_when_source_suspended_then_unit_executing() {
        let mut app = counter();
        let main = Id::from("Main");
        app.start(&main).unwrap();
        app.step_in(&main).unwrap();

        let errors = app.instantiate(&main, Id::from("Copy")).unwrap_err();

        assert_eq!(Problem::UnitExecuting.code(), errors[0].code);
        assert_eq!(1, app.programs().count());
    }

    #[test]
    fn destroy_when_instance_then_removed() {
        let mut app = counter();
        let copy = Id::from("Copy");
        app.instantiate(&Id::from("Main"), copy.clone()).unwrap();

        app.destroy(&copy).unwrap();

        assert_eq!(1, app.programs().count());
        assert!(app.variable("Copy.Count").is_none());
    }

    #[test]
    fn destroy_when_declared_program_then_program_not_instance() {
        let mut app = counter();

        let errors = app.destroy(&Id::from("Main")).unwrap_err();

        assert_eq!(Problem::ProgramNotInstance.code(), errors[0].code);
    }
}
