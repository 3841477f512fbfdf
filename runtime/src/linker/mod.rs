//! Links unlinked declarations into an executable application.
//!
//! Linking runs in stages. Each stage reports every problem it finds and
//! the next stage only runs when the previous stage succeeded.
//!
//! 1. [`Linker::add_library`] declares the types, variables and units of
//!    one library. Names may refer to declarations in any library.
//! 2. [`Linker::resolve_types`] binds type names and creates the types.
//! 3. [`Linker::finalize_header`] creates the variable values.
//! 4. [`Linker::build_bodies`] creates the units of the bodies.
//! 5. [`Linker::resolve_bodies`] binds the names used in the bodies.
//! 6. [`Linker::check_recursion`] rejects recursive invocation.
//! 7. [`Linker::finalize_statements`] gives enumerated values the type
//!    that the place of use expects and then allocates and verifies the
//!    units.
//! 8. [`Linker::finish`] creates the application.
mod bodies;
mod enumerations;
mod headers;
mod recursion;
mod types;

use std::collections::{HashMap, HashSet};
use std::mem;

use log::debug;
use stint_dsl::{
    common::{ConstantKind, Library, LibraryElementKind},
    core::{Id, Located},
    diagnostic::{Diagnostic, Label, Severity},
    textual::StmtKind,
};
use stint_problems::Problem;

use crate::application::Application;
use crate::config::RuntimeConfig;
use crate::machine::Machine;
use crate::memory::VarId;
use crate::pou::PouId;
use crate::reference_pool::NamedReferencePool;
use crate::type_table::{TypeId, TypeTable};
use crate::unit::{UnitId, VerifyScope};

/// What refers to a type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeReferrer {
    /// The base of a derived type.
    Ancestor(TypeId),
    ArrayElement(TypeId),
    /// The type of the structure element at the position.
    StructElement(TypeId, usize),
    Variable(VarId),
}

/// What a name in a body refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Variable(VarId),
    Program(PouId),
    Function(PouId),
    /// A value of the enumeration.
    EnumValue(TypeId),
}

pub(crate) type TypePool = NamedReferencePool<TypeId, TypeReferrer, Linker>;
pub(crate) type BodyPool = NamedReferencePool<Symbol, UnitId, Linker>;

pub struct Linker {
    config: RuntimeConfig,
    table: TypeTable,
    machine: Machine,
    type_pool: TypePool,
    /// The declared type of each variable.
    var_types: HashMap<VarId, TypeId>,
    initials: HashMap<VarId, ConstantKind>,
    globals: Vec<VarId>,
    pou_names: HashMap<Id, PouId>,
    /// Programs in declaration order.
    programs: Vec<PouId>,
    /// Bodies that have not been built.
    pending: Vec<(PouId, Vec<StmtKind>)>,
    /// Names used in the bodies that are not yet bound.
    body_references: Vec<bodies::BodyReferences>,
    /// Problems already reported while creating types.
    reported: HashSet<String>,
    warnings: Vec<Diagnostic>,
}

impl Linker {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            table: TypeTable::new(),
            machine: Machine::new(),
            type_pool: TypePool::new(Problem::UndefinedReference),
            var_types: HashMap::new(),
            initials: HashMap::new(),
            globals: vec![],
            pou_names: HashMap::new(),
            programs: vec![],
            pending: vec![],
            body_references: vec![],
            reported: HashSet::new(),
            warnings: vec![],
        }
    }

    pub fn type_table(&self) -> &TypeTable {
        &self.table
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Finds a function or program by name.
    pub fn pou(&self, name: &Id) -> Option<PouId> {
        self.pou_names.get(name).copied()
    }

    /// Declares the elements of the library. References are collected in
    /// a pool for the library that is merged into the pool of the linker.
    pub fn add_library(&mut self, library: Library) -> Result<(), Vec<Diagnostic>> {
        let mut pool = TypePool::new(Problem::UndefinedReference);
        let mut errors = vec![];
        let count = library.elements.len();

        for element in library.elements {
            match element {
                LibraryElementKind::DataTypeDeclaration(decl) => {
                    if let Err(err) = self.declare_type(decl, &mut pool) {
                        errors.push(err);
                    }
                }
                LibraryElementKind::FunctionDeclaration(decl) => {
                    self.declare_function(decl, &mut pool, &mut errors)
                }
                LibraryElementKind::ProgramDeclaration(decl) => {
                    self.declare_program(decl, &mut pool, &mut errors)
                }
                LibraryElementKind::GlobalVariableDeclaration(decl) => {
                    self.declare_globals(decl.variables, &mut pool, &mut errors)
                }
            }
        }

        self.type_pool.merge(pool);
        debug!("Added library {} with {} elements", library.file_id, count);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Clears every type binding so that types can be resolved again
    /// after more libraries are added.
    pub fn reset_resolved(&mut self) {
        self.type_pool.reset_resolved();
        self.table.reset_resolved();
        self.reported.clear();
    }

    /// Allocates and then verifies the body of every unit. Verification
    /// continues with the next unit after a unit fails.
    pub fn finalize_statements(&mut self) -> Result<(), Vec<Diagnostic>> {
        self.infer_enumerations();

        let bodies: Vec<(Id, Option<UnitId>)> = self
            .machine
            .pous
            .iter()
            .map(|pou| (pou.name.clone(), pou.body))
            .collect();

        let mut errors = vec![];
        let mut allocated = vec![];
        for (name, body) in bodies {
            let Some(body) = body else {
                continue;
            };
            match self.machine.allocate_tree(body) {
                Ok(()) => allocated.push((name, body)),
                Err(err) => errors.push(err.with_context_id("unit", &name)),
            }
        }

        for (name, body) in allocated {
            let mut scope = VerifyScope::default();
            if let Err(err) = self.machine.verify(body, &mut scope) {
                errors.push(err.with_context_id("unit", &name));
            }
            self.warnings.append(&mut scope.warnings);
        }

        debug!(
            "Finalized statements with {} errors and {} warnings",
            errors.len(),
            self.warnings.len()
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates the application with a program of record for every
    /// program.
    pub fn finish(self) -> Result<Application, Vec<Diagnostic>> {
        if self.config.warnings_as_errors && !self.warnings.is_empty() {
            return Err(self
                .warnings
                .into_iter()
                .map(|warning| warning.with_severity(Severity::Error))
                .collect());
        }
        Application::new(
            self.machine,
            &self.programs,
            self.globals,
            self.warnings,
            self.config,
        )
    }

    fn swap_type_pool(&mut self) -> TypePool {
        mem::replace(
            &mut self.type_pool,
            TypePool::new(Problem::UndefinedReference),
        )
    }

    /// Reports the problem unless the same problem at the same location
    /// is already reported.
    fn report_once(&mut self, err: Diagnostic) -> Result<(), Diagnostic> {
        let key = format!("{}:{}", err.code, err.primary.span);
        if self.reported.insert(key) {
            Err(err)
        } else {
            Ok(())
        }
    }
}

/// Runs every stage of the linker over the libraries.
pub fn link(libraries: Vec<Library>, config: RuntimeConfig) -> Result<Application, Vec<Diagnostic>> {
    if libraries.iter().all(Library::is_empty) {
        let file_id = libraries
            .first()
            .map(|library| library.file_id.clone())
            .unwrap_or_default();
        return Err(vec![Diagnostic::problem(
            Problem::NoContent,
            Label::file(file_id, "Libraries"),
        )]);
    }

    let mut linker = Linker::new(config);
    let mut errors = vec![];
    for library in libraries {
        if let Err(mut err) = linker.add_library(library) {
            errors.append(&mut err);
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    linker.resolve_types()?;
    linker.finalize_header()?;
    linker.build_bodies()?;
    linker.resolve_bodies()?;
    linker.check_recursion()?;
    linker.finalize_statements()?;
    linker.finish()
}

/// Creates the problem for a name that is declared more than once.
fn duplicated(problem: Problem, name: &Id, first: &dyn Located) -> Diagnostic {
    Diagnostic::problem(problem, Label::located(name, "Duplicate declaration"))
        .with_context_id("name", name)
        .with_secondary(Label::located(first, "First declaration"))
}
