//! Rejects functions and programs that invoke themselves.
//!
//! Each body is a single set of units, so a unit that is already executing
//! cannot be entered again. The invocations form a directed graph over the
//! functions and programs and the graph must be acyclic.
//!
//! ## Passes
//!
//! ```ignore
//! FUNCTION Callee : INT
//! END_FUNCTION
//!
//! PROGRAM Caller
//!    VAR x : INT; END_VAR
//!    x := Callee();
//! END_PROGRAM
//! ```
//!
//! ## Fails
//!
//! ```ignore
//! FUNCTION SelfRecursive : INT
//!    SelfRecursive := SelfRecursive();
//! END_FUNCTION
//! ```
use std::collections::HashMap;

use log::debug;
use petgraph::{
    algo::toposort,
    stable_graph::{NodeIndex, StableDiGraph},
};
use stint_dsl::diagnostic::{Diagnostic, Label};
use stint_problems::Problem;

use crate::pou::PouId;
use crate::unit::UnitKind;

use super::Linker;

impl Linker {
    /// Checks that no function or program invokes itself, directly or
    /// through other units.
    pub fn check_recursion(&self) -> Result<(), Vec<Diagnostic>> {
        let machine = &self.machine;
        let mut graph: StableDiGraph<(), (), u32> = StableDiGraph::new();
        let mut id_to_index: HashMap<PouId, NodeIndex> = HashMap::new();
        let mut index_to_id: HashMap<NodeIndex, PouId> = HashMap::new();

        let mut node = |graph: &mut StableDiGraph<(), (), u32>, id: PouId| {
            *id_to_index.entry(id).or_insert_with(|| {
                let index = graph.add_node(());
                index_to_id.insert(index, id);
                index
            })
        };

        let mut edges = 0;
        for (position, pou) in machine.pous.iter().enumerate() {
            let caller = node(&mut graph, PouId::new(position));
            let Some(body) = pou.body else {
                continue;
            };
            for unit in machine.units.descendants(body) {
                let target = machine.units.get(unit).and_then(|unit| match &unit.kind {
                    UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => {
                        invocation.target
                    }
                    _ => None,
                });
                if let Some(target) = target {
                    let callee = node(&mut graph, target);
                    graph.add_edge(caller, callee, ());
                    edges += 1;
                }
            }
        }
        debug!("Checked invocation graph with {} edges", edges);

        toposort(&graph, None).map_err(|err| {
            let pou = index_to_id
                .get(&err.node_id())
                .and_then(|id| machine.pou(*id));
            match pou {
                Some(pou) => vec![Diagnostic::problem(
                    Problem::RecursiveCycle,
                    Label::span(pou.span.clone(), "Cycle"),
                )
                .with_context_id("unit", &pou.name)],
                None => vec![Diagnostic::internal_error(file!(), line!())],
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stint_dsl::common::{FunctionDeclaration, Library, ProgramDeclaration, VarDecl};
    use stint_dsl::textual::{ExprKind, StmtKind};
    use stint_problems::Problem;

    use crate::config::RuntimeConfig;
    use crate::linker::Linker;

    fn resolved(library: Library) -> Linker {
        let mut linker = Linker::new(RuntimeConfig::default());
        if linker.add_library(library).is_err()
            || linker.resolve_types().is_err()
            || linker.finalize_header().is_err()
            || linker.build_bodies().is_err()
            || linker.resolve_bodies().is_err()
        {
            panic!("expected library to resolve");
        }
        linker
    }

    fn calls(name: &str, callee: &str) -> FunctionDeclaration {
        FunctionDeclaration::new(name, "INT").with_body(vec![StmtKind::simple_assignment(
            name,
            ExprKind::call(callee, vec![]),
        )])
    }

    #[test]
    fn check_recursion_when_chain_then_ok() {
        let linker = resolved(
            Library::new()
                .with_function(calls("A", "B"))
                .with_function(calls("B", "C"))
                .with_function(FunctionDeclaration::new("C", "INT")),
        );
        assert!(linker.check_recursion().is_ok());
    }

    #[test]
    fn check_recursion_when_self_invocation_then_recursive_cycle() {
        let linker = resolved(Library::new().with_function(calls("A", "A")));

        let errors = linker.check_recursion().unwrap_err();

        assert_eq!(1, errors.len());
        assert_eq!(Problem::RecursiveCycle.code(), errors[0].code);
    }

    #[test]
    fn check_recursion_when_mutual_invocation_then_recursive_cycle() {
        let linker = resolved(
            Library::new()
                .with_function(calls("A", "B"))
                .with_function(calls("B", "A")),
        );

        let errors = linker.check_recursion().unwrap_err();

        assert_eq!(Problem::RecursiveCycle.code(), errors[0].code);
    }

    #[test]
    fn check_recursion_when_program_invokes_itself_then_recursive_cycle() {
        let linker = resolved(Library::new().with_program(
            ProgramDeclaration::new("Main")
                .with_variables(vec![VarDecl::simple("Level", "INT")])
                .with_body(vec![StmtKind::invoke("Main", vec![])]),
        ));

        let errors = linker.check_recursion().unwrap_err();

        assert_eq!(Problem::RecursiveCycle.code(), errors[0].code);
    }
}
