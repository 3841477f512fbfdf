//! Links declarations from several libraries in any order.
mod common;

use common::{init_logging, integer, link_errors, main_program, start, start_one};
use rstest::rstest;
use stint_dsl::common::{
    AddressAssignment, AddressLocation, AddressSize, ConstantKind, DataTypeDeclaration, Library,
    ProgramDeclaration, TypeName, TypeSpecificationKind, VarDecl,
};
use stint_dsl::core::FileId;
use stint_dsl::diagnostic::Severity;
use stint_dsl::textual::{CaseSelectionKind, ExprKind, StmtKind};
use stint_problems::Problem;
use stint_runtime::{link, Linker, RuntimeConfig};

fn program_with(variables: Vec<VarDecl>) -> Library {
    Library::new().with_program(ProgramDeclaration::new("Main").with_variables(variables))
}

fn codes(errors: &[stint_dsl::diagnostic::Diagnostic]) -> Vec<String> {
    errors.iter().map(|err| err.code.clone()).collect()
}

#[rstest]
#[case(false)]
#[case(true)]
fn link_when_type_declared_in_other_library_then_resolved(#[case] reversed: bool) {
    let uses = program_with(vec![
        VarDecl::simple("Speed", "Rpm").with_initial(ConstantKind::integer(12))
    ]);
    let declares = Library::new()
        .with_type(DataTypeDeclaration::derived("Rpm", "Base"))
        .with_type(DataTypeDeclaration::derived("Base", "INT"));
    let libraries = if reversed {
        vec![declares, uses]
    } else {
        vec![uses, declares]
    };

    let app = start(libraries, RuntimeConfig::default());

    assert_eq!(12, integer(&app, "Main.Speed"));
}

#[rstest]
#[case(false)]
#[case(true)]
fn link_when_each_variable_typed_in_other_library_then_both_resolved(#[case] reversed: bool) {
    let first = Library::new()
        .with_type(DataTypeDeclaration::derived("Pressure", "INT"))
        .with_globals(vec![
            VarDecl::simple("Flow", "Volume").with_initial(ConstantKind::integer(7))
        ])
        .with_program(ProgramDeclaration::new("Main"));
    let second = Library::new()
        .with_type(DataTypeDeclaration::derived("Volume", "DINT"))
        .with_globals(vec![
            VarDecl::simple("Tank", "Pressure").with_initial(ConstantKind::integer(3))
        ]);
    let libraries = if reversed {
        vec![second, first]
    } else {
        vec![first, second]
    };

    let app = start(libraries, RuntimeConfig::default());

    assert_eq!(7, integer(&app, "Flow"));
    assert_eq!(3, integer(&app, "Tank"));
}

#[test]
fn link_when_derived_chain_then_concrete_type_of_last() {
    let library = program_with(vec![
        VarDecl::simple("Value", "A").with_initial(ConstantKind::integer(40000))
    ])
    .with_type(DataTypeDeclaration::derived("A", "B"))
    .with_type(DataTypeDeclaration::derived("B", "C"))
    .with_type(DataTypeDeclaration::derived("C", "INT"));

    let errors = link_errors(vec![library]);

    assert_eq!(vec![Problem::InitialValueInvalid.code()], codes(&errors));
}

#[test]
fn link_when_derived_cycle_then_circular_type_reference() {
    let library = program_with(vec![VarDecl::simple("Value", "A")])
        .with_type(DataTypeDeclaration::derived("A", "B"))
        .with_type(DataTypeDeclaration::derived("B", "A"));

    let errors = link_errors(vec![library]);

    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .all(|err| err.code == Problem::CircularTypeReference.code()));
}

#[test]
fn link_when_derived_default_then_variable_starts_at_default() {
    let library = program_with(vec![VarDecl::simple("Level", "Setpoint")]).with_type(
        DataTypeDeclaration {
            type_name: TypeName::from("Setpoint"),
            spec: TypeSpecificationKind::Derived {
                base: TypeName::from("INT"),
                default: Some(ConstantKind::integer(5)),
            },
        },
    );

    let app = start_one(library);

    assert_eq!(5, integer(&app, "Main.Level"));
}

#[test]
fn link_when_structure_element_type_declared_later_then_resolved() {
    let library = Library::new()
        .with_type(DataTypeDeclaration::structure(
            "Motor",
            vec![("Speed", "Rpm"), ("Running", "BOOL")],
        ))
        .with_program(
            ProgramDeclaration::new("Main")
                .with_variables(vec![VarDecl::simple("Pump", "Motor")])
                .with_body(vec![StmtKind::assignment(
                    stint_dsl::textual::Variable::structured(vec!["Pump", "Speed"]),
                    ExprKind::integer(300),
                )]),
        )
        .with_type(DataTypeDeclaration::derived("Rpm", "INT"));
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    let pump = app.variable("Main.Pump").unwrap();
    assert_eq!(Some(300), pump.child(0).and_then(|speed| speed.as_integer()));
}

#[test]
fn link_when_address_size_matches_type_declared_later_then_ok() {
    let uses = Library::new().with_globals(vec![VarDecl::simple("Level", "Reading")
        .with_address(AddressAssignment::new(
            AddressLocation::Input,
            AddressSize::Word,
            vec![0],
        ))]);
    let declares = Library::new()
        .with_type(DataTypeDeclaration::derived("Reading", "INT"))
        .with_program(ProgramDeclaration::new("Main"));

    init_logging();
    assert!(link(vec![uses, declares], RuntimeConfig::default()).is_ok());
}

#[test]
fn link_when_bit_address_on_type_declared_later_then_direct_address_invalid() {
    let uses = Library::new().with_globals(vec![VarDecl::simple("Level", "Reading")
        .with_address(AddressAssignment::new(
            AddressLocation::Input,
            AddressSize::Bit,
            vec![0, 1],
        ))]);
    let declares = Library::new()
        .with_type(DataTypeDeclaration::derived("Reading", "INT"))
        .with_program(ProgramDeclaration::new("Main"));

    let errors = link_errors(vec![uses, declares]);

    assert_eq!(vec![Problem::DirectAddressInvalid.code()], codes(&errors));
}

#[test]
fn link_when_type_undefined_then_every_referrer_reported() {
    let library = program_with(vec![
        VarDecl::simple("First", "Missing"),
        VarDecl::simple("Second", "Missing"),
    ]);

    let errors = link_errors(vec![library]);

    assert_eq!(2, errors.len());
    assert!(errors
        .iter()
        .all(|err| err.code == Problem::UndefinedReference.code()));
}

#[test]
fn link_when_no_declarations_then_no_content_in_file() {
    let file_id = FileId::from_string("empty.st");

    let errors = link_errors(vec![Library::new().with_file_id(file_id.clone())]);

    assert_eq!(vec![Problem::NoContent.code()], codes(&errors));
    assert_eq!(file_id, errors[0].primary.span.file_id);
}

#[test]
fn link_when_exit_outside_loop_then_exit_outside_loop() {
    let library = Library::new().with_program(
        ProgramDeclaration::new("Main").with_body(vec![StmtKind::exit()]),
    );

    let errors = link_errors(vec![library]);

    assert_eq!(vec![Problem::ExitOutsideLoop.code()], codes(&errors));
}

#[test]
fn link_when_errors_in_two_programs_then_both_reported() {
    let library = Library::new()
        .with_program(ProgramDeclaration::new("Main").with_body(vec![StmtKind::exit()]))
        .with_program(ProgramDeclaration::new("Other").with_body(vec![StmtKind::exit()]));

    let errors = link_errors(vec![library]);

    assert_eq!(2, errors.len());
}

#[test]
fn link_when_mutual_invocation_then_recursive_cycle() {
    let library = Library::new()
        .with_program(ProgramDeclaration::new("Main").with_body(vec![StmtKind::invoke(
            "Other",
            vec![],
        )]))
        .with_program(ProgramDeclaration::new("Other").with_body(vec![StmtKind::invoke(
            "Main",
            vec![],
        )]));

    let errors = link_errors(vec![library]);

    assert_eq!(vec![Problem::RecursiveCycle.code()], codes(&errors));
}

fn duplicate_case() -> Library {
    Library::new().with_program(
        ProgramDeclaration::new("Main")
            .with_variables(vec![VarDecl::simple("Result", "INT")])
            .with_body(vec![StmtKind::case(
                ExprKind::integer(1),
                vec![
                    (
                        vec![],
                        vec![StmtKind::simple_assignment("Result", ExprKind::integer(1))],
                    ),
                    (
                        vec![CaseSelectionKind::integer(1)],
                        vec![StmtKind::simple_assignment("Result", ExprKind::integer(2))],
                    ),
                    (
                        vec![CaseSelectionKind::range(0, 3)],
                        vec![StmtKind::simple_assignment("Result", ExprKind::integer(3))],
                    ),
                ],
                None,
            )]),
    )
}

#[test]
fn link_when_case_values_overlap_or_group_empty_then_warnings() {
    let mut app = start_one(duplicate_case());

    let warnings = codes(app.warnings());
    assert!(warnings.contains(&Problem::CaseGroupEmpty.code().to_string()));
    assert!(warnings.contains(&Problem::CaseValueDuplicated.code().to_string()));
    assert!(app
        .warnings()
        .iter()
        .all(|warning| warning.severity == Severity::Warning));

    app.run_cycle(&main_program()).unwrap();
    assert_eq!(2, integer(&app, "Main.Result"));
}

#[test]
fn link_when_warnings_as_errors_then_warnings_fail_link() {
    init_logging();
    let config = RuntimeConfig::default().with_warnings_as_errors(true);

    let errors = match link(vec![duplicate_case()], config) {
        Ok(_) => panic!("expected link to fail"),
        Err(errors) => errors,
    };

    assert_eq!(2, errors.len());
    assert!(errors.iter().all(|err| err.severity == Severity::Error));
}

#[test]
fn resolve_types_when_reset_and_resolved_again_then_same_result() {
    init_logging();
    let mut linker = Linker::new(RuntimeConfig::default());
    let added = linker.add_library(
        program_with(vec![VarDecl::simple("Speed", "Rpm")])
            .with_type(DataTypeDeclaration::derived("Rpm", "INT")),
    );
    assert!(added.is_ok());
    assert!(linker.resolve_types().is_ok());

    linker.reset_resolved();
    assert!(linker.resolve_types().is_ok());
    assert!(linker.finalize_header().is_ok());
    assert!(linker.finalize_header().is_ok());
    assert!(linker.build_bodies().is_ok());
    assert!(linker.resolve_bodies().is_ok());
    assert!(linker.check_recursion().is_ok());
    assert!(linker.finalize_statements().is_ok());
    let mut app = match linker.finish() {
        Ok(app) => app,
        Err(errors) => panic!("expected finish to succeed: {errors:?}"),
    };

    app.start_all().unwrap();
    assert_eq!(0, integer(&app, "Main.Speed"));
}

#[test]
fn add_library_when_types_added_after_first_resolution_then_resolved_after_reset() {
    init_logging();
    let mut linker = Linker::new(RuntimeConfig::default());
    assert!(linker
        .add_library(program_with(vec![VarDecl::simple("Speed", "Rpm")]))
        .is_ok());
    assert!(linker.resolve_types().is_err());

    assert!(linker
        .add_library(Library::new().with_type(DataTypeDeclaration::derived("Rpm", "INT")))
        .is_ok());
    linker.reset_resolved();

    assert!(linker.resolve_types().is_ok());
}
