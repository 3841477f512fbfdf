//! Runs programs cycle by cycle and step by step.
mod common;

use common::{integer, main_program, start, start_one};
use stint_dsl::common::{ConstantKind, FunctionDeclaration, Library, ProgramDeclaration, VarDecl};
use stint_dsl::textual::{
    CaseSelectionKind, CompareOp, ExprKind, Operator, ParamAssignmentKind, StmtKind, Variable,
};
use stint_runtime::datatypes::IntegerValue;
use stint_runtime::{Fault, FaultClass, RuntimeConfig, StepEvent};

fn main_with(variables: Vec<VarDecl>, body: Vec<StmtKind>) -> Library {
    Library::new().with_program(
        ProgramDeclaration::new("Main")
            .with_variables(variables)
            .with_body(body),
    )
}

fn increment(name: &str) -> StmtKind {
    StmtKind::simple_assignment(
        name,
        ExprKind::binary(
            Operator::Add,
            ExprKind::named_variable(name),
            ExprKind::integer(1),
        ),
    )
}

fn double() -> FunctionDeclaration {
    FunctionDeclaration::new("Double", "INT")
        .with_variables(vec![VarDecl::input("Value", "INT")])
        .with_body(vec![StmtKind::simple_assignment(
            "Double",
            ExprKind::binary(
                Operator::Mul,
                ExprKind::named_variable("Value"),
                ExprKind::integer(2),
            ),
        )])
}

#[test]
fn run_cycle_when_function_in_expression_then_result_used() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![StmtKind::simple_assignment(
            "X",
            ExprKind::binary(
                Operator::Add,
                ExprKind::call("Double", vec![ExprKind::integer(3)]),
                ExprKind::integer(1),
            ),
        )],
    )
    .with_function(double());
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(7, integer(&app, "Main.X"));
}

#[test]
fn step_in_when_function_in_expression_then_stops_in_function_body() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![StmtKind::simple_assignment(
            "X",
            ExprKind::binary(
                Operator::Add,
                ExprKind::call("Double", vec![ExprKind::integer(3)]),
                ExprKind::integer(1),
            ),
        )],
    )
    .with_function(double());
    let mut app = start_one(library);
    let main = main_program();

    assert_eq!(StepEvent::Suspended, app.step_in(&main).unwrap());
    let caller_depth = app.call_depth(&main);

    assert_eq!(StepEvent::Suspended, app.step_in(&main).unwrap());
    assert!(app.call_depth(&main) > caller_depth);

    assert_eq!(StepEvent::Suspended, app.step_out(&main).unwrap());
    assert!(app.call_depth(&main) > caller_depth);
    assert_eq!(0, integer(&app, "Main.X"));

    app.run_cycle(&main).unwrap();
    assert_eq!(7, integer(&app, "Main.X"));
    assert!(!app.is_suspended(&main));
}

#[test]
fn step_over_when_statements_then_stops_at_each_statement() {
    let library = main_with(
        vec![VarDecl::simple("A", "INT"), VarDecl::simple("B", "INT")],
        vec![increment("A"), increment("B")],
    );
    let mut app = start_one(library);
    let main = main_program();

    assert_eq!(StepEvent::Suspended, app.step_over(&main).unwrap());
    assert_eq!(0, integer(&app, "Main.A"));

    assert_eq!(StepEvent::Suspended, app.step_over(&main).unwrap());
    assert_eq!(1, integer(&app, "Main.A"));
    assert_eq!(0, integer(&app, "Main.B"));

    assert_eq!(StepEvent::CycleFinished, app.step_over(&main).unwrap());
    assert_eq!(1, integer(&app, "Main.B"));
}

#[test]
fn step_when_repeated_then_same_result_as_run_cycle() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![StmtKind::simple_assignment(
            "X",
            ExprKind::call("Double", vec![ExprKind::call("Double", vec![ExprKind::integer(5)])]),
        )],
    )
    .with_function(double());
    let mut app = start_one(library);
    let main = main_program();

    let mut steps = 0;
    while app.step(&main).unwrap() == StepEvent::Suspended {
        steps += 1;
    }

    assert!(steps > 3);
    assert_eq!(20, integer(&app, "Main.X"));
}

#[test]
fn run_cycle_when_exit_in_for_loop_then_rest_of_body_skipped_and_next_statement_runs() {
    let library = main_with(
        vec![
            VarDecl::simple("I", "INT"),
            VarDecl::simple("Last", "INT"),
            VarDecl::simple("Trail", "INT"),
            VarDecl::simple("After", "INT"),
        ],
        vec![
            StmtKind::for_loop(
                "I",
                ExprKind::integer(1),
                ExprKind::integer(3),
                None,
                vec![
                    StmtKind::simple_assignment("Last", ExprKind::named_variable("I")),
                    StmtKind::if_then(
                        ExprKind::compare(
                            CompareOp::Eq,
                            ExprKind::named_variable("I"),
                            ExprKind::integer(2),
                        ),
                        vec![StmtKind::exit()],
                    ),
                    increment("Trail"),
                ],
            ),
            StmtKind::simple_assignment("After", ExprKind::integer(9)),
        ],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(2, integer(&app, "Main.Last"));
    assert_eq!(2, integer(&app, "Main.I"));
    assert_eq!(1, integer(&app, "Main.Trail"));
    assert_eq!(9, integer(&app, "Main.After"));
}

#[test]
fn run_cycle_when_nested_loops_with_exit_then_only_inner_loop_ends() {
    let library = main_with(
        vec![
            VarDecl::simple("I", "INT"),
            VarDecl::simple("J", "INT"),
            VarDecl::simple("Count", "INT"),
        ],
        vec![StmtKind::for_loop(
            "I",
            ExprKind::integer(1),
            ExprKind::integer(3),
            None,
            vec![StmtKind::for_loop(
                "J",
                ExprKind::integer(1),
                ExprKind::integer(3),
                None,
                vec![increment("Count"), StmtKind::exit()],
            )],
        )],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(3, integer(&app, "Main.Count"));
}

#[test]
fn run_cycle_when_for_loop_with_negative_step_then_counts_down() {
    let library = main_with(
        vec![VarDecl::simple("I", "INT"), VarDecl::simple("Sum", "INT")],
        vec![StmtKind::for_loop(
            "I",
            ExprKind::integer(3),
            ExprKind::integer(1),
            Some(ExprKind::integer(-1)),
            vec![StmtKind::simple_assignment(
                "Sum",
                ExprKind::binary(
                    Operator::Add,
                    ExprKind::named_variable("Sum"),
                    ExprKind::named_variable("I"),
                ),
            )],
        )],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(6, integer(&app, "Main.Sum"));
}

#[test]
fn run_cycle_when_while_and_repeat_then_loops_until_condition() {
    let library = main_with(
        vec![VarDecl::simple("A", "INT"), VarDecl::simple("B", "INT")],
        vec![
            StmtKind::while_loop(
                ExprKind::compare(CompareOp::Lt, ExprKind::named_variable("A"), ExprKind::integer(4)),
                vec![increment("A")],
            ),
            StmtKind::repeat(
                vec![increment("B")],
                ExprKind::compare(CompareOp::GtEq, ExprKind::named_variable("B"), ExprKind::integer(2)),
            ),
        ],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(4, integer(&app, "Main.A"));
    assert_eq!(2, integer(&app, "Main.B"));
}

#[test]
fn run_cycle_when_case_then_first_matching_group() {
    let library = main_with(
        vec![VarDecl::simple("Selector", "INT"), VarDecl::simple("Result", "INT")],
        vec![
            StmtKind::simple_assignment("Selector", ExprKind::integer(5)),
            StmtKind::case(
                ExprKind::named_variable("Selector"),
                vec![
                    (
                        vec![CaseSelectionKind::integer(1)],
                        vec![StmtKind::simple_assignment("Result", ExprKind::integer(10))],
                    ),
                    (
                        vec![CaseSelectionKind::range(4, 6)],
                        vec![StmtKind::simple_assignment("Result", ExprKind::integer(20))],
                    ),
                ],
                Some(vec![StmtKind::simple_assignment(
                    "Result",
                    ExprKind::integer(30),
                )]),
            ),
        ],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(20, integer(&app, "Main.Result"));
}

#[test]
fn run_cycle_when_case_without_match_or_else_then_nothing() {
    let library = main_with(
        vec![VarDecl::simple("Result", "INT")],
        vec![StmtKind::case(
            ExprKind::integer(9),
            vec![(
                vec![CaseSelectionKind::integer(1)],
                vec![StmtKind::simple_assignment("Result", ExprKind::integer(10))],
            )],
            None,
        )],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(0, integer(&app, "Main.Result"));
}

#[test]
fn run_cycle_when_return_in_function_then_rest_of_body_skipped() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![StmtKind::simple_assignment("X", ExprKind::call("Early", vec![]))],
    )
    .with_function(FunctionDeclaration::new("Early", "INT").with_body(vec![
        StmtKind::simple_assignment("Early", ExprKind::integer(1)),
        StmtKind::return_(),
        StmtKind::simple_assignment("Early", ExprKind::integer(2)),
    ]));
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(1, integer(&app, "Main.X"));
}

#[test]
fn run_cycle_when_return_in_program_then_cycle_ends() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![increment("X"), StmtKind::return_(), increment("X")],
    );
    let mut app = start_one(library);

    app.run_cycles(&main_program(), 2).unwrap();

    assert_eq!(2, integer(&app, "Main.X"));
}

#[test]
fn run_cycle_when_function_output_then_copied_to_target() {
    let library = main_with(
        vec![VarDecl::simple("Done", "BOOL"), VarDecl::simple("X", "INT")],
        vec![StmtKind::simple_assignment(
            "X",
            ExprKind::function(
                "Check",
                vec![
                    ParamAssignmentKind::named("Value", ExprKind::integer(4)),
                    ParamAssignmentKind::output("Ok", Variable::named("Done")),
                ],
            ),
        )],
    )
    .with_function(
        FunctionDeclaration::new("Check", "INT")
            .with_variables(vec![
                VarDecl::input("Value", "INT"),
                VarDecl::output("Ok", "BOOL"),
            ])
            .with_body(vec![
                StmtKind::simple_assignment("Ok", ExprKind::boolean(true)),
                StmtKind::simple_assignment("Check", ExprKind::named_variable("Value")),
            ]),
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(4, integer(&app, "Main.X"));
    assert_eq!(
        Some(true),
        app.variable("Main.Done").and_then(|value| value.as_bool())
    );
}

#[test]
fn run_cycle_when_program_invoked_then_program_keeps_state() {
    let library = main_with(vec![], vec![StmtKind::invoke("Counter", vec![])]).with_program(
        ProgramDeclaration::new("Counter")
            .with_variables(vec![VarDecl::simple("Count", "INT")])
            .with_body(vec![increment("Count")]),
    );
    let mut app = start_one(library);

    app.run_cycles(&main_program(), 3).unwrap();

    assert_eq!(3, integer(&app, "Counter.Count"));
}

#[test]
fn run_cycle_when_array_and_structure_then_elements_assigned() {
    let library = main_with(
        vec![
            VarDecl::array("Values", vec![(1, 3)], "INT"),
            VarDecl::simple("I", "INT"),
            VarDecl::simple("Sum", "INT"),
        ],
        vec![
            StmtKind::for_loop(
                "I",
                ExprKind::integer(1),
                ExprKind::integer(3),
                None,
                vec![StmtKind::assignment(
                    Variable::array(Variable::named("Values"), vec![ExprKind::named_variable("I")]),
                    ExprKind::binary(
                        Operator::Mul,
                        ExprKind::named_variable("I"),
                        ExprKind::integer(10),
                    ),
                )],
            ),
            StmtKind::simple_assignment(
                "Sum",
                ExprKind::binary(
                    Operator::Add,
                    ExprKind::Variable(Variable::array(
                        Variable::named("Values"),
                        vec![ExprKind::integer(1)],
                    )),
                    ExprKind::Variable(Variable::array(
                        Variable::named("Values"),
                        vec![ExprKind::integer(3)],
                    )),
                ),
            ),
        ],
    );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();

    assert_eq!(40, integer(&app, "Main.Sum"));
}

#[test]
fn run_cycle_when_subscript_outside_range_then_failure() {
    let library = main_with(
        vec![
            VarDecl::array("Values", vec![(1, 3)], "INT"),
            VarDecl::simple("I", "INT").with_initial(ConstantKind::integer(4)),
        ],
        vec![StmtKind::assignment(
            Variable::array(Variable::named("Values"), vec![ExprKind::named_variable("I")]),
            ExprKind::integer(1),
        )],
    );
    let mut app = start_one(library);

    let err = app.run_cycle(&main_program()).unwrap_err();

    assert_eq!(FaultClass::Failure, err.fault.class());
    assert_eq!("R0004", err.diagnostics()[0].code);
}

#[test]
fn run_cycle_when_sum_exceeds_type_then_overflow() {
    let library = main_with(
        vec![VarDecl::simple("Small", "SINT").with_initial(ConstantKind::integer(127))],
        vec![increment("Small")],
    );
    let mut app = start_one(library);
    let main = main_program();

    let err = app.run_cycle(&main).unwrap_err();

    assert_eq!(FaultClass::Overflow, err.fault.class());
    assert_eq!("R0001", err.diagnostics()[0].code);
    assert!(err.span.is_some());
    assert!(!app.is_suspended(&main));
    assert_eq!(127, integer(&app, "Main.Small"));
}

#[test]
fn run_cycle_when_difference_below_type_then_underflow() {
    let library = main_with(
        vec![VarDecl::simple("Small", "SINT").with_initial(ConstantKind::integer(-128))],
        vec![StmtKind::simple_assignment(
            "Small",
            ExprKind::binary(
                Operator::Sub,
                ExprKind::named_variable("Small"),
                ExprKind::integer(1),
            ),
        )],
    );
    let mut app = start_one(library);

    let err = app.run_cycle(&main_program()).unwrap_err();

    assert_eq!(FaultClass::Underflow, err.fault.class());
    assert_eq!("R0002", err.diagnostics()[0].code);
}

#[test]
fn run_cycle_when_fault_in_function_then_function_can_run_again() {
    let library = main_with(
        vec![
            VarDecl::simple("Input", "INT").with_initial(ConstantKind::integer(20000)),
            VarDecl::simple("X", "INT"),
        ],
        vec![StmtKind::simple_assignment(
            "X",
            ExprKind::call("Double", vec![ExprKind::named_variable("Input")]),
        )],
    )
    .with_function(double());
    let mut app = start_one(library);
    let main = main_program();

    let err = app.run_cycle(&main).unwrap_err();
    assert_eq!(FaultClass::Overflow, err.fault.class());

    let five = IntegerValue::literal(5).unwrap();
    app.variable_mut("Main.Input").unwrap().assign(&five).unwrap();
    app.run_cycle(&main).unwrap();

    assert_eq!(10, integer(&app, "Main.X"));
}

#[test]
fn run_cycle_when_step_budget_exceeded_then_cycle_aborted() {
    let library = main_with(
        vec![VarDecl::simple("X", "INT")],
        vec![StmtKind::while_loop(ExprKind::boolean(true), vec![increment("X")])],
    );
    let mut app = start(
        vec![library],
        RuntimeConfig::default().with_max_steps_per_cycle(100),
    );
    let main = main_program();

    let err = app.run_cycle(&main).unwrap_err();

    assert_eq!(Fault::StepBudgetExceeded(100), err.fault);
    assert!(!app.is_suspended(&main));
    assert!(integer(&app, "Main.X") > 0);
}

#[test]
fn variable_when_global_then_shared_by_programs() {
    let library = Library::new()
        .with_globals(vec![VarDecl::simple("Total", "INT")])
        .with_program(
            ProgramDeclaration::new("Main").with_body(vec![increment("Total")]),
        )
        .with_program(
            ProgramDeclaration::new("Other").with_body(vec![increment("Total")]),
        );
    let mut app = start_one(library);

    app.run_cycle(&main_program()).unwrap();
    app.run_cycle(&stint_dsl::core::Id::from("Other")).unwrap();

    assert_eq!(2, integer(&app, "Total"));
}
