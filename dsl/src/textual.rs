//! Provides definitions of objects from IEC 61131-3 textual languages.
//!
//! See section 3.
use std::fmt;

use crate::common::{ConstantKind, EnumeratedValue, Subrange};
use crate::core::{Id, Located, SourceSpan};

/// A symbolic variable: a name optionally followed by structure element
/// selection and array subscripts, such as `a.b[i + 1].c`.
///
/// See section 2.4.1.2.
#[derive(Debug, PartialEq, Clone)]
pub enum Variable {
    Named(NamedVariable),
    Array(ArrayVariable),
    Structured(StructuredVariable),
}

#[derive(Debug, PartialEq, Clone)]
pub struct NamedVariable {
    pub name: Id,
}

/// Array variable with subscripts, such as `a[1, j]`.
#[derive(Debug, PartialEq, Clone)]
pub struct ArrayVariable {
    pub subscripted_variable: Box<Variable>,
    pub subscripts: Vec<ExprKind>,
}

/// Structure element selection, such as `a.b`.
#[derive(Debug, PartialEq, Clone)]
pub struct StructuredVariable {
    pub record: Box<Variable>,
    pub field: Id,
}

impl Variable {
    pub fn named(name: &str) -> Variable {
        Variable::Named(NamedVariable {
            name: Id::from(name),
        })
    }

    /// Creates a chain of structure element selections from the
    /// parts, such as `["a", "b", "c"]` for `a.b.c`.
    pub fn structured(parts: Vec<&str>) -> Variable {
        let mut parts = parts.into_iter();
        let first = Variable::named(parts.next().unwrap_or_default());
        parts.fold(first, |record, field| Variable::Structured(StructuredVariable {
            record: Box::new(record),
            field: Id::from(field),
        }))
    }

    pub fn array(variable: Variable, subscripts: Vec<ExprKind>) -> Variable {
        Variable::Array(ArrayVariable {
            subscripted_variable: Box::new(variable),
            subscripts,
        })
    }

    pub fn field(self, field: &str) -> Variable {
        Variable::Structured(StructuredVariable {
            record: Box::new(self),
            field: Id::from(field),
        })
    }

    pub fn with_position(self, span: SourceSpan) -> Variable {
        match self {
            Variable::Named(named) => Variable::Named(NamedVariable {
                name: named.name.with_position(span),
            }),
            Variable::Array(array) => Variable::Array(ArrayVariable {
                subscripted_variable: Box::new(array.subscripted_variable.with_position(span)),
                subscripts: array.subscripts,
            }),
            Variable::Structured(structured) => Variable::Structured(StructuredVariable {
                record: structured.record,
                field: structured.field.with_position(span),
            }),
        }
    }

    /// The identifier at the root of the variable.
    pub fn root(&self) -> &Id {
        match self {
            Variable::Named(named) => &named.name,
            Variable::Array(array) => array.subscripted_variable.root(),
            Variable::Structured(structured) => structured.record.root(),
        }
    }
}

impl Located for Variable {
    fn span(&self) -> SourceSpan {
        match self {
            Variable::Named(named) => named.name.span(),
            Variable::Array(array) => array.subscripted_variable.span(),
            Variable::Structured(structured) => {
                SourceSpan::join(&structured.record.span(), &structured.field.span())
            }
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Named(named) => write!(f, "{}", named.name),
            Variable::Array(array) => {
                write!(f, "{}[", array.subscripted_variable)?;
                for (index, subscript) in array.subscripts.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{subscript}")?;
                }
                f.write_str("]")
            }
            Variable::Structured(structured) => {
                write!(f, "{}.{}", structured.record, structured.field)
            }
        }
    }
}

/// Comparison and boolean operators.
///
/// See section 3.3.1, especially table 55.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompareOp {
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

/// Arithmetic operators.
///
/// See section 3.3.1, especially table 55.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Operators with a single operand.
///
/// See section 3.3.1, especially table 55.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    // Complement operator (for Boolean values)
    Not,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompareOp::Or => "OR",
            CompareOp::Xor => "XOR",
            CompareOp::And => "AND",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::LtEq => "<=",
            CompareOp::GtEq => ">=",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "MOD",
            Operator::Pow => "**",
        };
        f.write_str(text)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompareExpr {
    pub op: CompareOp,
    pub left: ExprKind,
    pub right: ExprKind,
}

#[derive(Debug, PartialEq, Clone)]
pub struct BinaryExpr {
    pub op: Operator,
    pub left: ExprKind,
    pub right: ExprKind,
}

#[derive(Debug, PartialEq, Clone)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub term: ExprKind,
    pub span: SourceSpan,
}

/// Function invocation in an expression.
///
/// See section 3.3.1.
#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub name: Id,
    pub param_assignment: Vec<ParamAssignmentKind>,
}

/// Expressions.
///
/// See section 3.3.1.
#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    Compare(Box<CompareExpr>),
    BinaryOp(Box<BinaryExpr>),
    UnaryOp(Box<UnaryExpr>),
    Expression(Box<ExprKind>),
    Const(ConstantKind),
    /// An enumerated value with an explicit type, such as `Color#Red`.
    EnumeratedValue(EnumeratedValue),
    Variable(Variable),
    Function(Function),
}

impl ExprKind {
    pub fn integer(value: i128) -> ExprKind {
        ExprKind::Const(ConstantKind::integer(value))
    }

    pub fn boolean(value: bool) -> ExprKind {
        ExprKind::Const(ConstantKind::boolean(value))
    }

    pub fn real(value: f64) -> ExprKind {
        ExprKind::Const(ConstantKind::real(value))
    }

    pub fn named_variable(name: &str) -> ExprKind {
        ExprKind::Variable(Variable::named(name))
    }

    pub fn binary(op: Operator, left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::BinaryOp(Box::new(BinaryExpr { op, left, right }))
    }

    pub fn compare(op: CompareOp, left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::Compare(Box::new(CompareExpr { op, left, right }))
    }

    pub fn unary(op: UnaryOp, term: ExprKind) -> ExprKind {
        ExprKind::UnaryOp(Box::new(UnaryExpr {
            op,
            term,
            span: SourceSpan::default(),
        }))
    }

    pub fn function(name: &str, param_assignment: Vec<ParamAssignmentKind>) -> ExprKind {
        ExprKind::Function(Function {
            name: Id::from(name),
            param_assignment,
        })
    }

    /// Creates a call to the function with positional inputs.
    pub fn call(name: &str, inputs: Vec<ExprKind>) -> ExprKind {
        Self::function(
            name,
            inputs
                .into_iter()
                .map(ParamAssignmentKind::positional)
                .collect(),
        )
    }
}

impl Located for ExprKind {
    fn span(&self) -> SourceSpan {
        match self {
            ExprKind::Compare(compare) => {
                SourceSpan::join(&compare.left.span(), &compare.right.span())
            }
            ExprKind::BinaryOp(binary) => {
                SourceSpan::join(&binary.left.span(), &binary.right.span())
            }
            ExprKind::UnaryOp(unary) => unary.span.clone(),
            ExprKind::Expression(expr) => expr.span(),
            ExprKind::Const(constant) => constant.span(),
            ExprKind::EnumeratedValue(value) => value.value.span(),
            ExprKind::Variable(variable) => variable.span(),
            ExprKind::Function(function) => function.name.span(),
        }
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Compare(compare) => {
                write!(f, "{} {} {}", compare.left, compare.op, compare.right)
            }
            ExprKind::BinaryOp(binary) => {
                write!(f, "{} {} {}", binary.left, binary.op, binary.right)
            }
            ExprKind::UnaryOp(unary) => match unary.op {
                UnaryOp::Neg => write!(f, "-{}", unary.term),
                UnaryOp::Not => write!(f, "NOT {}", unary.term),
            },
            ExprKind::Expression(expr) => write!(f, "({expr})"),
            ExprKind::Const(constant) => write!(f, "{constant}"),
            ExprKind::EnumeratedValue(value) => match &value.type_name {
                Some(type_name) => write!(f, "{}#{}", type_name, value.value),
                None => write!(f, "{}", value.value),
            },
            ExprKind::Variable(variable) => write!(f, "{variable}"),
            ExprKind::Function(function) => write!(f, "{}(...)", function.name),
        }
    }
}

/// Input argument to a function or program invocation.
/// The input is mapped based on the order in a sequence. Also known
/// as a non-formal input.
///
/// See section 3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct PositionalInput {
    pub expr: ExprKind,
}

/// Input argument to a function or program invocation.
/// The input is mapped based on the specified name. Also known as
/// a formal input.
///
/// See section 3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct NamedInput {
    pub name: Id,
    pub expr: ExprKind,
}

/// Output argument captured from a function or program invocation,
/// such as `q => target`.
///
/// See section 3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct Output {
    pub src: Id,
    pub tgt: Variable,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ParamAssignmentKind {
    PositionalInput(PositionalInput),
    NamedInput(NamedInput),
    Output(Output),
}

impl ParamAssignmentKind {
    pub fn positional(expr: ExprKind) -> ParamAssignmentKind {
        ParamAssignmentKind::PositionalInput(PositionalInput { expr })
    }

    pub fn named(name: &str, expr: ExprKind) -> ParamAssignmentKind {
        ParamAssignmentKind::NamedInput(NamedInput {
            name: Id::from(name),
            expr,
        })
    }

    pub fn output(src: &str, tgt: Variable) -> ParamAssignmentKind {
        ParamAssignmentKind::Output(Output {
            src: Id::from(src),
            tgt,
        })
    }
}

/// Assigns a variable as the evaluation of an expression.
///
/// See section 3.3.2.1.
#[derive(Debug, PartialEq, Clone)]
pub struct Assignment {
    pub target: Variable,
    pub value: ExprKind,
}

/// Invocation of a function or program as a statement. The result of a
/// function is discarded.
///
/// See section 3.3.2.2.
#[derive(Debug, PartialEq, Clone)]
pub struct Invocation {
    pub name: Id,
    pub params: Vec<ParamAssignmentKind>,
}

/// If selection statement.
///
/// See section 3.3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct If {
    pub expr: ExprKind,
    pub body: Vec<StmtKind>,
    pub else_ifs: Vec<ElseIf>,
    pub else_body: Vec<StmtKind>,
    pub span: SourceSpan,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ElseIf {
    pub expr: ExprKind,
    pub body: Vec<StmtKind>,
}

/// Case selection statement.
///
/// See section 3.3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct Case {
    /// An expression, the result of which is used to select a particular case.
    pub selector: ExprKind,
    pub statement_groups: Vec<CaseStatementGroup>,
    /// Statements when no group matches. `None` when the statement has no
    /// `ELSE` section.
    pub else_body: Option<Vec<StmtKind>>,
    pub span: SourceSpan,
}

/// A group of statements that can be selected within a case.
///
/// See section 3.3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub struct CaseStatementGroup {
    pub selectors: Vec<CaseSelectionKind>,
    pub statements: Vec<StmtKind>,
    pub span: SourceSpan,
}

/// A particular value that selects a case statement group.
///
/// See section 3.3.2.3.
#[derive(Debug, PartialEq, Clone)]
pub enum CaseSelectionKind {
    Subrange(Subrange),
    Constant(ConstantKind),
}

impl CaseSelectionKind {
    pub fn integer(value: i128) -> Self {
        CaseSelectionKind::Constant(ConstantKind::integer(value))
    }

    pub fn range(start: i128, end: i128) -> Self {
        CaseSelectionKind::Subrange(Subrange::new(start, end))
    }

    pub fn enumerated(value: &str) -> Self {
        CaseSelectionKind::Constant(ConstantKind::enumerated(value))
    }
}

impl Located for CaseSelectionKind {
    fn span(&self) -> SourceSpan {
        match self {
            CaseSelectionKind::Subrange(range) => range.span.clone(),
            CaseSelectionKind::Constant(constant) => constant.span(),
        }
    }
}

/// The for loop statement.
///
/// See section 3.3.2.4.
#[derive(Debug, PartialEq, Clone)]
pub struct For {
    /// The variable that is assigned and contains the value for each loop iteration.
    pub control: Id,
    pub from: ExprKind,
    pub to: ExprKind,
    pub step: Option<ExprKind>,
    pub body: Vec<StmtKind>,
    pub span: SourceSpan,
}

/// The while loop statement.
///
/// See section 3.3.2.4.
#[derive(Debug, PartialEq, Clone)]
pub struct While {
    pub condition: ExprKind,
    pub body: Vec<StmtKind>,
    pub span: SourceSpan,
}

/// The repeat loop statement.
///
/// See section 3.3.2.4.
#[derive(Debug, PartialEq, Clone)]
pub struct Repeat {
    pub body: Vec<StmtKind>,
    pub until: ExprKind,
    pub span: SourceSpan,
}

/// Statements.
///
/// See section 3.3.2.
#[derive(Debug, PartialEq, Clone)]
pub enum StmtKind {
    Assignment(Assignment),
    // Function and program control
    Invocation(Invocation),
    Return(SourceSpan),
    // Selection statements
    If(If),
    Case(Case),
    // Iteration statements
    For(For),
    While(While),
    Repeat(Repeat),
    Exit(SourceSpan),
    Empty(SourceSpan),
}

impl StmtKind {
    pub fn assignment(target: Variable, value: ExprKind) -> StmtKind {
        StmtKind::Assignment(Assignment { target, value })
    }

    pub fn simple_assignment(target: &str, value: ExprKind) -> StmtKind {
        Self::assignment(Variable::named(target), value)
    }

    pub fn invoke(name: &str, params: Vec<ParamAssignmentKind>) -> StmtKind {
        StmtKind::Invocation(Invocation {
            name: Id::from(name),
            params,
        })
    }

    pub fn if_then(condition: ExprKind, body: Vec<StmtKind>) -> StmtKind {
        Self::if_then_else(condition, body, vec![])
    }

    pub fn if_then_else(
        condition: ExprKind,
        body: Vec<StmtKind>,
        else_body: Vec<StmtKind>,
    ) -> StmtKind {
        StmtKind::If(If {
            expr: condition,
            body,
            else_ifs: vec![],
            else_body,
            span: SourceSpan::default(),
        })
    }

    pub fn case(
        selector: ExprKind,
        statement_groups: Vec<(Vec<CaseSelectionKind>, Vec<StmtKind>)>,
        else_body: Option<Vec<StmtKind>>,
    ) -> StmtKind {
        StmtKind::Case(Case {
            selector,
            statement_groups: statement_groups
                .into_iter()
                .map(|(selectors, statements)| CaseStatementGroup {
                    selectors,
                    statements,
                    span: SourceSpan::default(),
                })
                .collect(),
            else_body,
            span: SourceSpan::default(),
        })
    }

    pub fn for_loop(
        control: &str,
        from: ExprKind,
        to: ExprKind,
        step: Option<ExprKind>,
        body: Vec<StmtKind>,
    ) -> StmtKind {
        StmtKind::For(For {
            control: Id::from(control),
            from,
            to,
            step,
            body,
            span: SourceSpan::default(),
        })
    }

    pub fn while_loop(condition: ExprKind, body: Vec<StmtKind>) -> StmtKind {
        StmtKind::While(While {
            condition,
            body,
            span: SourceSpan::default(),
        })
    }

    pub fn repeat(body: Vec<StmtKind>, until: ExprKind) -> StmtKind {
        StmtKind::Repeat(Repeat {
            body,
            until,
            span: SourceSpan::default(),
        })
    }

    pub fn exit() -> StmtKind {
        StmtKind::Exit(SourceSpan::default())
    }

    pub fn return_() -> StmtKind {
        StmtKind::Return(SourceSpan::default())
    }

    pub fn empty() -> StmtKind {
        StmtKind::Empty(SourceSpan::default())
    }
}

impl Located for StmtKind {
    fn span(&self) -> SourceSpan {
        match self {
            StmtKind::Assignment(assignment) => {
                SourceSpan::join(&assignment.target.span(), &assignment.value.span())
            }
            StmtKind::Invocation(invocation) => invocation.name.span(),
            StmtKind::Return(span) => span.clone(),
            StmtKind::If(stmt) => stmt.span.clone(),
            StmtKind::Case(stmt) => stmt.span.clone(),
            StmtKind::For(stmt) => stmt.span.clone(),
            StmtKind::While(stmt) => stmt.span.clone(),
            StmtKind::Repeat(stmt) => stmt.span.clone(),
            StmtKind::Exit(span) => span.clone(),
            StmtKind::Empty(span) => span.clone(),
        }
    }
}
