//! Builds the units of the bodies and binds the names that the units use.
//!
//! Names in a body are bound in the scope of the function or program:
//! variables of the unit, then global variables, then functions and
//! programs, then enumerated values. An identifier that names an
//! enumerated value becomes a constant once and stays a constant.
//!
//! A qualified identifier binds the root in the primary callback and the
//! links in the secondary callback, so that the links are resolved only
//! once every root in the body is bound.
use std::mem;

use log::debug;
use stint_dsl::{
    common::ConstantKind,
    core::{Id, Located, SourceSpan},
    diagnostic::{Diagnostic, Label},
    textual::{CaseSelectionKind, ExprKind, NamedVariable, ParamAssignmentKind, StmtKind, Variable},
};
use stint_problems::Problem;

use crate::expressions::{
    Access, BinaryOperator, BinaryTerm, EnumConstant, Identifier, Link, LinkKind, Literal,
    Qualified, UnaryTerm,
};
use crate::invocation::{Binding, Invocation, Param};
use crate::pou::{PouId, PouKind};
use crate::reference_pool::{Remark, Resolution};
use crate::statements::{
    Assignment, Branch, Case, CaseGroup, CaseValue, Conditional, ForLoop, RepeatLoop,
    StatementList, WhileLoop,
};
use crate::type_table::TypeTable;
use crate::unit::{Unit, UnitId, UnitKind, Units};
use crate::value::ValueClass;

use super::{BodyPool, Linker, Symbol};

/// The names used in the body of one function or program.
pub(crate) struct BodyReferences {
    pou: PouId,
    /// Variables, enumerated values and programs that qualify a variable.
    names: BodyPool,
    /// Functions and programs that are invoked.
    invocations: BodyPool,
}

/// Converts the statements of one body into units.
struct BodyBuilder<'a> {
    table: &'a mut TypeTable,
    units: &'a mut Units,
    names: BodyPool,
    invocations: BodyPool,
    errors: Vec<Diagnostic>,
}

impl BodyBuilder<'_> {
    fn insert(&mut self, span: SourceSpan, kind: UnitKind) -> UnitId {
        self.units.insert(Unit::new(span, kind))
    }

    /// Creates a statement list. The fallback is the location of an
    /// empty list.
    fn block(&mut self, statements: Vec<StmtKind>, fallback: &SourceSpan) -> UnitId {
        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => SourceSpan::join(&first.span(), &last.span()),
            _ => fallback.clone(),
        };
        let statements = statements
            .into_iter()
            .map(|statement| self.statement(statement))
            .collect();
        self.insert(span, UnitKind::StatementList(StatementList::new(statements)))
    }

    fn statement(&mut self, statement: StmtKind) -> UnitId {
        let span = statement.span();
        let kind = match statement {
            StmtKind::Assignment(assignment) => {
                let target = self.variable(assignment.target);
                let value = self.expression(assignment.value);
                UnitKind::Assignment(Assignment::new(target, value))
            }
            StmtKind::Invocation(invocation) => {
                return self.invocation(invocation.name, invocation.params, span, false)
            }
            StmtKind::Return(_) => UnitKind::Return,
            StmtKind::If(stmt) => {
                let mut branches = vec![Branch {
                    condition: self.expression(stmt.expr),
                    body: self.block(stmt.body, &span),
                }];
                for else_if in stmt.else_ifs {
                    branches.push(Branch {
                        condition: self.expression(else_if.expr),
                        body: self.block(else_if.body, &span),
                    });
                }
                let else_body = if stmt.else_body.is_empty() {
                    None
                } else {
                    Some(self.block(stmt.else_body, &span))
                };
                UnitKind::Conditional(Conditional::new(branches, else_body))
            }
            StmtKind::Case(stmt) => {
                let selector = self.expression(stmt.selector);
                let groups = stmt
                    .statement_groups
                    .into_iter()
                    .map(|group| CaseGroup {
                        values: group
                            .selectors
                            .into_iter()
                            .map(|selection| self.case_value(selection))
                            .collect(),
                        body: self.block(group.statements, &group.span),
                        span: group.span,
                    })
                    .collect();
                let else_body = stmt.else_body.map(|body| self.block(body, &span));
                UnitKind::Case(Case::new(selector, groups, else_body))
            }
            StmtKind::For(stmt) => {
                let control = self.variable(Variable::Named(NamedVariable { name: stmt.control }));
                let from = self.expression(stmt.from);
                let to = self.expression(stmt.to);
                let by = stmt.step.map(|step| self.expression(step));
                let body = self.block(stmt.body, &span);
                UnitKind::For(ForLoop::new(control, from, to, by, body))
            }
            StmtKind::While(stmt) => {
                let condition = self.expression(stmt.condition);
                let body = self.block(stmt.body, &span);
                UnitKind::While(WhileLoop::new(condition, body))
            }
            StmtKind::Repeat(stmt) => {
                let body = self.block(stmt.body, &span);
                let until = self.expression(stmt.until);
                UnitKind::Repeat(RepeatLoop::new(body, until))
            }
            StmtKind::Exit(_) => UnitKind::Exit,
            StmtKind::Empty(_) => UnitKind::Empty,
        };
        self.insert(span, kind)
    }

    fn case_value(&mut self, selection: CaseSelectionKind) -> CaseValue {
        match selection {
            CaseSelectionKind::Subrange(range) => CaseValue::Range {
                lower: range.start,
                upper: range.end,
                span: range.span,
            },
            CaseSelectionKind::Constant(constant) => CaseValue::Single(self.constant(constant)),
        }
    }

    fn expression(&mut self, expr: ExprKind) -> UnitId {
        let span = expr.span();
        let kind = match expr {
            ExprKind::Compare(compare) => {
                let compare = *compare;
                let left = self.expression(compare.left);
                let right = self.expression(compare.right);
                UnitKind::Binary(BinaryTerm::new(
                    BinaryOperator::Compare(compare.op),
                    left,
                    right,
                ))
            }
            ExprKind::BinaryOp(binary) => {
                let binary = *binary;
                let left = self.expression(binary.left);
                let right = self.expression(binary.right);
                UnitKind::Binary(BinaryTerm::new(
                    BinaryOperator::Arithmetic(binary.op),
                    left,
                    right,
                ))
            }
            ExprKind::UnaryOp(unary) => {
                let unary = *unary;
                let term = self.expression(unary.term);
                UnitKind::Unary(UnaryTerm::new(unary.op, term))
            }
            ExprKind::Expression(inner) => return self.expression(*inner),
            ExprKind::Const(constant) => return self.constant(constant),
            ExprKind::EnumeratedValue(value) => {
                return self.constant(ConstantKind::EnumeratedValue(value))
            }
            ExprKind::Variable(variable) => return self.variable(variable),
            ExprKind::Function(function) => {
                return self.invocation(function.name, function.param_assignment, span, true)
            }
        };
        self.insert(span, kind)
    }

    fn constant(&mut self, constant: ConstantKind) -> UnitId {
        let span = constant.span();
        match self.table.constant(&constant, None) {
            Ok((value, data_type)) => {
                let kind = match constant {
                    ConstantKind::EnumeratedValue(enumerated) => {
                        UnitKind::EnumConstant(EnumConstant {
                            typed: enumerated.type_name.is_some(),
                            name: enumerated.value,
                            value,
                            data_type,
                        })
                    }
                    _ => UnitKind::Literal(Literal::new(value, data_type)),
                };
                self.insert(span, kind)
            }
            Err(err) => {
                self.errors.push(err);
                self.insert(span, UnitKind::Empty)
            }
        }
    }

    fn variable(&mut self, variable: Variable) -> UnitId {
        let span = variable.span();
        match variable {
            Variable::Named(named) => {
                let unit = self.insert(
                    span.clone(),
                    UnitKind::Identifier(Identifier::new(named.name.clone())),
                );
                self.names.add(&named.name, unit, span, bind_identifier);
                unit
            }
            variable => {
                let mut links = vec![];
                let root = self.flatten(variable, &mut links);
                let unit = self.insert(
                    span.clone(),
                    UnitKind::Qualified(Qualified::new(root.clone(), links)),
                );
                self.names.add_two_step(
                    &root,
                    unit,
                    span,
                    bind_qualified_root,
                    bind_qualified_links,
                );
                unit
            }
        }
    }

    /// Adds the links of the variable in order from the root and returns
    /// the root name.
    fn flatten(&mut self, variable: Variable, links: &mut Vec<Link>) -> Id {
        match variable {
            Variable::Named(named) => named.name,
            Variable::Array(array) => {
                let record_span = array.subscripted_variable.span();
                let span = match array.subscripts.last() {
                    Some(last) => SourceSpan::join(&record_span, &last.span()),
                    None => record_span,
                };
                let root = self.flatten(*array.subscripted_variable, links);
                let subscripts = array
                    .subscripts
                    .into_iter()
                    .map(|subscript| self.expression(subscript))
                    .collect();
                links.push(Link {
                    kind: LinkKind::Index(subscripts),
                    span,
                });
                root
            }
            Variable::Structured(structured) => {
                let span = structured.field.span();
                let root = self.flatten(*structured.record, links);
                links.push(Link {
                    kind: LinkKind::Field(structured.field),
                    span,
                });
                root
            }
        }
    }

    fn invocation(
        &mut self,
        name: Id,
        params: Vec<ParamAssignmentKind>,
        span: SourceSpan,
        is_call: bool,
    ) -> UnitId {
        let params = params
            .into_iter()
            .map(|param| match param {
                ParamAssignmentKind::PositionalInput(input) => {
                    Param::Positional(self.expression(input.expr))
                }
                ParamAssignmentKind::NamedInput(input) => Param::Named {
                    name: input.name,
                    expr: self.expression(input.expr),
                },
                ParamAssignmentKind::Output(output) => Param::Output {
                    name: output.src,
                    target: self.variable(output.tgt),
                },
            })
            .collect();

        let invocation = Invocation::new(name.clone(), params);
        let kind = if is_call {
            UnitKind::Call(invocation)
        } else {
            UnitKind::Invoke(invocation)
        };
        let unit = self.insert(span.clone(), kind);
        self.invocations.add(&name, unit, span, bind_invocation);
        unit
    }
}

impl Linker {
    /// Creates the units of every body that is not built yet.
    pub fn build_bodies(&mut self) -> Result<(), Vec<Diagnostic>> {
        let mut errors = vec![];
        for (pou, body) in mem::take(&mut self.pending) {
            let span = self
                .machine
                .pou(pou)
                .map(|declared| declared.span.clone())
                .unwrap_or_default();
            let mut builder = BodyBuilder {
                table: &mut self.table,
                units: &mut self.machine.units,
                names: BodyPool::new(Problem::VariableUndefined),
                invocations: BodyPool::new(Problem::UndefinedReference),
                errors: vec![],
            };
            let root = builder.block(body, &span);
            let BodyBuilder {
                names,
                invocations,
                errors: mut found,
                ..
            } = builder;
            errors.append(&mut found);

            if let Some(declared) = self.machine.pou_mut(pou) {
                declared.body = Some(root);
            }
            self.body_references.push(BodyReferences {
                pou,
                names,
                invocations,
            });
        }

        debug!("Built bodies with {} units", self.machine.units.len());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Binds the names used in the bodies and runs the callbacks of the
    /// units that refer to the names.
    pub fn resolve_bodies(&mut self) -> Result<(), Vec<Diagnostic>> {
        let mut errors = vec![];
        for mut references in mem::take(&mut self.body_references) {
            while let Some(name) = references.names.next_unresolved().cloned() {
                match self.lookup_name(references.pou, &name) {
                    Some((symbol, Some(remark))) => {
                        references.names.resolve_with_remark(&name, symbol, remark)
                    }
                    Some((symbol, None)) => references.names.resolve(&name, symbol),
                    None => references.names.mark_undefined(&name),
                }
            }
            while let Some(name) = references.invocations.next_unresolved().cloned() {
                match self.lookup_pou(&name) {
                    Some(symbol) => references.invocations.resolve(&name, symbol),
                    None => references.invocations.mark_undefined(&name),
                }
            }

            for pool in [&mut references.names, &mut references.invocations] {
                if let Err(mut found) = pool.trigger_resolve_callbacks(self) {
                    errors.append(&mut found);
                }
            }
        }

        debug!("Resolved bodies with {} problems", errors.len());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn lookup_name(&self, pou: PouId, name: &Id) -> Option<(Symbol, Option<Remark>)> {
        let local = self
            .machine
            .pou(pou)
            .and_then(|declared| declared.variable(&self.machine.memory, name));
        if let Some(var) = local {
            return Some((Symbol::Variable(var), None));
        }
        if let Some(var) = self.global(name) {
            return Some((Symbol::Variable(var), Some(Remark::Global)));
        }
        if let Some(symbol) = self.lookup_pou(name) {
            let remark = matches!(symbol, Symbol::Program(_)).then_some(Remark::Program);
            return Some((symbol, remark));
        }
        self.table
            .enumerations_with_value(name)
            .first()
            .map(|id| (Symbol::EnumValue(*id), None))
    }

    fn lookup_pou(&self, name: &Id) -> Option<Symbol> {
        let id = *self.pou_names.get(name)?;
        match self.machine.pou(id)?.kind {
            PouKind::Function => Some(Symbol::Function(id)),
            PouKind::Program => Some(Symbol::Program(id)),
        }
    }
}

fn unit_kind(linker: &mut Linker, unit: UnitId) -> Result<&mut UnitKind, Diagnostic> {
    linker
        .machine
        .units
        .get_mut(unit)
        .map(|unit| &mut unit.kind)
        .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))
}

fn not_value(resolution: &Resolution<'_, Symbol>) -> Diagnostic {
    Diagnostic::problem(
        Problem::PouNotValue,
        Label::span(resolution.span.clone(), "Reference"),
    )
    .with_context_id("name", resolution.name)
}

fn bind_identifier(
    linker: &mut Linker,
    unit: &UnitId,
    resolution: &Resolution<'_, Symbol>,
) -> Result<(), Diagnostic> {
    match *resolution.target {
        Symbol::Variable(var) => {
            if let UnitKind::Identifier(identifier) = unit_kind(linker, *unit)? {
                identifier.var = Some(var);
            }
            Ok(())
        }
        Symbol::EnumValue(id) => {
            let (value, data_type) = linker.table.enumeration_value(id, resolution.name)?;
            *unit_kind(linker, *unit)? = UnitKind::EnumConstant(EnumConstant {
                name: resolution.name.clone(),
                value,
                data_type,
                typed: false,
            });
            Ok(())
        }
        Symbol::Program(_) | Symbol::Function(_) => Err(not_value(resolution)),
    }
}

fn bind_qualified_root(
    linker: &mut Linker,
    unit: &UnitId,
    resolution: &Resolution<'_, Symbol>,
) -> Result<(), Diagnostic> {
    let (var, prefix) = match *resolution.target {
        Symbol::Variable(var) => (var, 0),
        Symbol::Program(pou) => {
            // A program is only addressable through one of its variables.
            let field = match unit_kind(linker, *unit)? {
                UnitKind::Qualified(qualified) => {
                    qualified.links.first().and_then(|link| match &link.kind {
                        LinkKind::Field(field) => Some(field.clone()),
                        LinkKind::Index(_) => None,
                    })
                }
                _ => None,
            };
            let var = field.and_then(|field| {
                linker
                    .machine
                    .pou(pou)?
                    .variable(&linker.machine.memory, &field)
            });
            let var = var.ok_or_else(|| {
                Diagnostic::problem(
                    Problem::ProgramNotAddressable,
                    Label::span(resolution.span.clone(), "Program"),
                )
                .with_context_id("program", resolution.name)
            })?;
            (var, 1)
        }
        Symbol::Function(_) => return Err(not_value(resolution)),
        Symbol::EnumValue(_) => {
            return Err(Diagnostic::problem(
                Problem::NotStructured,
                Label::span(resolution.span.clone(), "Enumerated value"),
            )
            .with_context_id("name", resolution.name))
        }
    };

    if let UnitKind::Qualified(qualified) = unit_kind(linker, *unit)? {
        qualified.var = Some(var);
        qualified.prefix = prefix;
    }
    Ok(())
}

/// Returns the value of a subscript that is an integer literal.
fn literal_integer(units: &Units, id: UnitId) -> Option<i128> {
    match &units.get(id)?.kind {
        UnitKind::Literal(literal) => literal.value.as_integer(),
        _ => None,
    }
}

fn bind_qualified_links(
    linker: &mut Linker,
    unit: &UnitId,
    _resolution: &Resolution<'_, Symbol>,
) -> Result<(), Diagnostic> {
    let UnitKind::Qualified(qualified) = unit_kind(linker, *unit)? else {
        return Err(Diagnostic::internal_error(file!(), line!()));
    };
    let (var, prefix, links) = (qualified.var, qualified.prefix, qualified.links.clone());
    let mut data_type = var
        .and_then(|var| linker.machine.memory.get(var))
        .and_then(|variable| variable.data_type.clone())
        .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;

    let mut accesses = vec![];
    for (index, link) in links.iter().enumerate().skip(prefix) {
        match &link.kind {
            LinkKind::Field(field) => {
                let Some((position, field_type)) = data_type.field(field) else {
                    let problem = if data_type.class() == ValueClass::Structure {
                        Problem::FieldUndefined
                    } else {
                        Problem::NotStructured
                    };
                    return Err(Diagnostic::problem(
                        problem,
                        Label::span(link.span.clone(), "Element"),
                    )
                    .with_context_id("element", field)
                    .with_context("type", data_type.name().original()));
                };
                accesses.push(Access::Child(position));
                data_type = field_type;
            }
            LinkKind::Index(subscripts) => {
                let rank = data_type.dimensions().len();
                if rank == 0 {
                    return Err(Diagnostic::problem(
                        Problem::NotIndexable,
                        Label::span(link.span.clone(), "Subscript"),
                    )
                    .with_context("type", data_type.name().original()));
                }
                if subscripts.len() != rank {
                    return Err(Diagnostic::problem(
                        Problem::SubscriptCountMismatch,
                        Label::span(link.span.clone(), "Subscript"),
                    )
                    .with_context("expected", &rank.to_string())
                    .with_context("actual", &subscripts.len().to_string()));
                }

                let constants: Option<Vec<i128>> = subscripts
                    .iter()
                    .map(|subscript| literal_integer(&linker.machine.units, *subscript))
                    .collect();
                match constants {
                    Some(constants) => {
                        let position = data_type.element_index(&constants).map_err(|err| {
                            Diagnostic::problem(
                                Problem::IndexOutOfRange,
                                Label::span(link.span.clone(), "Subscript"),
                            )
                            .with_context("reason", &err.to_string())
                        })?;
                        accesses.push(Access::Child(position));
                    }
                    None => accesses.push(Access::Element {
                        array: data_type.clone(),
                        link: index,
                    }),
                }
                data_type = data_type
                    .element_type()
                    .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
            }
        }
    }

    if let UnitKind::Qualified(qualified) = unit_kind(linker, *unit)? {
        qualified.accesses = accesses;
        qualified.data_type = Some(data_type);
    }
    Ok(())
}

fn bind_invocation(
    linker: &mut Linker,
    unit: &UnitId,
    resolution: &Resolution<'_, Symbol>,
) -> Result<(), Diagnostic> {
    let target = match *resolution.target {
        Symbol::Program(id) | Symbol::Function(id) => id,
        Symbol::Variable(_) | Symbol::EnumValue(_) => {
            return Err(Diagnostic::problem(
                Problem::NotCallable,
                Label::span(resolution.span.clone(), "Invocation"),
            )
            .with_context_id("name", resolution.name))
        }
    };

    let machine = &linker.machine;
    let internal = || Diagnostic::internal_error(file!(), line!());
    let (UnitKind::Invoke(invocation) | UnitKind::Call(invocation)) =
        &machine.units.get(*unit).ok_or_else(internal)?.kind
    else {
        return Err(internal());
    };
    let pou = machine.pou(target).ok_or_else(internal)?;

    let positional = invocation
        .params
        .iter()
        .filter(|param| matches!(param, Param::Positional(_)))
        .count();
    if positional > 0 && positional != pou.inputs.len() {
        return Err(Diagnostic::problem(
            Problem::ParameterCountMismatch,
            Label::span(resolution.span.clone(), "Invocation"),
        )
        .with_context_id("name", &pou.name)
        .with_context("expected", &pou.inputs.len().to_string())
        .with_context("actual", &positional.to_string()));
    }

    let undefined = |name: &Id| {
        Diagnostic::problem(
            Problem::ParameterUndefined,
            Label::located(name, "Parameter"),
        )
        .with_context_id("name", &pou.name)
    };
    let mut next_input = pou.inputs.iter();
    let mut inputs = vec![];
    let mut outputs = vec![];
    for (source, param) in invocation.params.iter().enumerate() {
        match param {
            Param::Positional(_) => {
                let param = *next_input.next().ok_or_else(internal)?;
                inputs.push(Binding { param, source });
            }
            Param::Named { name, .. } => {
                let param = pou
                    .input(&machine.memory, name)
                    .ok_or_else(|| undefined(name))?;
                inputs.push(Binding { param, source });
            }
            Param::Output { name, target } => {
                let param = pou
                    .output(&machine.memory, name)
                    .ok_or_else(|| undefined(name))?;
                if machine.needs_stepping(*target) {
                    let span = machine
                        .units
                        .span(*target)
                        .unwrap_or_else(|| resolution.span.clone());
                    return Err(Diagnostic::problem(
                        Problem::OutputTargetNotStatic,
                        Label::span(span, "Output target"),
                    )
                    .with_context_id("parameter", name));
                }
                outputs.push(Binding { param, source });
            }
        }
    }

    match unit_kind(linker, *unit)? {
        UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => {
            invocation.target = Some(target);
            invocation.inputs = inputs;
            invocation.outputs = outputs;
            Ok(())
        }
        _ => Err(Diagnostic::internal_error(file!(), line!())),
    }
}
