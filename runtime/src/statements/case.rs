use stint_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::error::Fault;
use crate::machine::{Machine, StepContext};
use crate::unit::{StepResult, UnitId, UnitKind, VerifyScope};
use crate::value::{Value, ValueClass};

/// A value that selects a case group.
#[derive(Clone, Debug)]
pub enum CaseValue {
    /// A constant expression compared for equality with the selector.
    Single(UnitId),
    /// An inclusive integer range.
    Range {
        lower: i128,
        upper: i128,
        span: SourceSpan,
    },
}

#[derive(Clone, Debug)]
pub struct CaseGroup {
    pub values: Vec<CaseValue>,
    pub body: UnitId,
    pub span: SourceSpan,
}

impl CaseGroup {
    pub(crate) fn units(&self) -> Vec<UnitId> {
        self.values
            .iter()
            .filter_map(|value| match value {
                CaseValue::Single(unit) => Some(*unit),
                CaseValue::Range { .. } => None,
            })
            .chain(std::iter::once(self.body))
            .collect()
    }

    pub(crate) fn units_mut(&mut self) -> Vec<&mut UnitId> {
        self.values
            .iter_mut()
            .filter_map(|value| match value {
                CaseValue::Single(unit) => Some(unit),
                CaseValue::Range { .. } => None,
            })
            .chain(std::iter::once(&mut self.body))
            .collect()
    }

    fn matches(&self, machine: &Machine, selector: &dyn Value) -> Result<bool, Fault> {
        for value in &self.values {
            let matched = match value {
                CaseValue::Single(unit) => selector.equals(machine.operand(*unit)?)?,
                CaseValue::Range { lower, upper, .. } => selector
                    .as_integer()
                    .is_some_and(|selector| *lower <= selector && selector <= *upper),
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaseState {
    Start,
    Select,
    Body,
}

/// `CASE` over an integer or enumerated selector. The selector is
/// evaluated once and the groups are tested in declaration order.
#[derive(Clone, Debug)]
pub struct Case {
    pub selector: UnitId,
    pub groups: Vec<CaseGroup>,
    pub else_body: Option<UnitId>,
    state: CaseState,
}

/// The values that a case value covers, for finding duplicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coverage {
    Integers(i128, i128),
    Enumerated(usize),
}

impl Coverage {
    fn overlaps(&self, other: &Coverage) -> bool {
        match (self, other) {
            (Coverage::Integers(a, b), Coverage::Integers(c, d)) => a <= d && c <= b,
            (Coverage::Enumerated(a), Coverage::Enumerated(b)) => a == b,
            _ => false,
        }
    }
}

impl Case {
    pub fn new(selector: UnitId, groups: Vec<CaseGroup>, else_body: Option<UnitId>) -> Self {
        Self {
            selector,
            groups,
            else_body,
            state: CaseState::Start,
        }
    }

    pub fn reset(&mut self) {
        self.state = CaseState::Start;
    }

    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        match self.state {
            CaseState::Start => {
                self.state = CaseState::Select;
                if ctx.needs_stepping(self.selector) {
                    return ctx.enter(self.selector);
                }
                self.select(ctx)
            }
            CaseState::Select => self.select(ctx),
            CaseState::Body => Ok(StepResult::Finished),
        }
    }

    fn select(&mut self, ctx: &mut StepContext<'_>) -> Result<StepResult, Fault> {
        let selector = ctx.operand(self.selector)?;
        let mut body = self.else_body;
        for group in &self.groups {
            if group.matches(ctx.machine, selector)? {
                body = Some(group.body);
                break;
            }
        }
        match body {
            Some(body) => {
                self.state = CaseState::Body;
                ctx.enter(body)
            }
            None => Ok(StepResult::Finished),
        }
    }

    pub fn verify(
        &self,
        machine: &Machine,
        span: &SourceSpan,
        scope: &mut VerifyScope,
    ) -> Result<(), Diagnostic> {
        machine.verify(self.selector, scope)?;
        let selector_span = machine.units.span(self.selector).unwrap_or_else(|| span.clone());
        let selector_type = machine
            .data_type(self.selector)
            .filter(|data_type| {
                matches!(data_type.class(), ValueClass::Integer | ValueClass::Enumeration)
            })
            .ok_or_else(|| {
                Diagnostic::problem(
                    Problem::CaseSelectorNotElementary,
                    Label::span(selector_span.clone(), "Selector"),
                )
            })?;

        let mut covered: Vec<Coverage> = vec![];
        for group in &self.groups {
            if group.values.is_empty() {
                scope.warnings.push(Diagnostic::warning(
                    Problem::CaseGroupEmpty,
                    Label::span(group.span.clone(), "Case group"),
                ));
            }
            for value in &group.values {
                let (coverage, value_span) = match value {
                    CaseValue::Single(unit) => {
                        let value_span = machine.units.span(*unit).unwrap_or_else(|| group.span.clone());
                        let is_constant = machine.units.get(*unit).is_some_and(|unit| {
                            matches!(unit.kind, UnitKind::Literal(_) | UnitKind::EnumConstant(_))
                        });
                        if !is_constant {
                            return Err(Diagnostic::problem(
                                Problem::CaseValueNotConstant,
                                Label::span(value_span, "Case value"),
                            ));
                        }
                        let value_type = machine
                            .data_type(*unit)
                            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
                        if !selector_type.is_compatible(value_type.as_ref()) {
                            return Err(Diagnostic::problem(
                                Problem::ValueNotCompatible,
                                Label::span(value_span, format!("Value of type {}", value_type.name())),
                            )
                            .with_secondary(Label::span(
                                selector_span.clone(),
                                format!("Selector of type {}", selector_type.name()),
                            )));
                        }
                        let constant = machine
                            .operand(*unit)
                            .map_err(|_| Diagnostic::internal_error(file!(), line!()))?;
                        let coverage = match (constant.as_integer(), constant.as_enumerated()) {
                            (Some(value), _) => Some(Coverage::Integers(value, value)),
                            (None, Some((_, index))) => Some(Coverage::Enumerated(index)),
                            (None, None) => None,
                        };
                        (coverage, value_span)
                    }
                    CaseValue::Range { lower, upper, span } => {
                        if selector_type.class() != ValueClass::Integer {
                            return Err(Diagnostic::problem(
                                Problem::ValueNotCompatible,
                                Label::span(span.clone(), "Range"),
                            )
                            .with_secondary(Label::span(
                                selector_span.clone(),
                                format!("Selector of type {}", selector_type.name()),
                            )));
                        }
                        (Some(Coverage::Integers(*lower, *upper)), span.clone())
                    }
                };
                if let Some(coverage) = coverage {
                    if covered.iter().any(|other| other.overlaps(&coverage)) {
                        scope.warnings.push(Diagnostic::warning(
                            Problem::CaseValueDuplicated,
                            Label::span(value_span, "Case value"),
                        ));
                    }
                    covered.push(coverage);
                }
            }
            machine.verify(group.body, scope)?;
        }
        if let Some(body) = self.else_body {
            machine.verify(body, scope)?;
        }
        Ok(())
    }
}
