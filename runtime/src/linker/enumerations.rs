//! Gives enumerated values written without a type name the enumeration
//! that the place of use expects.
//!
//! A value name such as `Green` may belong to more than one enumeration.
//! Until the place of use is known, the value has the first enumeration
//! that declares the value.
//!
//! ## Passes
//!
//! ```ignore
//! TYPE
//!    Light : (Red, Green);
//!    Signal : (Green, Blue);
//! END_TYPE
//!
//! PROGRAM Main
//!    VAR S : Signal; END_VAR
//!    S := Green;
//!    IF S = Blue THEN S := Green; END_IF;
//! END_PROGRAM
//! ```
use log::debug;
use stint_dsl::textual::CompareOp;

use crate::datatypes::TypeRef;
use crate::expressions::BinaryOperator;
use crate::statements::CaseValue;
use crate::unit::{UnitId, UnitKind};
use crate::value::ValueClass;

use super::Linker;

impl Linker {
    /// Changes the type of each enumerated value without a type name to
    /// the type of the assignment target, the case selector, the other
    /// operand of a comparison or the parameter that receives the value.
    pub(super) fn infer_enumerations(&mut self) {
        let bodies: Vec<UnitId> = self.machine.pous.iter().filter_map(|pou| pou.body).collect();
        let mut retyped = 0;
        for body in bodies {
            for id in self.machine.units.descendants(body) {
                for (expected, value) in self.expectations(id) {
                    if self.retype(value, &expected) {
                        retyped += 1;
                    }
                }
            }
        }
        debug!("Inferred the type of {} enumerated values", retyped);
    }

    /// Returns the units below the unit that are expected to have a type.
    fn expectations(&self, id: UnitId) -> Vec<(TypeRef, UnitId)> {
        let machine = &self.machine;
        let Some(unit) = machine.units.get(id) else {
            return vec![];
        };
        match &unit.kind {
            UnitKind::Assignment(stmt) => machine
                .data_type(stmt.target)
                .map(|expected| vec![(expected, stmt.value)])
                .unwrap_or_default(),
            UnitKind::Case(stmt) => {
                let Some(expected) = machine.data_type(stmt.selector) else {
                    return vec![];
                };
                stmt.groups
                    .iter()
                    .flat_map(|group| &group.values)
                    .filter_map(|value| match value {
                        CaseValue::Single(unit) => Some((expected.clone(), *unit)),
                        CaseValue::Range { .. } => None,
                    })
                    .collect()
            }
            UnitKind::Binary(term) => {
                let BinaryOperator::Compare(op) = term.op else {
                    return vec![];
                };
                if matches!(op, CompareOp::And | CompareOp::Or | CompareOp::Xor) {
                    return vec![];
                }
                let mut found = vec![];
                for (value, other) in [(term.left, term.right), (term.right, term.left)] {
                    if self.is_untyped_enumeration(other) {
                        continue;
                    }
                    if let Some(expected) = machine.data_type(other) {
                        found.push((expected, value));
                    }
                }
                found
            }
            UnitKind::Invoke(invocation) | UnitKind::Call(invocation) => invocation
                .inputs
                .iter()
                .filter_map(|binding| {
                    let expected = machine.memory.get(binding.param)?.data_type.clone()?;
                    let param = invocation.params.get(binding.source)?;
                    Some((expected, param.unit()))
                })
                .collect(),
            _ => vec![],
        }
    }

    fn is_untyped_enumeration(&self, id: UnitId) -> bool {
        self.machine.units.get(id).is_some_and(|unit| {
            matches!(&unit.kind, UnitKind::EnumConstant(constant) if !constant.typed)
        })
    }

    /// Gives the value the expected type when the value is an enumerated
    /// value without a type name that the expected type declares.
    fn retype(&mut self, id: UnitId, expected: &TypeRef) -> bool {
        if expected.class() != ValueClass::Enumeration {
            return false;
        }
        let Some(unit) = self.machine.units.get_mut(id) else {
            return false;
        };
        let UnitKind::EnumConstant(constant) = &mut unit.kind else {
            return false;
        };
        if constant.typed {
            return false;
        }
        match expected.enumeration_value(&constant.name) {
            Some(value) => {
                constant.value = value;
                constant.data_type = expected.clone();
                true
            }
            None => false,
        }
    }
}
