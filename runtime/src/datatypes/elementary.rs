//! The elementary types defined by the language.
use std::rc::Rc;

use phf::{phf_map, Map};
use stint_dsl::core::{Id, SourceSpan};

use super::numeric::{BoolValue, IntegerKind, IntegerValue, RealKind, RealValue};
use super::string::{StringValue, DEFAULT_STRING_CAPACITY};
use super::temporal::{DateTimeValue, TimeValue};
use super::{DataType, TypeRef};
use crate::value::{Value, ValueClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementaryKind {
    Bool,
    Integer(IntegerKind),
    Real(RealKind),
    Time,
    DateTime,
    String,
}

static ELEMENTARY_TYPES_LOWER_CASE: Map<&'static str, ElementaryKind> = phf_map! {
    // signed_integer_type_name
    "sint" => ElementaryKind::Integer(IntegerKind::SInt),
    "int" => ElementaryKind::Integer(IntegerKind::Int),
    "dint" => ElementaryKind::Integer(IntegerKind::DInt),
    "lint" => ElementaryKind::Integer(IntegerKind::LInt),
    // unsigned_integer_type_name
    "usint" => ElementaryKind::Integer(IntegerKind::USInt),
    "uint" => ElementaryKind::Integer(IntegerKind::UInt),
    "udint" => ElementaryKind::Integer(IntegerKind::UDInt),
    "ulint" => ElementaryKind::Integer(IntegerKind::ULInt),
    // real_type_name
    "real" => ElementaryKind::Real(RealKind::Real),
    "lreal" => ElementaryKind::Real(RealKind::LReal),
    // date_type_name
    "date_and_time" => ElementaryKind::DateTime,
    "dt" => ElementaryKind::DateTime,
    // bit_string_type_name
    "bool" => ElementaryKind::Bool,
    "byte" => ElementaryKind::Integer(IntegerKind::USInt),
    "word" => ElementaryKind::Integer(IntegerKind::UInt),
    "dword" => ElementaryKind::Integer(IntegerKind::UDInt),
    "lword" => ElementaryKind::Integer(IntegerKind::ULInt),
    // remaining elementary_type_name
    "string" => ElementaryKind::String,
    "time" => ElementaryKind::Time,
};

#[derive(Debug)]
pub struct ElementaryType {
    name: Id,
    kind: ElementaryKind,
}

impl ElementaryType {
    pub fn kind(&self) -> ElementaryKind {
        self.kind
    }
}

impl DataType for ElementaryType {
    fn name(&self) -> &Id {
        &self.name
    }

    fn class(&self) -> ValueClass {
        match self.kind {
            ElementaryKind::Bool => ValueClass::Bool,
            ElementaryKind::Integer(_) => ValueClass::Integer,
            ElementaryKind::Real(_) => ValueClass::Real,
            ElementaryKind::Time => ValueClass::Time,
            ElementaryKind::DateTime => ValueClass::DateTime,
            ElementaryKind::String => ValueClass::String,
        }
    }

    fn create_value(&self) -> Box<dyn Value> {
        match self.kind {
            ElementaryKind::Bool => Box::new(BoolValue(false)),
            ElementaryKind::Integer(kind) => Box::new(IntegerValue::zero(kind)),
            ElementaryKind::Real(kind) => Box::new(RealValue::zero(kind)),
            ElementaryKind::Time => Box::new(TimeValue(time::Duration::ZERO)),
            ElementaryKind::DateTime => Box::new(DateTimeValue::default()),
            ElementaryKind::String => Box::new(StringValue::with_capacity(DEFAULT_STRING_CAPACITY)),
        }
    }

    fn bits(&self) -> Option<u32> {
        match self.kind {
            ElementaryKind::Bool => Some(1),
            ElementaryKind::Integer(kind) => Some(kind.bits()),
            ElementaryKind::Real(kind) => Some(kind.bits()),
            ElementaryKind::Time | ElementaryKind::DateTime | ElementaryKind::String => None,
        }
    }
}

/// Returns the elementary type with the name, if the name is an
/// elementary type name.
pub fn elementary_type(name: &Id) -> Option<TypeRef> {
    ELEMENTARY_TYPES_LOWER_CASE
        .get(name.lower_case().as_str())
        .map(|kind| {
            Rc::new(ElementaryType {
                name: Id::from(&name.original().to_uppercase()).with_position(SourceSpan::builtin()),
                kind: *kind,
            }) as TypeRef
        })
}

/// The names (lower case) of every elementary type.
pub fn elementary_names() -> impl Iterator<Item = &'static str> {
    ELEMENTARY_TYPES_LOWER_CASE.keys().copied()
}

fn named(name: &str, kind: ElementaryKind) -> TypeRef {
    Rc::new(ElementaryType {
        name: Id::from(name).with_position(SourceSpan::builtin()),
        kind,
    })
}

pub fn bool_type() -> TypeRef {
    named("BOOL", ElementaryKind::Bool)
}

pub fn lint_type() -> TypeRef {
    named("LINT", ElementaryKind::Integer(IntegerKind::LInt))
}

pub fn ulint_type() -> TypeRef {
    named("ULINT", ElementaryKind::Integer(IntegerKind::ULInt))
}

pub fn lreal_type() -> TypeRef {
    named("LREAL", ElementaryKind::Real(RealKind::LReal))
}

pub fn time_type() -> TypeRef {
    named("TIME", ElementaryKind::Time)
}

pub fn date_time_type() -> TypeRef {
    named("DATE_AND_TIME", ElementaryKind::DateTime)
}

pub fn string_type() -> TypeRef {
    named("STRING", ElementaryKind::String)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementary_type_when_mixed_case_then_found() {
        let data_type = elementary_type(&Id::from("Int")).unwrap();
        assert_eq!(ValueClass::Integer, data_type.class());
        assert_eq!("INT", data_type.name().original());
    }

    #[test]
    fn elementary_type_when_not_elementary_then_none() {
        assert!(elementary_type(&Id::from("Motor")).is_none());
    }

    #[test]
    fn create_value_when_time_then_zero_duration() {
        let value = time_type().create_value();
        assert_eq!(Some(time::Duration::ZERO), value.as_duration());
    }

    #[test]
    fn elementary_names_when_iterated_then_contains_bool() {
        assert!(elementary_names().any(|name| name == "bool"));
    }
}
