//! Types derived from another type, optionally with a different initial
//! value.
use stint_dsl::{common::AddressAssignment, core::Id};

use super::{DataType, Dimension, TypeRef};
use crate::error::ValueError;
use crate::value::{Value, ValueClass};

#[derive(Debug)]
pub struct DerivedType {
    name: Id,
    base: TypeRef,
    default: Option<Box<dyn Value>>,
}

impl DerivedType {
    /// Creates the derived type. The initial value must be assignable to
    /// a value of the base type.
    pub fn new(name: Id, base: TypeRef, initial: Option<&dyn Value>) -> Result<Self, ValueError> {
        let default = match initial {
            Some(initial) => {
                let mut value = base.create_value();
                value.assign(initial)?;
                Some(value)
            }
            None => None,
        };
        Ok(Self {
            name,
            base,
            default,
        })
    }

    pub fn base(&self) -> &TypeRef {
        &self.base
    }
}

impl DataType for DerivedType {
    fn name(&self) -> &Id {
        &self.name
    }

    fn base_name(&self) -> &Id {
        self.base.base_name()
    }

    fn class(&self) -> ValueClass {
        self.base.class()
    }

    fn create_value(&self) -> Box<dyn Value> {
        match &self.default {
            Some(default) => default.clone(),
            None => self.base.create_value(),
        }
    }

    fn is_compatible(&self, source: &dyn DataType) -> bool {
        self.base.is_compatible(source)
    }

    fn bits(&self) -> Option<u32> {
        self.base.bits()
    }

    fn check_address(&self, address: &AddressAssignment) -> bool {
        self.base.check_address(address)
    }

    fn field(&self, name: &Id) -> Option<(usize, TypeRef)> {
        self.base.field(name)
    }

    fn dimensions(&self) -> &[Dimension] {
        self.base.dimensions()
    }

    fn element_type(&self) -> Option<TypeRef> {
        self.base.element_type()
    }

    fn element_index(&self, subscripts: &[i128]) -> Result<usize, ValueError> {
        self.base.element_index(subscripts)
    }

    fn enumeration_value(&self, name: &Id) -> Option<Box<dyn Value>> {
        self.base.enumeration_value(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{elementary_type, IntegerValue};

    #[test]
    fn create_value_when_initial_then_initial() {
        let derived = DerivedType::new(
            Id::from("Speed"),
            elementary_type(&Id::from("INT")).unwrap(),
            Some(&IntegerValue::literal(50).unwrap()),
        )
        .unwrap();
        assert_eq!(Some(50), derived.create_value().as_integer());
        assert_eq!("INT", derived.base_name().original().as_str());
    }

    #[test]
    fn new_when_initial_exceeds_base_then_overflow() {
        let result = DerivedType::new(
            Id::from("Small"),
            elementary_type(&Id::from("SINT")).unwrap(),
            Some(&IntegerValue::literal(300).unwrap()),
        );
        assert_eq!(ValueError::Overflow, result.unwrap_err());
    }

    #[test]
    fn is_compatible_when_derived_from_int_then_accepts_integer() {
        let derived = DerivedType::new(
            Id::from("Speed"),
            elementary_type(&Id::from("INT")).unwrap(),
            None,
        )
        .unwrap();
        let source = elementary_type(&Id::from("SINT")).unwrap();
        assert!(derived.is_compatible(source.as_ref()));
    }
}
