//! Enumerated types and values.
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use stint_dsl::core::Id;

use super::DataType;
use crate::error::ValueError;
use crate::value::{Value, ValueClass};

#[derive(Debug)]
pub struct EnumerationType {
    name: Id,
    values: Rc<[Id]>,
    default: usize,
}

impl EnumerationType {
    /// Creates the enumeration. The default is the first value unless
    /// specified.
    pub fn new(name: Id, values: Vec<Id>, default: Option<&Id>) -> Result<Self, ValueError> {
        if values.is_empty() {
            return Err(ValueError::NoSuchElement);
        }
        let default = match default {
            Some(default) => values
                .iter()
                .position(|value| value == default)
                .ok_or(ValueError::NoSuchElement)?,
            None => 0,
        };
        Ok(Self {
            name,
            values: values.into(),
            default,
        })
    }

    pub fn values(&self) -> &[Id] {
        &self.values
    }
}

impl DataType for EnumerationType {
    fn name(&self) -> &Id {
        &self.name
    }

    fn class(&self) -> ValueClass {
        ValueClass::Enumeration
    }

    fn create_value(&self) -> Box<dyn Value> {
        Box::new(EnumeratedValue {
            type_name: self.name.clone(),
            values: self.values.clone(),
            index: self.default,
        })
    }

    fn enumeration_value(&self, name: &Id) -> Option<Box<dyn Value>> {
        self.values
            .iter()
            .position(|value| value == name)
            .map(|index| {
                Box::new(EnumeratedValue {
                    type_name: self.name.clone(),
                    values: self.values.clone(),
                    index,
                }) as Box<dyn Value>
            })
    }
}

#[derive(Clone, Debug)]
pub struct EnumeratedValue {
    type_name: Id,
    values: Rc<[Id]>,
    index: usize,
}

impl Value for EnumeratedValue {
    fn class(&self) -> ValueClass {
        ValueClass::Enumeration
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        match source.as_enumerated() {
            Some((type_name, index)) if *type_name == self.type_name => {
                self.index = index;
                Ok(())
            }
            _ => Err(ValueError::Incompatible),
        }
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        match other.as_enumerated() {
            Some((type_name, index)) if *type_name == self.type_name => Ok(self.index.cmp(&index)),
            _ => Err(ValueError::Incompatible),
        }
    }

    fn as_enumerated(&self) -> Option<(&Id, usize)> {
        Some((&self.type_name, self.index))
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }
}

impl fmt::Display for EnumeratedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.values.get(self.index) {
            Some(value) => write!(f, "{}#{}", self.type_name, value),
            None => write!(f, "{}#{}", self.type_name, self.index),
        }
    }
}
