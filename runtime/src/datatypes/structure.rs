//! Structured types.
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use stint_dsl::core::Id;

use super::{DataType, TypeRef};
use crate::error::ValueError;
use crate::value::{assign_children, Value, ValueClass};

#[derive(Debug)]
pub struct StructuredElement {
    pub name: Id,
    pub data_type: TypeRef,
    pub initial: Option<Box<dyn Value>>,
}

#[derive(Debug)]
pub struct StructType {
    name: Id,
    names: Rc<[Id]>,
    elements: Vec<StructuredElement>,
}

impl StructType {
    pub fn new(name: Id, elements: Vec<StructuredElement>) -> Self {
        let names: Vec<Id> = elements.iter().map(|element| element.name.clone()).collect();
        Self {
            name,
            names: names.into(),
            elements,
        }
    }
}

impl DataType for StructType {
    fn name(&self) -> &Id {
        &self.name
    }

    fn class(&self) -> ValueClass {
        ValueClass::Structure
    }

    fn create_value(&self) -> Box<dyn Value> {
        let fields = self
            .elements
            .iter()
            .map(|element| match &element.initial {
                Some(initial) => initial.clone(),
                None => element.data_type.create_value(),
            })
            .collect();
        Box::new(StructValue {
            names: self.names.clone(),
            fields,
        })
    }

    fn field(&self, name: &Id) -> Option<(usize, TypeRef)> {
        self.elements
            .iter()
            .position(|element| element.name == *name)
            .map(|index| (index, self.elements[index].data_type.clone()))
    }
}

#[derive(Clone, Debug)]
pub struct StructValue {
    names: Rc<[Id]>,
    fields: Vec<Box<dyn Value>>,
}

impl Value for StructValue {
    fn class(&self) -> ValueClass {
        ValueClass::Structure
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        if source.class() != ValueClass::Structure {
            return Err(ValueError::Incompatible);
        }
        assign_children(self, source)
    }

    fn compare(&self, _other: &dyn Value) -> Result<Ordering, ValueError> {
        Err(ValueError::Unsupported)
    }

    fn child_count(&self) -> usize {
        self.fields.len()
    }

    fn child(&self, index: usize) -> Option<&dyn Value> {
        self.fields.get(index).map(|field| field.as_ref())
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut dyn Value> {
        self.fields
            .get_mut(index)
            .map(|field| field.as_mut() as &mut dyn Value)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, (name, field)) in self.names.iter().zip(self.fields.iter()).enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} := {field}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{elementary_type, IntegerValue};

    fn point() -> StructType {
        let int = elementary_type(&Id::from("INT")).unwrap();
        StructType::new(
            Id::from("Point"),
            vec![
                StructuredElement {
                    name: Id::from("X"),
                    data_type: int.clone(),
                    initial: None,
                },
                StructuredElement {
                    name: Id::from("Y"),
                    data_type: int,
                    initial: Some(Box::new(IntegerValue::literal(7).unwrap())),
                },
            ],
        )
    }

    #[test]
    fn create_value_when_initial_then_element_has_initial() {
        assert_eq!("(X := 0, Y := 7)", format!("{}", point().create_value()));
    }

    #[test]
    fn field_when_different_case_then_found() {
        let (index, data_type) = point().field(&Id::from("y")).unwrap();
        assert_eq!(1, index);
        assert_eq!(ValueClass::Integer, data_type.class());
    }

    #[test]
    fn assign_when_same_structure_then_copies_fields() {
        let point = point();
        let mut target = point.create_value();
        let mut source = point.create_value();
        source
            .child_mut(0)
            .unwrap()
            .assign(&IntegerValue::literal(3).unwrap())
            .unwrap();
        target.assign(source.as_ref()).unwrap();
        assert_eq!(Some(3), target.child(0).and_then(|x| x.as_integer()));
    }
}
