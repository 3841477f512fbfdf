//! Array types with one or more dimensions.
use std::cmp::Ordering;
use std::fmt;

use stint_dsl::core::Id;

use super::{DataType, TypeRef};
use crate::error::ValueError;
use crate::value::{assign_children, Value, ValueClass};

/// The subscript range of one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimension {
    pub lower: i128,
    pub upper: i128,
}

impl Dimension {
    pub fn len(&self) -> usize {
        usize::try_from(self.upper - self.lower + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct ArrayType {
    name: Id,
    dimensions: Vec<Dimension>,
    element: TypeRef,
}

impl ArrayType {
    pub fn new(name: Id, dimensions: Vec<Dimension>, element: TypeRef) -> Self {
        Self {
            name,
            dimensions,
            element,
        }
    }

    fn size(&self) -> usize {
        self.dimensions.iter().map(Dimension::len).product()
    }
}

impl DataType for ArrayType {
    fn name(&self) -> &Id {
        &self.name
    }

    fn class(&self) -> ValueClass {
        ValueClass::Array
    }

    fn create_value(&self) -> Box<dyn Value> {
        Box::new(ArrayValue {
            elements: (0..self.size())
                .map(|_| self.element.create_value())
                .collect(),
        })
    }

    fn is_compatible(&self, source: &dyn DataType) -> bool {
        source.class() == ValueClass::Array
            && source.dimensions() == self.dimensions.as_slice()
            && source
                .element_type()
                .is_some_and(|element| self.element.is_compatible(element.as_ref()))
    }

    fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn element_type(&self) -> Option<TypeRef> {
        Some(self.element.clone())
    }

    /// Converts the subscripts to a row-major position.
    fn element_index(&self, subscripts: &[i128]) -> Result<usize, ValueError> {
        if subscripts.len() != self.dimensions.len() {
            return Err(ValueError::NoSuchElement);
        }
        let mut index = 0usize;
        for (subscript, dimension) in subscripts.iter().zip(self.dimensions.iter()) {
            if *subscript < dimension.lower || *subscript > dimension.upper {
                return Err(ValueError::IndexOutOfRange(*subscript));
            }
            let offset = usize::try_from(subscript - dimension.lower)
                .map_err(|_| ValueError::IndexOutOfRange(*subscript))?;
            index = index * dimension.len() + offset;
        }
        Ok(index)
    }
}

#[derive(Clone, Debug)]
pub struct ArrayValue {
    elements: Vec<Box<dyn Value>>,
}

impl Value for ArrayValue {
    fn class(&self) -> ValueClass {
        ValueClass::Array
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        if source.class() != ValueClass::Array {
            return Err(ValueError::Incompatible);
        }
        assign_children(self, source)
    }

    fn compare(&self, _other: &dyn Value) -> Result<Ordering, ValueError> {
        Err(ValueError::Unsupported)
    }

    fn child_count(&self) -> usize {
        self.elements.len()
    }

    fn child(&self, index: usize) -> Option<&dyn Value> {
        self.elements.get(index).map(|element| element.as_ref())
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut dyn Value> {
        self.elements
            .get_mut(index)
            .map(|element| element.as_mut() as &mut dyn Value)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, element) in self.elements.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str("]")
    }
}
