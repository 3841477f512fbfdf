//! Data types and the catalog of values used by the runtime.
//!
//! A [`DataType`] creates and resets values and answers the static
//! questions that the linker asks (compatibility, structure, direct
//! address layout). Derived types delegate to their base.
mod array;
mod derived;
mod elementary;
mod enumeration;
mod numeric;
mod string;
mod structure;
mod temporal;

use std::fmt;
use std::rc::Rc;

use stint_dsl::{
    common::{AddressAssignment, AddressSize},
    core::Id,
};

use crate::error::ValueError;
use crate::value::{Value, ValueClass};

pub use array::{ArrayType, ArrayValue, Dimension};
pub use derived::DerivedType;
pub use elementary::{
    bool_type, date_time_type, elementary_names, elementary_type, lint_type, lreal_type,
    string_type, time_type, ulint_type, ElementaryKind, ElementaryType,
};
pub use enumeration::{EnumerationType, EnumeratedValue};
pub use numeric::{BoolValue, IntegerKind, IntegerValue, RealKind, RealValue};
pub use string::StringValue;
pub use structure::{StructType, StructValue, StructuredElement};
pub use temporal::{DateTimeValue, TimeValue};

/// Shared handle to a concrete type.
pub type TypeRef = Rc<dyn DataType>;

pub trait DataType: fmt::Debug {
    fn name(&self) -> &Id;

    /// The name of the type that defines the representation. This is
    /// the type name except for derived types, which return the name of
    /// their base.
    fn base_name(&self) -> &Id {
        self.name()
    }

    fn class(&self) -> ValueClass;

    /// Creates a value with the default (initial) value of the type.
    fn create_value(&self) -> Box<dyn Value>;

    /// Restores the value to the default value of the type.
    fn reset_value(&self, value: &mut dyn Value) -> Result<(), ValueError> {
        value.assign(self.create_value().as_ref())
    }

    /// Returns true if a value of the source type can be assigned to a
    /// value of this type. Limits of the type are checked when assigning.
    fn is_compatible(&self, source: &dyn DataType) -> bool {
        match (self.class(), source.class()) {
            (ValueClass::Integer, ValueClass::Integer) => true,
            (ValueClass::Real, ValueClass::Integer | ValueClass::Real) => true,
            (ValueClass::Enumeration | ValueClass::Array | ValueClass::Structure, class) => {
                self.class() == class && self.base_name() == source.base_name()
            }
            (target, source) => target == source,
        }
    }

    /// Number of bits in the storage of the value when the type has a
    /// fixed size layout.
    fn bits(&self) -> Option<u32> {
        None
    }

    /// Returns true if the direct address designates storage that
    /// matches the layout of the type.
    fn check_address(&self, address: &AddressAssignment) -> bool {
        match address.size {
            AddressSize::Bit => self.class() == ValueClass::Bool,
            size => self.class() != ValueClass::Bool && self.bits() == Some(size.bits()),
        }
    }

    /// Returns the position and type of the named structure element.
    fn field(&self, _name: &Id) -> Option<(usize, TypeRef)> {
        None
    }

    fn dimensions(&self) -> &[Dimension] {
        &[]
    }

    fn element_type(&self) -> Option<TypeRef> {
        None
    }

    /// Converts array subscripts to the position of the element.
    fn element_index(&self, _subscripts: &[i128]) -> Result<usize, ValueError> {
        Err(ValueError::Unsupported)
    }

    /// Creates the named value of an enumeration.
    fn enumeration_value(&self, _name: &Id) -> Option<Box<dyn Value>> {
        None
    }
}
