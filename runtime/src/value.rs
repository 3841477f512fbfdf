//! The capability contract that every runtime value satisfies.
//!
//! The execution engine acts on values only through this contract. The
//! implementations in [`crate::datatypes`] are one catalog of values; the
//! engine does not inspect their representation.
use std::cmp::Ordering;
use std::fmt;

use stint_dsl::{core::Id, textual::Operator};
use time::{Duration, PrimitiveDateTime};

use crate::error::ValueError;

/// Broad class of a value or type. Compatibility rules are defined
/// between classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Bool,
    Integer,
    Real,
    Time,
    DateTime,
    String,
    Enumeration,
    Array,
    Structure,
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValueClass::Bool => "boolean",
            ValueClass::Integer => "integer",
            ValueClass::Real => "real",
            ValueClass::Time => "duration",
            ValueClass::DateTime => "date and time",
            ValueClass::String => "string",
            ValueClass::Enumeration => "enumeration",
            ValueClass::Array => "array",
            ValueClass::Structure => "structure",
        };
        f.write_str(text)
    }
}

pub trait Value: fmt::Display + fmt::Debug {
    fn class(&self) -> ValueClass;

    /// Replaces this value with the source value. The receiver keeps its
    /// type, so the assignment fails with an overflow or underflow when
    /// the source is outside of the limits of the receiver type.
    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError>;

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError>;

    fn equals(&self, other: &dyn Value) -> Result<bool, ValueError> {
        self.compare(other).map(|ordering| ordering == Ordering::Equal)
    }

    /// Applies the arithmetic operator in place with this value as the
    /// left operand.
    fn apply(&mut self, _op: Operator, _rhs: &dyn Value) -> Result<(), ValueError> {
        Err(ValueError::Unsupported)
    }

    fn negate(&mut self) -> Result<(), ValueError> {
        Err(ValueError::Unsupported)
    }

    fn complement(&mut self) -> Result<(), ValueError> {
        Err(ValueError::Unsupported)
    }

    fn as_integer(&self) -> Option<i128> {
        None
    }

    fn as_bool(&self) -> Option<bool> {
        None
    }

    fn as_real(&self) -> Option<f64> {
        None
    }

    fn as_text(&self) -> Option<&str> {
        None
    }

    fn as_duration(&self) -> Option<Duration> {
        None
    }

    fn as_date_time(&self) -> Option<PrimitiveDateTime> {
        None
    }

    /// Returns the name of the enumeration type and the position of the
    /// value in the enumeration.
    fn as_enumerated(&self) -> Option<(&Id, usize)> {
        None
    }

    /// Number of sub-values (array elements or structure elements).
    fn child_count(&self) -> usize {
        0
    }

    fn child(&self, _index: usize) -> Option<&dyn Value> {
        None
    }

    fn child_mut(&mut self, _index: usize) -> Option<&mut dyn Value> {
        None
    }

    fn clone_value(&self) -> Box<dyn Value>;
}

impl Clone for Box<dyn Value> {
    fn clone(&self) -> Self {
        self.clone_value()
    }
}

/// Assigns each sub-value of the source to the matching sub-value of the
/// target. Both must have the same number of sub-values.
pub(crate) fn assign_children(
    target: &mut dyn Value,
    source: &dyn Value,
) -> Result<(), ValueError> {
    if target.child_count() != source.child_count() {
        return Err(ValueError::Incompatible);
    }
    for index in 0..target.child_count() {
        let from = source.child(index).ok_or(ValueError::NoSuchElement)?;
        let to = target
            .child_mut(index)
            .ok_or(ValueError::NoSuchElement)?;
        to.assign(from)?;
    }
    Ok(())
}
