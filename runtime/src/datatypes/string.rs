//! Character string values.
use std::cmp::Ordering;
use std::fmt;

use crate::error::ValueError;
use crate::value::{Value, ValueClass};

/// Default capacity of a `STRING` in characters.
pub const DEFAULT_STRING_CAPACITY: usize = 254;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringValue {
    value: String,
    capacity: usize,
}

impl StringValue {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            capacity: DEFAULT_STRING_CAPACITY.max(value.chars().count()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            value: String::new(),
            capacity,
        }
    }
}

impl Value for StringValue {
    fn class(&self) -> ValueClass {
        ValueClass::String
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        let text = source.as_text().ok_or(ValueError::Incompatible)?;
        if text.chars().count() > self.capacity {
            return Err(ValueError::Overflow);
        }
        self.value = text.to_string();
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        let other = other.as_text().ok_or(ValueError::Incompatible)?;
        Ok(self.value.as_str().cmp(other))
    }

    fn as_text(&self) -> Option<&str> {
        Some(&self.value)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_when_longer_than_capacity_then_overflow() {
        let mut value = StringValue::with_capacity(3);
        assert_eq!(
            Err(ValueError::Overflow),
            value.assign(&StringValue::new("motor"))
        );
    }

    #[test]
    fn compare_when_text_then_lexicographic() {
        let value = StringValue::new("abc");
        assert_eq!(Ok(Ordering::Less), value.compare(&StringValue::new("abd")));
    }
}
