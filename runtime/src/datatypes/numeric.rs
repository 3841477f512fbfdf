//! Boolean, integer and real values.
use std::cmp::Ordering;
use std::fmt;

use stint_dsl::textual::Operator;

use crate::error::ValueError;
use crate::value::{Value, ValueClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoolValue(pub bool);

impl Value for BoolValue {
    fn class(&self) -> ValueClass {
        ValueClass::Bool
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        self.0 = source.as_bool().ok_or(ValueError::Incompatible)?;
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        let other = other.as_bool().ok_or(ValueError::Incompatible)?;
        Ok(self.0.cmp(&other))
    }

    fn complement(&mut self) -> Result<(), ValueError> {
        self.0 = !self.0;
        Ok(())
    }

    fn as_bool(&self) -> Option<bool> {
        Some(self.0)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(*self)
    }
}

impl fmt::Display for BoolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "TRUE" } else { "FALSE" })
    }
}

/// The integer types. Bit string types (`BYTE`, `WORD`, ...) share the
/// limits of the unsigned integer type of the same size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegerKind {
    SInt,
    Int,
    DInt,
    LInt,
    USInt,
    UInt,
    UDInt,
    ULInt,
}

impl IntegerKind {
    pub fn bits(&self) -> u32 {
        match self {
            IntegerKind::SInt | IntegerKind::USInt => 8,
            IntegerKind::Int | IntegerKind::UInt => 16,
            IntegerKind::DInt | IntegerKind::UDInt => 32,
            IntegerKind::LInt | IntegerKind::ULInt => 64,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            IntegerKind::SInt | IntegerKind::Int | IntegerKind::DInt | IntegerKind::LInt
        )
    }

    pub fn min(&self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.bits() - 1))
        } else {
            0
        }
    }

    pub fn max(&self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.bits() - 1)) - 1
        } else {
            (1i128 << self.bits()) - 1
        }
    }

    /// Returns the value if it is within the limits of the kind.
    pub fn check(&self, value: i128) -> Result<i128, ValueError> {
        if value > self.max() {
            Err(ValueError::Overflow)
        } else if value < self.min() {
            Err(ValueError::Underflow)
        } else {
            Ok(value)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegerValue {
    kind: IntegerKind,
    value: i128,
}

impl IntegerValue {
    /// Creates the value, checking the limits of the kind.
    pub fn new(kind: IntegerKind, value: i128) -> Result<Self, ValueError> {
        Ok(Self {
            kind,
            value: kind.check(value)?,
        })
    }

    pub fn zero(kind: IntegerKind) -> Self {
        Self { kind, value: 0 }
    }

    /// Creates the value of an integer literal: `LINT` when the value is
    /// within the limits of `LINT` and otherwise `ULINT`.
    pub fn literal(value: i128) -> Result<Self, ValueError> {
        if value > IntegerKind::LInt.max() {
            Self::new(IntegerKind::ULInt, value)
        } else {
            Self::new(IntegerKind::LInt, value)
        }
    }

    pub fn kind(&self) -> IntegerKind {
        self.kind
    }
}

impl Value for IntegerValue {
    fn class(&self) -> ValueClass {
        ValueClass::Integer
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        let value = source.as_integer().ok_or(ValueError::Incompatible)?;
        self.value = self.kind.check(value)?;
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        if let Some(other) = other.as_integer() {
            return Ok(self.value.cmp(&other));
        }
        let other = other.as_real().ok_or(ValueError::Incompatible)?;
        (self.value as f64)
            .partial_cmp(&other)
            .ok_or(ValueError::Incompatible)
    }

    fn apply(&mut self, op: Operator, rhs: &dyn Value) -> Result<(), ValueError> {
        let rhs = rhs.as_integer().ok_or(ValueError::Incompatible)?;
        let result = match op {
            Operator::Add => self.value.checked_add(rhs),
            Operator::Sub => self.value.checked_sub(rhs),
            Operator::Mul => self.value.checked_mul(rhs),
            Operator::Div => {
                if rhs == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                self.value.checked_div(rhs)
            }
            Operator::Mod => {
                if rhs == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                self.value.checked_rem(rhs)
            }
            Operator::Pow => {
                let exponent = u32::try_from(rhs).map_err(|_| ValueError::Unsupported)?;
                self.value.checked_pow(exponent)
            }
        };
        let result = result.ok_or(ValueError::Overflow)?;
        self.value = self.kind.check(result)?;
        Ok(())
    }

    fn negate(&mut self) -> Result<(), ValueError> {
        self.value = self.kind.check(-self.value)?;
        Ok(())
    }

    fn as_integer(&self) -> Option<i128> {
        Some(self.value)
    }

    fn as_real(&self) -> Option<f64> {
        Some(self.value as f64)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(*self)
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RealKind {
    Real,
    LReal,
}

impl RealKind {
    pub fn bits(&self) -> u32 {
        match self {
            RealKind::Real => 32,
            RealKind::LReal => 64,
        }
    }

    fn check(&self, value: f64) -> Result<f64, ValueError> {
        let limit = match self {
            RealKind::Real => f32::MAX as f64,
            RealKind::LReal => f64::MAX,
        };
        if value > limit {
            Err(ValueError::Overflow)
        } else if value < -limit {
            Err(ValueError::Underflow)
        } else {
            Ok(value)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RealValue {
    kind: RealKind,
    value: f64,
}

impl RealValue {
    pub fn new(kind: RealKind, value: f64) -> Result<Self, ValueError> {
        Ok(Self {
            kind,
            value: kind.check(value)?,
        })
    }

    pub fn zero(kind: RealKind) -> Self {
        Self { kind, value: 0.0 }
    }
}

impl Value for RealValue {
    fn class(&self) -> ValueClass {
        ValueClass::Real
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        let value = source.as_real().ok_or(ValueError::Incompatible)?;
        self.value = self.kind.check(value)?;
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        let other = other.as_real().ok_or(ValueError::Incompatible)?;
        self.value
            .partial_cmp(&other)
            .ok_or(ValueError::Incompatible)
    }

    fn apply(&mut self, op: Operator, rhs: &dyn Value) -> Result<(), ValueError> {
        let rhs = rhs.as_real().ok_or(ValueError::Incompatible)?;
        let result = match op {
            Operator::Add => self.value + rhs,
            Operator::Sub => self.value - rhs,
            Operator::Mul => self.value * rhs,
            Operator::Div => {
                if rhs == 0.0 {
                    return Err(ValueError::DivisionByZero);
                }
                self.value / rhs
            }
            Operator::Mod => return Err(ValueError::Unsupported),
            Operator::Pow => self.value.powf(rhs),
        };
        self.value = self.kind.check(result)?;
        Ok(())
    }

    fn negate(&mut self) -> Result<(), ValueError> {
        self.value = -self.value;
        Ok(())
    }

    fn as_real(&self) -> Option<f64> {
        Some(self.value)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(*self)
    }
}

impl fmt::Display for RealValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}
