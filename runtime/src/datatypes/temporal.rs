//! Duration (`TIME`) and date and time (`DATE_AND_TIME`) values.
use std::cmp::Ordering;
use std::fmt;

use stint_dsl::textual::Operator;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::error::ValueError;
use crate::value::{Value, ValueClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeValue(pub Duration);

impl TimeValue {
    fn scale(&self, factor: f64) -> Result<Duration, ValueError> {
        let seconds = self.0.as_seconds_f64() * factor;
        if !seconds.is_finite() || seconds > i64::MAX as f64 {
            return Err(ValueError::Overflow);
        }
        if seconds < i64::MIN as f64 {
            return Err(ValueError::Underflow);
        }
        Ok(Duration::seconds_f64(seconds))
    }
}

impl Value for TimeValue {
    fn class(&self) -> ValueClass {
        ValueClass::Time
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        self.0 = source.as_duration().ok_or(ValueError::Incompatible)?;
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        let other = other.as_duration().ok_or(ValueError::Incompatible)?;
        Ok(self.0.cmp(&other))
    }

    fn apply(&mut self, op: Operator, rhs: &dyn Value) -> Result<(), ValueError> {
        let result = match op {
            Operator::Add => {
                let rhs = rhs.as_duration().ok_or(ValueError::Incompatible)?;
                self.0.checked_add(rhs).ok_or(ValueError::Overflow)?
            }
            Operator::Sub => {
                let rhs = rhs.as_duration().ok_or(ValueError::Incompatible)?;
                self.0.checked_sub(rhs).ok_or(ValueError::Underflow)?
            }
            Operator::Mul => match rhs.as_integer() {
                Some(factor) => {
                    let factor = i32::try_from(factor).map_err(|_| ValueError::Overflow)?;
                    self.0.checked_mul(factor).ok_or(ValueError::Overflow)?
                }
                None => self.scale(rhs.as_real().ok_or(ValueError::Incompatible)?)?,
            },
            Operator::Div => match rhs.as_integer() {
                Some(divisor) => {
                    if divisor == 0 {
                        return Err(ValueError::DivisionByZero);
                    }
                    let divisor = i32::try_from(divisor).map_err(|_| ValueError::Overflow)?;
                    self.0.checked_div(divisor).ok_or(ValueError::Overflow)?
                }
                None => {
                    let divisor = rhs.as_real().ok_or(ValueError::Incompatible)?;
                    if divisor == 0.0 {
                        return Err(ValueError::DivisionByZero);
                    }
                    self.scale(1.0 / divisor)?
                }
            },
            Operator::Mod | Operator::Pow => return Err(ValueError::Unsupported),
        };
        self.0 = result;
        Ok(())
    }

    fn negate(&mut self) -> Result<(), ValueError> {
        self.0 = self.0.checked_neg().ok_or(ValueError::Overflow)?;
        Ok(())
    }

    fn as_duration(&self) -> Option<Duration> {
        Some(self.0)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(*self)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T#{}ms", self.0.whole_milliseconds())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTimeValue(pub PrimitiveDateTime);

impl Default for DateTimeValue {
    fn default() -> Self {
        let epoch = OffsetDateTime::UNIX_EPOCH;
        DateTimeValue(PrimitiveDateTime::new(epoch.date(), epoch.time()))
    }
}

impl Value for DateTimeValue {
    fn class(&self) -> ValueClass {
        ValueClass::DateTime
    }

    fn assign(&mut self, source: &dyn Value) -> Result<(), ValueError> {
        self.0 = source.as_date_time().ok_or(ValueError::Incompatible)?;
        Ok(())
    }

    fn compare(&self, other: &dyn Value) -> Result<Ordering, ValueError> {
        let other = other.as_date_time().ok_or(ValueError::Incompatible)?;
        Ok(self.0.cmp(&other))
    }

    fn apply(&mut self, op: Operator, rhs: &dyn Value) -> Result<(), ValueError> {
        let rhs = rhs.as_duration().ok_or(ValueError::Incompatible)?;
        self.0 = match op {
            Operator::Add => self.0.checked_add(rhs).ok_or(ValueError::Overflow)?,
            Operator::Sub => self.0.checked_sub(rhs).ok_or(ValueError::Underflow)?,
            _ => return Err(ValueError::Unsupported),
        };
        Ok(())
    }

    fn as_date_time(&self) -> Option<PrimitiveDateTime> {
        Some(self.0)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(*self)
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DT#{:04}-{:02}-{:02}-{:02}:{:02}:{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}
