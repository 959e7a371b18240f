//! Decoded field values.

use std::fmt;

/// A single decoded value read from a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlcValue {
    /// A coil or discrete input.
    Bool(bool),
    /// Signed 16-bit register (`INT`).
    Int(i16),
    /// Unsigned 16-bit register (`UINT`).
    UInt(u16),
    /// Signed 32-bit value over two registers (`DINT`).
    DInt(i32),
    /// Unsigned 32-bit value over two registers (`UDINT`).
    UDInt(u32),
    /// IEEE 754 single precision over two registers (`REAL`).
    Real(f32),
}

impl PlcValue {
    /// Returns the value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PlcValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Returns integer values widened to `i64`. Reals and bools yield `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::PlcValue;
    ///
    /// assert_eq!(PlcValue::Int(-3).as_i64(), Some(-3));
    /// assert_eq!(PlcValue::UDInt(70_000).as_i64(), Some(70_000));
    /// assert_eq!(PlcValue::Real(1.5).as_i64(), None);
    /// ```
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            PlcValue::Int(v) => Some(i64::from(v)),
            PlcValue::UInt(v) => Some(i64::from(v)),
            PlcValue::DInt(v) => Some(i64::from(v)),
            PlcValue::UDInt(v) => Some(i64::from(v)),
            PlcValue::Bool(_) | PlcValue::Real(_) => None,
        }
    }

    /// Returns numeric values as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            PlcValue::Real(v) => Some(f64::from(v)),
            PlcValue::Bool(_) => None,
            _ => self.as_i64().map(|v| v as f64),
        }
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", if *v { "ON" } else { "OFF" }),
            PlcValue::Int(v) => write!(f, "{v}"),
            PlcValue::UInt(v) => write!(f, "{v}"),
            PlcValue::DInt(v) => write!(f, "{v}"),
            PlcValue::UDInt(v) => write!(f, "{v}"),
            PlcValue::Real(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bool() {
        assert_eq!(PlcValue::Bool(true).as_bool(), Some(true));
        assert_eq!(PlcValue::UInt(1).as_bool(), None);
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(PlcValue::Real(2.5).as_f64(), Some(2.5));
        assert_eq!(PlcValue::Int(-7).as_f64(), Some(-7.0));
        assert_eq!(PlcValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(PlcValue::Bool(true).to_string(), "ON");
        assert_eq!(PlcValue::Bool(false).to_string(), "OFF");
        assert_eq!(PlcValue::UInt(0x1234).to_string(), "4660");
        assert_eq!(PlcValue::DInt(-123_456).to_string(), "-123456");
    }
}
