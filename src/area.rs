//! Modbus data areas.
//!
//! A Modbus device exposes four data tables. Two hold single bits, two hold
//! 16-bit registers, and each is read with its own function code.
//!
//! | Area | Field prefix | Unit | Read function |
//! |------|--------------|------|:-------------:|
//! | Coils | `coil` | bit | 0x01 |
//! | Discrete inputs | `discrete-input` | bit | 0x02 |
//! | Holding registers | `holding-register` | register | 0x03 |
//! | Input registers | `input-register` | register | 0x04 |
//!
//! # Example
//!
//! ```
//! use modbus_task::RegisterArea;
//!
//! assert!(RegisterArea::Coil.is_bit_area());
//! assert!(!RegisterArea::HoldingRegister.is_bit_area());
//! assert_eq!(RegisterArea::HoldingRegister.to_string(), "holding-register");
//! ```

use std::str::FromStr;

use crate::error::TaskError;

/// Maximum number of bits in a single coil/discrete-input read.
pub const MAX_BITS_PER_READ: u16 = 2000;

/// Maximum number of registers in a single register read.
pub const MAX_REGISTERS_PER_READ: u16 = 125;

/// The four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterArea {
    /// Read/write single bits.
    Coil,
    /// Read-only single bits.
    DiscreteInput,
    /// Read/write 16-bit registers.
    HoldingRegister,
    /// Read-only 16-bit registers.
    InputRegister,
}

impl RegisterArea {
    /// Returns the function code used to read this area.
    pub(crate) fn read_function_code(self) -> u8 {
        match self {
            RegisterArea::Coil => 0x01,
            RegisterArea::DiscreteInput => 0x02,
            RegisterArea::HoldingRegister => 0x03,
            RegisterArea::InputRegister => 0x04,
        }
    }

    /// Returns whether this area addresses single bits rather than registers.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::RegisterArea;
    ///
    /// assert!(RegisterArea::DiscreteInput.is_bit_area());
    /// assert!(!RegisterArea::InputRegister.is_bit_area());
    /// ```
    pub fn is_bit_area(self) -> bool {
        matches!(self, RegisterArea::Coil | RegisterArea::DiscreteInput)
    }

    /// Returns the largest quantity (bits or registers) one read may cover.
    pub fn max_read_quantity(self) -> u16 {
        if self.is_bit_area() {
            MAX_BITS_PER_READ
        } else {
            MAX_REGISTERS_PER_READ
        }
    }
}

impl std::fmt::Display for RegisterArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterArea::Coil => write!(f, "coil"),
            RegisterArea::DiscreteInput => write!(f, "discrete-input"),
            RegisterArea::HoldingRegister => write!(f, "holding-register"),
            RegisterArea::InputRegister => write!(f, "input-register"),
        }
    }
}

impl FromStr for RegisterArea {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coil" => Ok(RegisterArea::Coil),
            "discrete-input" => Ok(RegisterArea::DiscreteInput),
            "holding-register" => Ok(RegisterArea::HoldingRegister),
            "input-register" => Ok(RegisterArea::InputRegister),
            other => Err(TaskError::invalid_field(other, "unknown register area")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_codes() {
        assert_eq!(RegisterArea::Coil.read_function_code(), 0x01);
        assert_eq!(RegisterArea::DiscreteInput.read_function_code(), 0x02);
        assert_eq!(RegisterArea::HoldingRegister.read_function_code(), 0x03);
        assert_eq!(RegisterArea::InputRegister.read_function_code(), 0x04);
    }

    #[test]
    fn test_max_read_quantity() {
        assert_eq!(RegisterArea::Coil.max_read_quantity(), 2000);
        assert_eq!(RegisterArea::DiscreteInput.max_read_quantity(), 2000);
        assert_eq!(RegisterArea::HoldingRegister.max_read_quantity(), 125);
        assert_eq!(RegisterArea::InputRegister.max_read_quantity(), 125);
    }

    #[test]
    fn test_display_and_parse() {
        for area in [
            RegisterArea::Coil,
            RegisterArea::DiscreteInput,
            RegisterArea::HoldingRegister,
            RegisterArea::InputRegister,
        ] {
            assert_eq!(area.to_string().parse::<RegisterArea>().unwrap(), area);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!("memory".parse::<RegisterArea>().is_err());
    }
}
