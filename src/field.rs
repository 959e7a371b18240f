//! Field addresses: which values a read request asks for.
//!
//! A field names a register area, a start address, the data type of each value
//! and how many values to read. Fields can be built directly or parsed from
//! the textual address syntax:
//!
//! ```text
//! <area>:<address>[:<TYPE>][[<quantity>]]
//! ```
//!
//! | Example | Meaning |
//! |---------|---------|
//! | `holding-register:100[3]` | three `UINT` values at 100, 101, 102 |
//! | `coil:0[10]` | ten coils starting at 0 |
//! | `input-register:20:REAL[2]` | two `REAL` values at 20 and 22 |
//! | `discrete-input:7` | one discrete input |
//!
//! # Example
//!
//! ```
//! use modbus_task::{DataType, ModbusField, RegisterArea};
//!
//! let field: ModbusField = "input-register:20:REAL[2]".parse().unwrap();
//! assert_eq!(field.area, RegisterArea::InputRegister);
//! assert_eq!(field.data_type, DataType::Real);
//! assert_eq!(field.quantity, 2);
//! assert_eq!(field.unit_count(), 4);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::area::RegisterArea;
use crate::error::{Result, TaskError};

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<area>[a-z-]+):(?P<address>\d{1,5})(?::(?P<data_type>[A-Za-z]+))?(?:\[(?P<quantity>\d{1,4})\])?$",
    )
    .expect("field address pattern is valid")
});

/// Data type of each value in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Single bit (coils and discrete inputs only).
    Bool,
    /// Signed 16-bit integer, one register.
    Int,
    /// Unsigned 16-bit integer, one register.
    UInt,
    /// Signed 32-bit integer, two registers.
    DInt,
    /// Unsigned 32-bit integer, two registers.
    UDInt,
    /// 32-bit float, two registers.
    Real,
}

impl DataType {
    /// Number of bits or registers one value of this type occupies.
    pub fn width(self) -> u16 {
        match self {
            DataType::Bool | DataType::Int | DataType::UInt => 1,
            DataType::DInt | DataType::UDInt | DataType::Real => 2,
        }
    }

    /// Default data type for values read from `area`.
    pub fn default_for(area: RegisterArea) -> Self {
        if area.is_bit_area() {
            DataType::Bool
        } else {
            DataType::UInt
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "BOOL",
            DataType::Int => "INT",
            DataType::UInt => "UINT",
            DataType::DInt => "DINT",
            DataType::UDInt => "UDINT",
            DataType::Real => "REAL",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BOOL" => Ok(DataType::Bool),
            "INT" => Ok(DataType::Int),
            "UINT" => Ok(DataType::UInt),
            "DINT" => Ok(DataType::DInt),
            "UDINT" => Ok(DataType::UDInt),
            "REAL" => Ok(DataType::Real),
            _ => Err(TaskError::invalid_field(s, "unknown data type")),
        }
    }
}

/// A contiguous block of values in one register area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModbusField {
    /// Area the values live in.
    pub area: RegisterArea,
    /// Address of the first bit or register.
    pub address: u16,
    /// Type of each value.
    pub data_type: DataType,
    /// Number of values to read.
    pub quantity: u16,
}

impl ModbusField {
    /// Creates a field using the area's default data type.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::{DataType, ModbusField, RegisterArea};
    ///
    /// let field = ModbusField::new(RegisterArea::HoldingRegister, 100, 3);
    /// assert_eq!(field.data_type, DataType::UInt);
    /// ```
    pub fn new(area: RegisterArea, address: u16, quantity: u16) -> Self {
        Self {
            area,
            address,
            data_type: DataType::default_for(area),
            quantity,
        }
    }

    /// Sets the data type of each value.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Number of values (and therefore response items) the field yields.
    pub fn item_count(&self) -> usize {
        usize::from(self.quantity)
    }

    /// Number of bits or registers the field covers on the wire.
    pub fn unit_count(&self) -> u32 {
        u32::from(self.quantity) * u32::from(self.data_type.width())
    }

    /// Address of the value at `index` within this field.
    pub fn item_address(&self, index: usize) -> u16 {
        let offset = index.wrapping_mul(usize::from(self.data_type.width()));
        self.address.wrapping_add(offset as u16)
    }

    /// Checks that the field can be read in a single request.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidRequest` if:
    /// - the quantity is 0
    /// - the data type does not fit the area
    /// - the read exceeds the per-request limit of the area
    /// - the addressed range runs past address 65535
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(TaskError::invalid_request(
                "quantity",
                "must be greater than 0",
            ));
        }
        match (self.area.is_bit_area(), self.data_type) {
            (true, DataType::Bool) => {}
            (true, other) => {
                return Err(TaskError::invalid_request(
                    "data_type",
                    format!("{} only holds BOOL values, got {}", self.area, other),
                ));
            }
            (false, DataType::Bool) => {
                return Err(TaskError::invalid_request(
                    "data_type",
                    format!("BOOL cannot be read from {}", self.area),
                ));
            }
            (false, _) => {}
        }

        let units = self.unit_count();
        let limit = self.area.max_read_quantity();
        if units > u32::from(limit) {
            return Err(TaskError::invalid_request(
                "quantity",
                format!("{} covers {} units, limit is {}", self, units, limit),
            ));
        }
        if u32::from(self.address) + units - 1 > u32::from(u16::MAX) {
            return Err(TaskError::invalid_request(
                "address",
                format!("{} runs past address 65535", self),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ModbusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}[{}]",
            self.area, self.address, self.data_type, self.quantity
        )
    }
}

impl FromStr for ModbusField {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = FIELD_PATTERN
            .captures(s)
            .ok_or_else(|| TaskError::invalid_field(s, "does not match <area>:<address>[:<TYPE>][[<quantity>]]"))?;

        let area: RegisterArea = caps["area"].parse()?;
        let address: u32 = caps["address"]
            .parse()
            .map_err(|_| TaskError::invalid_field(s, "address is not a number"))?;
        let address = u16::try_from(address)
            .map_err(|_| TaskError::invalid_field(s, "address must be 0-65535"))?;
        let data_type = match caps.name("data_type") {
            Some(m) => m.as_str().parse()?,
            None => DataType::default_for(area),
        };
        let quantity = match caps.name("quantity") {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| TaskError::invalid_field(s, "quantity is not a number"))?,
            None => 1,
        };

        Ok(Self {
            area,
            address,
            data_type,
            quantity,
        })
    }
}
