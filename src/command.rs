//! Read request frames.
//!
//! [`ReadCommand`] validates a [`ModbusField`] and serializes the matching
//! Modbus TCP read request: MBAP header followed by a 5-byte PDU.
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0-6 | MBAP header |
//! | 7 | Function code (0x01-0x04) |
//! | 8-9 | Start address |
//! | 10-11 | Quantity of bits or registers |
//!
//! # Example
//!
//! ```
//! use modbus_task::{ModbusField, ReadCommand, RegisterArea};
//!
//! let field = ModbusField::new(RegisterArea::HoldingRegister, 100, 3);
//! let cmd = ReadCommand::new(0x0001, 1, &field).unwrap();
//! assert_eq!(
//!     cmd.to_bytes(),
//!     vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x64, 0x00, 0x03]
//! );
//! ```

use crate::area::RegisterArea;
use crate::error::Result;
use crate::field::ModbusField;
use crate::header::{MbapHeader, MBAP_HEADER_SIZE};

/// PDU size of every read request: function code, address, quantity.
pub(crate) const READ_PDU_SIZE: u16 = 5;

/// Size of a serialized read request frame.
pub const READ_REQUEST_SIZE: usize = MBAP_HEADER_SIZE + READ_PDU_SIZE as usize;

/// A validated read request for one field.
#[derive(Debug, Clone)]
pub struct ReadCommand {
    header: MbapHeader,
    area: RegisterArea,
    address: u16,
    quantity: u16,
}

impl ReadCommand {
    /// Creates a read command covering every bit or register of `field`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidRequest` if the field fails
    /// [`ModbusField::validate`].
    pub fn new(transaction_id: u16, unit_id: u8, field: &ModbusField) -> Result<Self> {
        field.validate()?;

        Ok(Self {
            header: MbapHeader::new_request(transaction_id, unit_id, READ_PDU_SIZE),
            area: field.area,
            address: field.address,
            // validate() caps the unit count at 2000
            quantity: field.unit_count() as u16,
        })
    }

    /// Returns the transaction ID.
    pub fn transaction_id(&self) -> u16 {
        self.header.transaction_id
    }

    /// Returns the function code this command uses.
    pub fn function_code(&self) -> u8 {
        self.area.read_function_code()
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(READ_REQUEST_SIZE);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(self.function_code());
        bytes.extend_from_slice(&self.address.to_be_bytes());
        bytes.extend_from_slice(&self.quantity.to_be_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DataType;

    #[test]
    fn test_read_coils_bytes() {
        let field = ModbusField::new(RegisterArea::Coil, 0x0013, 19);
        let cmd = ReadCommand::new(0x0A0B, 0x11, &field).unwrap();
        assert_eq!(
            cmd.to_bytes(),
            vec![0x0A, 0x0B, 0x00, 0x00, 0x00, 0x06, 0x11, 0x01, 0x00, 0x13, 0x00, 0x13]
        );
    }

    #[test]
    fn test_two_register_types_double_quantity() {
        let field = ModbusField::new(RegisterArea::InputRegister, 8, 3).with_data_type(DataType::Real);
        let cmd = ReadCommand::new(1, 1, &field).unwrap();
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), READ_REQUEST_SIZE);
        assert_eq!(bytes[7], 0x04);
        assert_eq!(&bytes[10..12], &[0x00, 0x06]);
    }

    #[test]
    fn test_invalid_field_rejected() {
        let field = ModbusField::new(RegisterArea::HoldingRegister, 0, 0);
        assert!(ReadCommand::new(1, 1, &field).is_err());
    }

    #[test]
    fn test_accessors() {
        let field = ModbusField::new(RegisterArea::DiscreteInput, 0, 1);
        let cmd = ReadCommand::new(0x42, 1, &field).unwrap();
        assert_eq!(cmd.transaction_id(), 0x42);
        assert_eq!(cmd.function_code(), 0x02);
    }
}
