//! Modbus TCP response parsing and validation.
//!
//! # Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 7 bytes | MBAP header |
//! | Function | 1 byte | Echoed function code, bit 7 set on exceptions |
//! | Byte count | 1 byte | Payload length (normal responses) |
//! | Payload | Variable | Packed bits or big-endian registers |
//!
//! An exception response carries a single exception code after the function
//! byte instead of a byte count and payload.
//!
//! # Example
//!
//! ```
//! use modbus_task::ModbusResponse;
//!
//! let bytes = [
//!     0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, // header
//!     0x03, 0x04,                               // function, byte count
//!     0x12, 0x34, 0x56, 0x78,                   // registers 0x1234, 0x5678
//! ];
//!
//! let response = ModbusResponse::from_bytes(&bytes).unwrap();
//! assert!(!response.is_exception());
//! assert_eq!(response.to_registers().unwrap(), vec![0x1234, 0x5678]);
//! ```

use crate::error::{Result, TaskError};
use crate::header::{MbapHeader, MBAP_HEADER_SIZE, MODBUS_PROTOCOL_ID};
use crate::utils::unpack_bits;

/// Minimum response size: header (7) + function code (1) + one byte of data.
pub const MIN_RESPONSE_SIZE: usize = MBAP_HEADER_SIZE + 2;

/// Bit set in the function code of exception responses.
const EXCEPTION_FLAG: u8 = 0x80;

/// Parsed Modbus TCP response.
#[derive(Debug, Clone)]
pub struct ModbusResponse {
    /// Response header.
    pub header: MbapHeader,
    /// Function code as sent by the device.
    pub function: u8,
    /// Everything after the function code.
    pub data: Vec<u8>,
}

impl ModbusResponse {
    /// Parses a response from one complete frame.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Decode` if:
    /// - The frame is too short
    /// - The protocol ID is not 0
    /// - The header's length field disagrees with the frame size
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        if frame.len() < MIN_RESPONSE_SIZE {
            return Err(TaskError::decode(format!(
                "response too short: expected at least {} bytes, got {}",
                MIN_RESPONSE_SIZE,
                frame.len()
            )));
        }

        let header = MbapHeader::from_bytes(frame)?;
        if header.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(TaskError::decode(format!(
                "unexpected protocol ID 0x{:04X}",
                header.protocol_id
            )));
        }
        if header.frame_len() != frame.len() {
            return Err(TaskError::decode(format!(
                "length field announces {} bytes, frame has {}",
                header.frame_len(),
                frame.len()
            )));
        }

        Ok(Self {
            header,
            function: frame[MBAP_HEADER_SIZE],
            data: frame[MBAP_HEADER_SIZE + 1..].to_vec(),
        })
    }

    /// Returns whether the device answered with an exception.
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_FLAG != 0
    }

    /// Returns `TaskError::Exception` if this is an exception response.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::ModbusResponse;
    ///
    /// let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];
    /// let response = ModbusResponse::from_bytes(&bytes).unwrap();
    /// assert!(response.check_exception().is_err());
    /// ```
    pub fn check_exception(&self) -> Result<()> {
        if self.is_exception() {
            let code = self.data.first().copied().unwrap_or(0);
            Err(TaskError::exception(self.function & !EXCEPTION_FLAG, code))
        } else {
            Ok(())
        }
    }

    /// Validates the transaction ID matches the request.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TransactionMismatch` if it doesn't.
    pub fn check_transaction(&self, expected: u16) -> Result<()> {
        if self.header.transaction_id == expected {
            Ok(())
        } else {
            Err(TaskError::transaction_mismatch(
                expected,
                self.header.transaction_id,
            ))
        }
    }

    /// Validates the unit ID matches the request.
    pub fn check_unit(&self, expected: u8) -> Result<()> {
        if self.header.unit_id == expected {
            Ok(())
        } else {
            Err(TaskError::decode(format!(
                "unit ID mismatch: expected {}, received {}",
                expected, self.header.unit_id
            )))
        }
    }

    /// Validates the function code echoes the request.
    pub fn check_function(&self, expected: u8) -> Result<()> {
        if self.function == expected {
            Ok(())
        } else {
            Err(TaskError::decode(format!(
                "function code mismatch: expected 0x{:02X}, received 0x{:02X}",
                expected, self.function
            )))
        }
    }

    /// Returns the payload after checking it against the byte count.
    pub fn payload(&self) -> Result<&[u8]> {
        let (&byte_count, payload) = self
            .data
            .split_first()
            .ok_or_else(|| TaskError::decode("missing byte count"))?;

        if payload.len() != usize::from(byte_count) {
            return Err(TaskError::decode(format!(
                "byte count says {} bytes, payload has {}",
                byte_count,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Converts the payload to registers (big-endian u16 values).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed or its length is odd.
    pub fn to_registers(&self) -> Result<Vec<u16>> {
        let payload = self.payload()?;
        if payload.len() % 2 != 0 {
            return Err(TaskError::decode(
                "payload length must be even for register conversion",
            ));
        }

        Ok(payload
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect())
    }

    /// Converts the payload to `count` bits, LSB of the first byte first.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload size does not match `count` bits.
    pub fn to_bits(&self, count: usize) -> Result<Vec<bool>> {
        let payload = self.payload()?;
        let expected = count.div_ceil(8);
        if payload.len() != expected {
            return Err(TaskError::decode(format!(
                "expected {} bytes for {} bits, got {}",
                expected,
                count,
                payload.len()
            )));
        }

        Ok(unpack_bits(payload, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(tid: u16, function: u8, data: &[u8]) -> Vec<u8> {
        let length = (data.len() + 2) as u16;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&tid.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.push(0x01);
        bytes.push(function);
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_from_bytes() {
        let bytes = make_response(0x0007, 0x03, &[0x02, 0x12, 0x34]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert_eq!(response.header.transaction_id, 0x0007);
        assert_eq!(response.header.unit_id, 0x01);
        assert_eq!(response.function, 0x03);
        assert_eq!(response.data, vec![0x02, 0x12, 0x34]);
    }

    #[test]
    fn test_from_bytes_too_short() {
        assert!(ModbusResponse::from_bytes(&[0x00, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_from_bytes_length_mismatch() {
        let mut bytes = make_response(1, 0x03, &[0x02, 0x12, 0x34]);
        bytes.push(0xFF);
        assert!(ModbusResponse::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_from_bytes_wrong_protocol() {
        let mut bytes = make_response(1, 0x03, &[0x02, 0x12, 0x34]);
        bytes[3] = 0x01;
        assert!(ModbusResponse::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_check_exception() {
        let response = ModbusResponse::from_bytes(&make_response(1, 0x83, &[0x02])).unwrap();
        assert!(response.is_exception());
        match response.check_exception().unwrap_err() {
            TaskError::Exception { function, code } => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
            }
            other => panic!("Expected Exception, got {other:?}"),
        }
    }

    #[test]
    fn test_check_transaction() {
        let response = ModbusResponse::from_bytes(&make_response(5, 0x03, &[0x00])).unwrap();
        assert!(response.check_transaction(5).is_ok());
        assert!(matches!(
            response.check_transaction(6),
            Err(TaskError::TransactionMismatch { expected: 6, received: 5 })
        ));
    }

    #[test]
    fn test_check_unit_and_function() {
        let response = ModbusResponse::from_bytes(&make_response(5, 0x03, &[0x00])).unwrap();
        assert!(response.check_unit(1).is_ok());
        assert!(response.check_unit(2).is_err());
        assert!(response.check_function(0x03).is_ok());
        assert!(response.check_function(0x04).is_err());
    }

    #[test]
    fn test_to_registers() {
        let bytes = make_response(1, 0x03, &[0x06, 0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert_eq!(response.to_registers().unwrap(), vec![0x1234, 0x5678, 0xABCD]);
    }

    #[test]
    fn test_to_registers_bad_byte_count() {
        let bytes = make_response(1, 0x03, &[0x04, 0x12, 0x34]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_registers().is_err());
    }

    #[test]
    fn test_to_registers_odd_length() {
        let bytes = make_response(1, 0x03, &[0x03, 0x12, 0x34, 0x56]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_registers().is_err());
    }

    #[test]
    fn test_to_bits() {
        // 0xCD = 1100_1101, LSB first
        let bytes = make_response(1, 0x01, &[0x02, 0xCD, 0x01]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        let bits = response.to_bits(9).unwrap();
        assert_eq!(
            bits,
            vec![true, false, true, true, false, false, true, true, true]
        );
    }

    #[test]
    fn test_to_bits_wrong_size() {
        let bytes = make_response(1, 0x01, &[0x01, 0xCD]);
        let response = ModbusResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_bits(9).is_err());
    }
}
