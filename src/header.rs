//! MBAP header for Modbus TCP frames.
//!
//! Every Modbus TCP request and response starts with the 7-byte Modbus
//! Application Protocol header:
//!
//! | Bytes | Field | Description |
//! |-------|-------|-------------|
//! | 0-1 | Transaction ID | Echoed by the server, matches responses to requests |
//! | 2-3 | Protocol ID | Always 0 for Modbus |
//! | 4-5 | Length | Number of bytes that follow, unit ID included |
//! | 6 | Unit ID | Addressed device behind a gateway (1 for most devices) |
//!
//! All fields are big-endian.
//!
//! # Example
//!
//! ```
//! use modbus_task::MbapHeader;
//!
//! let header = MbapHeader::new_request(0x0001, 1, 5);
//! assert_eq!(header.to_bytes(), [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01]);
//! ```

use crate::error::{Result, TaskError};

/// MBAP header size in bytes.
pub const MBAP_HEADER_SIZE: usize = 7;

/// Bytes of the header that precede the length-counted part of a frame.
pub(crate) const MBAP_PREFIX_SIZE: usize = 6;

/// Protocol identifier for Modbus.
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Modbus Application Protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier.
    pub transaction_id: u16,
    /// Protocol identifier (0 for Modbus).
    pub protocol_id: u16,
    /// Byte count of unit ID plus PDU.
    pub length: u16,
    /// Unit identifier.
    pub unit_id: u8,
}

impl MbapHeader {
    /// Creates a request header for a PDU of `pdu_len` bytes.
    pub fn new_request(transaction_id: u16, unit_id: u8, pdu_len: u16) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: pdu_len + 1,
            unit_id,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(self) -> [u8; MBAP_HEADER_SIZE] {
        let [tid_hi, tid_lo] = self.transaction_id.to_be_bytes();
        let [pid_hi, pid_lo] = self.protocol_id.to_be_bytes();
        let [len_hi, len_lo] = self.length.to_be_bytes();
        [tid_hi, tid_lo, pid_hi, pid_lo, len_hi, len_lo, self.unit_id]
    }

    /// Parses a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Decode` if the slice is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::MbapHeader;
    ///
    /// let header = MbapHeader::from_bytes(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x09, 0x01]).unwrap();
    /// assert_eq!(header.transaction_id, 0x1234);
    /// assert_eq!(header.length, 9);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MBAP_HEADER_SIZE {
            return Err(TaskError::decode(format!(
                "header too short: expected {} bytes, got {}",
                MBAP_HEADER_SIZE,
                data.len()
            )));
        }

        Ok(Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            unit_id: data[6],
        })
    }

    /// Total frame size announced by this header.
    pub fn frame_len(self) -> usize {
        MBAP_PREFIX_SIZE + usize::from(self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request() {
        let header = MbapHeader::new_request(0x0102, 0x11, 5);
        assert_eq!(header.transaction_id, 0x0102);
        assert_eq!(header.protocol_id, 0);
        assert_eq!(header.length, 6);
        assert_eq!(header.unit_id, 0x11);
    }

    #[test]
    fn test_to_bytes() {
        let header = MbapHeader::new_request(0xABCD, 0x01, 5);
        assert_eq!(
            header.to_bytes(),
            [0xAB, 0xCD, 0x00, 0x00, 0x00, 0x06, 0x01]
        );
    }

    #[test]
    fn test_from_bytes_too_short() {
        assert!(MbapHeader::from_bytes(&[0x00, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_frame_len() {
        let header = MbapHeader::from_bytes(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x01]).unwrap();
        assert_eq!(header.frame_len(), 15);
    }

    #[test]
    fn test_header_roundtrip() {
        let original = MbapHeader::new_request(0xFFFF, 0xF7, 5);
        let parsed = MbapHeader::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, parsed);
    }
}
