//! Helpers for bit unpacking, register combining and frame formatting.
//!
//! # Example
//!
//! ```
//! use modbus_task::utils::{combine_registers, format_frame, unpack_bits};
//! use modbus_task::WordOrder;
//!
//! assert_eq!(unpack_bits(&[0b0000_0101], 3), vec![true, false, true]);
//! assert_eq!(combine_registers(0x0001, 0x0002, WordOrder::HighFirst), 0x0001_0002);
//! assert_eq!(format_frame(&[0x00, 0x01, 0xFF]), "00 01 FF");
//! ```

use crate::codec::WordOrder;

/// Gets a single bit from a byte.
///
/// # Example
///
/// ```
/// use modbus_task::utils::get_bit;
///
/// let value: u8 = 0b0000_0101; // bits 0 and 2 are set
/// assert!(get_bit(value, 0));
/// assert!(!get_bit(value, 1));
/// assert!(get_bit(value, 2));
/// ```
#[inline]
pub fn get_bit(value: u8, bit: u8) -> bool {
    (value & (1 << bit)) != 0
}

/// Unpacks `count` bits from Modbus packed bytes, LSB of the first byte first.
///
/// Bits beyond the end of `bytes` are not produced, so the result may be
/// shorter than `count`.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |bit| get_bit(byte, bit)))
        .take(count)
        .collect()
}

/// Combines two consecutive registers into one 32-bit value.
///
/// `first` is the register at the lower address.
#[inline]
pub fn combine_registers(first: u16, second: u16, order: WordOrder) -> u32 {
    let (high, low) = match order {
        WordOrder::HighFirst => (first, second),
        WordOrder::LowFirst => (second, first),
    };
    (u32::from(high) << 16) | u32::from(low)
}

/// Formats bytes as space-separated uppercase hex, for logging frames.
pub fn format_frame(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
