//! Request encoding and response decoding.
//!
//! Tasks sequence calls to a [`Codec`] and never look inside frames
//! themselves. [`ModbusTcpCodec`] is the codec for Modbus TCP devices; a
//! driver for another framing supplies its own implementation.
//!
//! # Example
//!
//! ```
//! use modbus_task::{Codec, ModbusTcpCodec, PlcValue, ReadRequest};
//!
//! let codec = ModbusTcpCodec::new(1);
//! let request = ReadRequest::parse("holding-register:100[2]").unwrap();
//!
//! let frame = codec.encode_request(&request, 7).unwrap();
//! assert_eq!(frame.len(), 12);
//!
//! let response = [
//!     0x00, 0x07, 0x00, 0x00, 0x00, 0x07, 0x01,
//!     0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B,
//! ];
//! assert_eq!(codec.frame_length(&response), Some(13));
//! let values = codec.decode_response(&response, &request, 7).unwrap();
//! assert_eq!(values, vec![PlcValue::UInt(10), PlcValue::UInt(11)]);
//! ```

use crate::command::ReadCommand;
use crate::error::{Result, TaskError};
use crate::execution::ReadRequest;
use crate::field::DataType;
use crate::header::MBAP_PREFIX_SIZE;
use crate::response::ModbusResponse;
use crate::utils::combine_registers;
use crate::value::PlcValue;

/// Encodes read requests and decodes their responses for one framing.
pub trait Codec {
    /// Builds the request frame for `request`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidRequest` if the request cannot be expressed
    /// in one frame.
    fn encode_request(&self, request: &ReadRequest, transaction_id: u16) -> Result<Vec<u8>>;

    /// Returns the full size of the frame at the start of `buffer`, or `None`
    /// while too few bytes have arrived to tell.
    fn frame_length(&self, buffer: &[u8]) -> Option<usize>;

    /// Decodes one complete response frame into values, in request order.
    ///
    /// The result holds however many values the frame carries; the caller
    /// compares that against the requested count.
    fn decode_response(
        &self,
        frame: &[u8],
        request: &ReadRequest,
        transaction_id: u16,
    ) -> Result<Vec<PlcValue>>;
}

/// Order of the two registers that make up a 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordOrder {
    /// Register at the lower address holds the high word.
    #[default]
    HighFirst,
    /// Register at the lower address holds the low word.
    LowFirst,
}

/// Codec for Modbus TCP (MBAP framed) devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusTcpCodec {
    unit_id: u8,
    word_order: WordOrder,
}

impl ModbusTcpCodec {
    /// Creates a codec addressing `unit_id`, high word first.
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            word_order: WordOrder::default(),
        }
    }

    /// Sets the register order of 32-bit values.
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Returns the unit ID requests are addressed to.
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Returns the register order of 32-bit values.
    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    fn decode_registers(&self, registers: &[u16], data_type: DataType) -> Vec<PlcValue> {
        match data_type {
            DataType::Int => registers.iter().map(|&r| PlcValue::Int(r as i16)).collect(),
            DataType::UInt | DataType::Bool => {
                registers.iter().map(|&r| PlcValue::UInt(r)).collect()
            }
            DataType::DInt | DataType::UDInt | DataType::Real => registers
                .chunks_exact(2)
                .map(|pair| {
                    let raw = combine_registers(pair[0], pair[1], self.word_order);
                    match data_type {
                        DataType::DInt => PlcValue::DInt(raw as i32),
                        DataType::Real => PlcValue::Real(f32::from_bits(raw)),
                        _ => PlcValue::UDInt(raw),
                    }
                })
                .collect(),
        }
    }
}

impl Default for ModbusTcpCodec {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Codec for ModbusTcpCodec {
    fn encode_request(&self, request: &ReadRequest, transaction_id: u16) -> Result<Vec<u8>> {
        let cmd = ReadCommand::new(transaction_id, self.unit_id, request.field())?;
        Ok(cmd.to_bytes())
    }

    fn frame_length(&self, buffer: &[u8]) -> Option<usize> {
        if buffer.len() < MBAP_PREFIX_SIZE {
            return None;
        }
        let length = u16::from_be_bytes([buffer[4], buffer[5]]);
        Some(MBAP_PREFIX_SIZE + usize::from(length))
    }

    fn decode_response(
        &self,
        frame: &[u8],
        request: &ReadRequest,
        transaction_id: u16,
    ) -> Result<Vec<PlcValue>> {
        let field = request.field();
        let response = ModbusResponse::from_bytes(frame)?;
        response.check_transaction(transaction_id)?;
        response.check_unit(self.unit_id)?;
        response.check_exception()?;
        response.check_function(field.area.read_function_code())?;

        if field.area.is_bit_area() {
            let bits = response.to_bits(field.item_count())?;
            return Ok(bits.into_iter().map(PlcValue::Bool).collect());
        }

        let registers = response.to_registers()?;
        let width = usize::from(field.data_type.width());
        if registers.len() % width != 0 {
            return Err(TaskError::decode(format!(
                "{} registers do not split into {} values",
                registers.len(),
                field.data_type
            )));
        }
        Ok(self.decode_registers(&registers, field.data_type))
    }
}
