//! Error types for task creation, I/O and response decoding.

use std::io;
use thiserror::Error;

/// Result type alias for task engine operations.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur while creating or running a task.
///
/// Step functions never return these across the polling boundary. A failed
/// task records its error in the execution context, where the caller picks it
/// up once the task is completed.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Memory for the task or its buffers could not be obtained.
    #[error("Allocation failed: could not reserve {requested} bytes")]
    Allocation {
        /// Number of bytes that were requested.
        requested: usize,
    },

    /// The request failed validation.
    #[error("Invalid request parameter '{parameter}': {reason}")]
    InvalidRequest {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// A field address string could not be parsed.
    #[error("Invalid field address '{field}': {reason}")]
    InvalidField {
        /// The address string as given.
        field: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// The execution context does not carry a connection.
    #[error("No connection bound to the execution context")]
    MissingConnection,

    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection mid-exchange.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The response frame is malformed or does not match the request.
    #[error("Decode error: {reason}")]
    Decode {
        /// Description of the decode failure.
        reason: String,
    },

    /// The device answered with a Modbus exception.
    #[error(
        "Modbus exception: function 0x{function:02X}, code 0x{code:02X} ({})",
        exception_description(*.code)
    )]
    Exception {
        /// Function code of the rejected request.
        function: u8,
        /// Exception code returned by the device.
        code: u8,
    },

    /// Transaction ID mismatch between request and response.
    #[error("Transaction mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    TransactionMismatch {
        /// Transaction ID of the request.
        expected: u16,
        /// Transaction ID found in the response.
        received: u16,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse classification of [`TaskError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Task creation could not allocate.
    Allocation,
    /// The request or context was rejected before any I/O.
    Validation,
    /// The connection failed while sending or receiving.
    Connection,
    /// The response could not be decoded or did not match the request.
    Decode,
    /// The device rejected the request.
    Protocol,
    /// The caller aborted the operation.
    Cancelled,
}

impl TaskError {
    /// Creates a new `Allocation` error.
    pub fn allocation(requested: usize) -> Self {
        Self::Allocation { requested }
    }

    /// Creates a new `InvalidRequest` error.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::TaskError;
    ///
    /// let err = TaskError::invalid_request("quantity", "must be greater than 0");
    /// ```
    pub fn invalid_request(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidField` error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Decode` error.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::TaskError;
    ///
    /// let err = TaskError::decode("response too short");
    /// assert_eq!(err.to_string(), "Decode error: response too short");
    /// ```
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates a new `Exception` error.
    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception { function, code }
    }

    /// Creates a new `TransactionMismatch` error.
    pub fn transaction_mismatch(expected: u16, received: u16) -> Self {
        Self::TransactionMismatch { expected, received }
    }

    /// Returns the coarse category of this error.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::{ErrorKind, TaskError};
    ///
    /// assert_eq!(TaskError::decode("short").kind(), ErrorKind::Decode);
    /// assert_eq!(TaskError::MissingConnection.kind(), ErrorKind::Validation);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Allocation { .. } => ErrorKind::Allocation,
            Self::InvalidRequest { .. } | Self::InvalidField { .. } | Self::MissingConnection => {
                ErrorKind::Validation
            }
            Self::Io(_) | Self::ConnectionClosed => ErrorKind::Connection,
            Self::Decode { .. } | Self::TransactionMismatch { .. } => ErrorKind::Decode,
            Self::Exception { .. } => ErrorKind::Protocol,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Returns a human-readable description for a Modbus exception code.
///
/// # Example
///
/// ```
/// use modbus_task::exception_description;
///
/// assert_eq!(exception_description(0x02), "illegal data address");
/// ```
pub fn exception_description(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "server device failure",
        0x05 => "acknowledge",
        0x06 => "server device busy",
        0x08 => "memory parity error",
        0x0A => "gateway path unavailable",
        0x0B => "gateway target device failed to respond",
        _ => "unknown exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        let err = TaskError::exception(0x03, 0x02);
        assert_eq!(
            err.to_string(),
            "Modbus exception: function 0x03, code 0x02 (illegal data address)"
        );
        assert!(TaskError::exception(0x04, 0x7F)
            .to_string()
            .ends_with("(unknown exception)"));
    }

    #[test]
    fn test_invalid_request_display() {
        let err = TaskError::invalid_request("quantity", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid request parameter 'quantity': must be greater than 0"
        );
    }

    #[test]
    fn test_transaction_mismatch_display() {
        let err = TaskError::transaction_mismatch(0x0001, 0x0002);
        assert_eq!(
            err.to_string(),
            "Transaction mismatch: expected 0x0001, received 0x0002"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(TaskError::allocation(16).kind(), ErrorKind::Allocation);
        assert_eq!(
            TaskError::invalid_field("x", "bad").kind(),
            ErrorKind::Validation
        );
        assert_eq!(TaskError::ConnectionClosed.kind(), ErrorKind::Connection);
        assert_eq!(
            TaskError::from(io::Error::from(io::ErrorKind::BrokenPipe)).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            TaskError::transaction_mismatch(1, 2).kind(),
            ErrorKind::Decode
        );
        assert_eq!(TaskError::exception(3, 2).kind(), ErrorKind::Protocol);
        assert_eq!(TaskError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_unknown_exception_description() {
        assert_eq!(exception_description(0x7F), "unknown exception");
    }
}
