//! # Modbus Task Engine
//!
//! Non-blocking, poll-driven reads for Modbus TCP devices.
//!
//! A read is not a blocking call here. It is a [`Task`] that a [`Scheduler`]
//! advances one state transition per poll. Every poll returns at once, so a
//! single thread can keep many reads in flight across many connections.
//!
//! ## Features
//!
//! - **Never blocks**: a connection that is not ready leaves the task where it is
//! - **Resumable**: partial writes and partial frames pick up on the next poll
//! - **Cancellable**: a cancelled read stops within one poll and keeps nothing
//! - **Owned results**: responses are plain values, released once or dropped
//! - **No panics**: failures are recorded as [`TaskError`] in the execution context
//!
//! ## Quick Start
//!
//! ```
//! use modbus_task::{
//!     MockConnection, ModbusDriver, ReadExecution, ReadRequest, Scheduler, SharedConnection,
//! };
//!
//! fn main() -> modbus_task::Result<()> {
//!     // Any non-blocking byte stream works; a TcpConnection talks to a real device
//!     let mock = MockConnection::new();
//!     let connection = SharedConnection::new(mock.clone());
//!
//!     let driver = ModbusDriver::default();
//!     let mut scheduler = Scheduler::new();
//!
//!     // Read HR100..HR102
//!     let execution = ReadExecution::new(ReadRequest::parse("holding-register:100[3]")?, connection);
//!     driver.submit_read(&mut scheduler, &execution)?;
//!
//!     mock.push_inbound(&[
//!         0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x06,
//!         0x00, 0x01, 0x00, 0x02, 0x00, 0x03,
//!     ]);
//!     scheduler.run_until_idle(32);
//!
//!     let response = execution.take_outcome().unwrap().into_result()?;
//!     for item in &response {
//!         println!("HR{} = {:?}", item.address(), item.value());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Task Lifecycle
//!
//! | State | What a poll does |
//! |-------|------------------|
//! | `INIT` | checks the connection, validates and encodes the request |
//! | `SENDING` | takes the connection lease, drains an abandoned exchange, writes the unsent bytes |
//! | `AWAITING_RESPONSE` | one non-blocking read, waits for a full frame |
//! | `PARSING` | decodes the frame into one item per requested value |
//! | `FINISHED` / `ERROR` / `CANCELLED` | nothing; the task is completed |
//!
//! ## Register Areas
//!
//! | Area | Function | Data types |
//! |------|:--------:|------------|
//! | [`RegisterArea::Coil`] | 0x01 | `BOOL` |
//! | [`RegisterArea::DiscreteInput`] | 0x02 | `BOOL` |
//! | [`RegisterArea::HoldingRegister`] | 0x03 | `INT`, `UINT`, `DINT`, `UDINT`, `REAL` |
//! | [`RegisterArea::InputRegister`] | 0x04 | `INT`, `UINT`, `DINT`, `UDINT`, `REAL` |
//!
//! ## Error Handling
//!
//! Task creation returns [`Result<T, TaskError>`]. Once running, a task never
//! returns an error from `poll`; it records an [`Outcome`] in its
//! [`ReadExecution`] instead.
//!
//! ```
//! use modbus_task::{ErrorKind, Outcome, ReadExecution, ReadRequest, ModbusDriver, Scheduler};
//!
//! let driver = ModbusDriver::default();
//! let mut scheduler = Scheduler::new();
//! let execution = ReadExecution::without_connection(ReadRequest::parse("coil:0[4]").unwrap());
//! driver.submit_read(&mut scheduler, &execution).unwrap();
//! scheduler.run_until_idle(8);
//!
//! match execution.take_outcome() {
//!     Some(Outcome::Failed(err)) => assert_eq!(err.kind(), ErrorKind::Validation),
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber. Task
//! transitions are `debug`, byte counts are `trace`, failures are `warn`.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod area;
mod codec;
mod command;
mod driver;
mod error;
mod execution;
mod field;
mod header;
mod item;
mod mock;
mod read;
mod response;
mod scheduler;
mod task;
mod transport;
pub mod utils;
mod value;

// Public re-exports
pub use area::{RegisterArea, MAX_BITS_PER_READ, MAX_REGISTERS_PER_READ};
pub use codec::{Codec, ModbusTcpCodec, WordOrder};
pub use command::{ReadCommand, READ_REQUEST_SIZE};
pub use driver::{DriverConfig, ModbusDriver, ReadTask};
pub use error::{exception_description, ErrorKind, Result, TaskError};
pub use execution::{Outcome, ReadExecution, ReadRequest};
pub use field::{DataType, ModbusField};
pub use header::{MbapHeader, MBAP_HEADER_SIZE, MODBUS_PROTOCOL_ID};
pub use item::{ReadResponse, ResponseItem};
pub use mock::MockConnection;
pub use read::{ModbusReadMachine, ReadState, ReadStateId};
pub use response::{ModbusResponse, MIN_RESPONSE_SIZE};
pub use scheduler::{Scheduler, TaskId};
pub use task::{
    Completion, Schedulable, StateMachine, Step, StepStatus, Task, TaskEnv, TaskToken,
};
pub use transport::{
    Connection, ConnectionRef, SharedConnection, TcpConnection, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MODBUS_PORT, MAX_ADU_SIZE,
};
pub use value::PlcValue;
