//! Modbus read driver: creates read tasks and hands them to a scheduler.
//!
//! This module provides [`ModbusDriver`], the entry point for issuing reads,
//! and its [`DriverConfig`].
//!
//! # Overview
//!
//! The driver handles:
//! - Task creation with a preallocated receive buffer
//! - Transaction ID assignment for request/response correlation
//! - Submission to a [`Scheduler`] and the context back-reference
//! - Releasing responses once the caller is done with them
//!
//! It performs no I/O itself. All connection traffic happens inside the task
//! as the scheduler polls it.
//!
//! # Example
//!
//! ```
//! use modbus_task::{
//!     DriverConfig, MockConnection, ModbusDriver, PlcValue, ReadExecution, ReadRequest,
//!     Scheduler, SharedConnection,
//! };
//!
//! let mock = MockConnection::new();
//! let connection = SharedConnection::new(mock.clone());
//! let driver = ModbusDriver::new(DriverConfig::new(1));
//! let mut scheduler = Scheduler::new();
//!
//! let execution = ReadExecution::new(
//!     ReadRequest::parse("holding-register:100[2]")?,
//!     connection,
//! );
//! let id = driver.submit_read(&mut scheduler, &execution)?;
//!
//! // The first transaction ID is 0.
//! mock.push_inbound(&[
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x01,
//!     0x03, 0x04, 0x00, 0x2A, 0x00, 0x2B,
//! ]);
//! scheduler.run_until_idle(16);
//! assert_eq!(scheduler.is_completed(id), Some(true));
//!
//! let mut response = execution.take_outcome().unwrap().into_result()?;
//! assert_eq!(response.values(), vec![PlcValue::UInt(42), PlcValue::UInt(43)]);
//! assert_eq!(driver.release_response(&mut response), 2);
//! # Ok::<(), modbus_task::TaskError>(())
//! ```
//!
//! # Configuration
//!
//! The [`DriverConfig`] struct allows customization of:
//! - the unit ID requests are addressed to
//! - the register order of 32-bit values
//! - the largest response frame a task accepts

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU16, Ordering};

use tracing::debug;

use crate::codec::{Codec, ModbusTcpCodec, WordOrder};
use crate::error::{Result, TaskError};
use crate::execution::ReadExecution;
use crate::item::ReadResponse;
use crate::read::{ModbusReadMachine, ReadState};
use crate::scheduler::{Scheduler, TaskId};
use crate::task::Task;
use crate::transport::MAX_ADU_SIZE;

/// A task running a Modbus read.
pub type ReadTask<C = ModbusTcpCodec> = Task<ModbusReadMachine<C>>;

/// Configuration for creating a [`ModbusDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Unit ID requests are addressed to.
    pub unit_id: u8,
    /// Register order of 32-bit values.
    pub word_order: WordOrder,
    /// Largest response frame a task accepts, and the size of its receive
    /// buffer.
    pub max_frame_size: usize,
}

impl DriverConfig {
    /// Creates a configuration addressing `unit_id`.
    ///
    /// Uses high-word-first order and the Modbus TCP frame limit.
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::{DriverConfig, WordOrder};
    ///
    /// let config = DriverConfig::new(17);
    /// assert_eq!(config.unit_id, 17);
    /// assert_eq!(config.word_order, WordOrder::HighFirst);
    /// assert_eq!(config.max_frame_size, 260);
    /// ```
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            word_order: WordOrder::default(),
            max_frame_size: MAX_ADU_SIZE,
        }
    }

    /// Sets the register order of 32-bit values.
    pub fn with_word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    /// Sets the largest accepted response frame (default is 260 bytes).
    ///
    /// # Example
    ///
    /// ```
    /// use modbus_task::DriverConfig;
    ///
    /// let config = DriverConfig::new(1).with_max_frame_size(64);
    /// assert_eq!(config.max_frame_size, 64);
    /// ```
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Creates Modbus read tasks.
///
/// Each read gets its own transaction ID from an atomic counter, starting at
/// 0 and wrapping at 65535. The codec is shared by every task the driver
/// creates.
pub struct ModbusDriver<C: Codec + 'static = ModbusTcpCodec> {
    codec: Rc<C>,
    max_frame_size: usize,
    transaction_counter: AtomicU16,
}

impl ModbusDriver<ModbusTcpCodec> {
    /// Creates a Modbus TCP driver from `config`.
    pub fn new(config: DriverConfig) -> Self {
        let codec = ModbusTcpCodec::new(config.unit_id).with_word_order(config.word_order);
        Self::with_codec(codec, config.max_frame_size)
    }
}

impl Default for ModbusDriver<ModbusTcpCodec> {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl<C: Codec + 'static> ModbusDriver<C> {
    /// Creates a driver using a custom codec.
    pub fn with_codec(codec: C, max_frame_size: usize) -> Self {
        Self {
            codec: Rc::new(codec),
            max_frame_size,
            transaction_counter: AtomicU16::new(0),
        }
    }

    /// Returns the codec shared by this driver's tasks.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn next_transaction_id(&self) -> u16 {
        self.transaction_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates a read task for `execution` in its initial state.
    ///
    /// No I/O is performed. The task takes its connection from the context;
    /// a context without one produces a task that fails on its first poll.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Allocation` if the receive buffer cannot be
    /// reserved.
    pub fn create_read_task(&self, execution: &Rc<ReadExecution>) -> Result<ReadTask<C>> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(self.max_frame_size)
            .map_err(|_| TaskError::allocation(self.max_frame_size))?;

        let transaction_id = self.next_transaction_id();
        let machine = ModbusReadMachine::new(Rc::clone(&self.codec), transaction_id, self.max_frame_size);
        let task = Task::new(
            machine,
            ReadState::Init { buffer },
            Rc::clone(execution),
            execution.connection().cloned(),
        );
        debug!(
            task = %task.token(),
            tid = transaction_id,
            request = %execution.request(),
            "read task created"
        );
        Ok(task)
    }

    /// Creates a read task for `execution` and submits it to `scheduler`.
    ///
    /// The returned id is also recorded in the context.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Allocation` if the task cannot be created.
    pub fn submit_read(
        &self,
        scheduler: &mut Scheduler,
        execution: &Rc<ReadExecution>,
    ) -> Result<TaskId> {
        let task = self.create_read_task(execution)?;
        let id = scheduler.submit(task);
        execution.bind_task(id);
        Ok(id)
    }

    /// Releases every item of `response`. Returns how many values were
    /// dropped; a second call returns 0.
    pub fn release_response(&self, response: &mut ReadResponse) -> usize {
        response.release()
    }
}

impl<C: Codec + 'static> fmt::Debug for ModbusDriver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusDriver")
            .field("max_frame_size", &self.max_frame_size)
            .field(
                "next_transaction_id",
                &self.transaction_counter.load(Ordering::Relaxed),
            )
            .finish()
    }
}
