//! Read requests and the execution context that tracks one of them.
//!
//! A [`ReadExecution`] is created by the caller, shared with the task that
//! fulfils it and outlives that task. It carries the request, the connection
//! to use, a cancellation flag and the slot the task records its [`Outcome`]
//! into.
//!
//! # Example
//!
//! ```
//! use modbus_task::{MockConnection, ReadExecution, ReadRequest, SharedConnection};
//!
//! let request = ReadRequest::parse("holding-register:100[3]").unwrap();
//! let connection = SharedConnection::new(MockConnection::new());
//! let execution = ReadExecution::new(request, connection);
//!
//! assert_eq!(execution.request().item_count(), 3);
//! assert!(!execution.is_settled());
//!
//! execution.cancel();
//! assert!(execution.is_cancelled());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::error::{Result, TaskError};
use crate::field::ModbusField;
use crate::item::ReadResponse;
use crate::scheduler::TaskId;
use crate::transport::ConnectionRef;

/// A request to read one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    field: ModbusField,
}

impl ReadRequest {
    /// Creates a request for `field`.
    ///
    /// The field is validated when the task starts, not here.
    pub fn new(field: ModbusField) -> Self {
        Self { field }
    }

    /// Parses a request from a field address such as `holding-register:100[3]`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidField` if the address does not parse.
    pub fn parse(address: &str) -> Result<Self> {
        Ok(Self::new(address.parse()?))
    }

    /// The field this request reads.
    pub fn field(&self) -> &ModbusField {
        &self.field
    }

    /// Number of values the request asks for.
    pub fn item_count(&self) -> usize {
        self.field.item_count()
    }
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read {}", self.field)
    }
}

/// How a read ended.
#[derive(Debug)]
pub enum Outcome {
    /// All requested values arrived.
    Finished(ReadResponse),
    /// The read failed.
    Failed(TaskError),
    /// The caller cancelled the read.
    Cancelled,
}

impl Outcome {
    /// The response, if the read finished.
    pub fn response(&self) -> Option<&ReadResponse> {
        match self {
            Outcome::Finished(response) => Some(response),
            _ => None,
        }
    }

    /// The error, if the read failed.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Converts into a `Result`, mapping cancellation to `TaskError::Cancelled`.
    pub fn into_result(self) -> Result<ReadResponse> {
        match self {
            Outcome::Finished(response) => Ok(response),
            Outcome::Failed(err) => Err(err),
            Outcome::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

/// Caller-owned context of one read.
pub struct ReadExecution {
    request: ReadRequest,
    connection: Option<ConnectionRef>,
    cancelled: Cell<bool>,
    outcome: RefCell<Option<Outcome>>,
    task: Cell<Option<TaskId>>,
}

impl ReadExecution {
    /// Creates a context reading `request` over `connection`.
    pub fn new(request: ReadRequest, connection: ConnectionRef) -> Rc<Self> {
        Self::build(request, Some(connection))
    }

    /// Creates a context with no connection.
    ///
    /// A task started from it fails validation before doing any I/O.
    pub fn without_connection(request: ReadRequest) -> Rc<Self> {
        Self::build(request, None)
    }

    fn build(request: ReadRequest, connection: Option<ConnectionRef>) -> Rc<Self> {
        Rc::new(Self {
            request,
            connection,
            cancelled: Cell::new(false),
            outcome: RefCell::new(None),
            task: Cell::new(None),
        })
    }

    /// The request being executed.
    pub fn request(&self) -> &ReadRequest {
        &self.request
    }

    /// The connection the request targets.
    pub fn connection(&self) -> Option<&ConnectionRef> {
        self.connection.as_ref()
    }

    /// Asks the task to stop. Takes effect on its next poll unless it has
    /// already completed.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Returns whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// The scheduler slot of the task fulfilling this request, once submitted.
    pub fn task(&self) -> Option<TaskId> {
        self.task.get()
    }

    pub(crate) fn bind_task(&self, id: TaskId) {
        self.task.set(Some(id));
    }

    /// Stores the outcome. Only the first outcome is kept.
    pub(crate) fn record(&self, outcome: Outcome) {
        let mut slot = self.outcome.borrow_mut();
        if slot.is_some() {
            warn!(?outcome, "outcome already recorded, dropping");
            return;
        }
        *slot = Some(outcome);
    }

    /// Returns whether an outcome is recorded and not yet taken.
    pub fn is_settled(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Takes the recorded outcome, leaving the slot empty.
    pub fn take_outcome(&self) -> Option<Outcome> {
        self.outcome.borrow_mut().take()
    }
}

impl fmt::Debug for ReadExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadExecution")
            .field("request", &self.request)
            .field("connection", &self.connection)
            .field("cancelled", &self.cancelled.get())
            .field("task", &self.task.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::RegisterArea;
    use crate::field::DataType;
    use crate::item::ResponseItem;
    use crate::value::PlcValue;

    #[test]
    fn test_parse_request() {
        let request = ReadRequest::parse("coil:4[12]").unwrap();
        assert_eq!(request.field().area, RegisterArea::Coil);
        assert_eq!(request.item_count(), 12);
        assert_eq!(request.to_string(), "read coil:4:BOOL[12]");
    }

    #[test]
    fn test_parse_request_invalid() {
        assert!(matches!(
            ReadRequest::parse("nowhere:1"),
            Err(TaskError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_first_outcome_wins() {
        let request = ReadRequest::new(ModbusField::new(RegisterArea::HoldingRegister, 0, 1));
        let execution = ReadExecution::without_connection(request);
        assert!(execution.connection().is_none());

        execution.record(Outcome::Failed(TaskError::MissingConnection));
        execution.record(Outcome::Cancelled);
        assert!(execution.is_settled());

        let outcome = execution.take_outcome().unwrap();
        assert!(matches!(outcome.error(), Some(TaskError::MissingConnection)));
        assert!(execution.take_outcome().is_none());
        assert!(!execution.is_settled());
    }

    #[test]
    fn test_outcome_into_result() {
        let mut response = ReadResponse::default();
        response.push(ResponseItem::new(0, DataType::UInt, PlcValue::UInt(1)));
        let finished = Outcome::Finished(response);
        assert_eq!(finished.response().map(ReadResponse::len), Some(1));
        assert_eq!(finished.into_result().unwrap().len(), 1);

        assert!(matches!(
            Outcome::Cancelled.into_result(),
            Err(TaskError::Cancelled)
        ));
    }
}
