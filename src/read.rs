//! The read state machine.
//!
//! A read moves through these states, one transition per poll:
//!
//! ```text
//! INIT -> SENDING -> AWAITING_RESPONSE -> PARSING -> FINISHED
//!   \________\______________\______________\______> ERROR
//!   \________\______________\______________\______> CANCELLED
//! ```
//!
//! `SENDING` and `AWAITING_RESPONSE` may repeat while the connection is not
//! ready or only part of a frame has moved. Each state owns exactly the
//! buffers it needs, so nothing outlives the state that uses it.
//!
//! A task cancelled or dropped with its exchange open hands the exchange to
//! its [`SharedConnection`]. The next task to take the lease drains it from
//! `SENDING` before writing its own request.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::codec::Codec;
use crate::error::{Result, TaskError};
use crate::execution::{Outcome, ReadExecution};
use crate::item::{ReadResponse, ResponseItem};
use crate::task::{Completion, StateMachine, Step, TaskEnv};
use crate::transport::{is_not_ready, AbandonedExchange, SharedConnection};
use crate::utils::format_frame;

/// State of a read task.
#[derive(Debug)]
pub enum ReadState {
    /// Created, nothing sent yet. Holds the preallocated receive buffer.
    Init {
        /// Receive buffer reserved at task creation.
        buffer: Vec<u8>,
    },
    /// Writing the request frame.
    Sending {
        /// Encoded request.
        frame: Vec<u8>,
        /// Bytes of `frame` already written.
        written: usize,
        /// Receive buffer, unused until the request is out.
        buffer: Vec<u8>,
    },
    /// Collecting the response frame.
    AwaitingResponse {
        /// Bytes received so far.
        buffer: Vec<u8>,
    },
    /// Decoding a complete response frame.
    Parsing {
        /// The complete response frame.
        frame: Vec<u8>,
        /// Items decoded so far.
        store: ReadResponse,
    },
    /// All values were read and handed to the execution context.
    Finished,
    /// The read failed; the reason is in the execution context.
    Error,
    /// The read was cancelled.
    Cancelled,
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::Init { buffer: Vec::new() }
    }
}

impl ReadState {
    /// Payload-free identifier of this state.
    pub fn id(&self) -> ReadStateId {
        match self {
            ReadState::Init { .. } => ReadStateId::Init,
            ReadState::Sending { .. } => ReadStateId::Sending,
            ReadState::AwaitingResponse { .. } => ReadStateId::AwaitingResponse,
            ReadState::Parsing { .. } => ReadStateId::Parsing,
            ReadState::Finished => ReadStateId::Finished,
            ReadState::Error => ReadStateId::Error,
            ReadState::Cancelled => ReadStateId::Cancelled,
        }
    }

    /// Returns whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.id().is_terminal()
    }
}

/// Identifies a [`ReadState`] without its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStateId {
    /// See [`ReadState::Init`].
    Init,
    /// See [`ReadState::Sending`].
    Sending,
    /// See [`ReadState::AwaitingResponse`].
    AwaitingResponse,
    /// See [`ReadState::Parsing`].
    Parsing,
    /// See [`ReadState::Finished`].
    Finished,
    /// See [`ReadState::Error`].
    Error,
    /// See [`ReadState::Cancelled`].
    Cancelled,
}

impl ReadStateId {
    /// Returns whether this identifies a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReadStateId::Finished | ReadStateId::Error | ReadStateId::Cancelled
        )
    }
}

impl fmt::Display for ReadStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadStateId::Init => "INIT",
            ReadStateId::Sending => "SENDING",
            ReadStateId::AwaitingResponse => "AWAITING_RESPONSE",
            ReadStateId::Parsing => "PARSING",
            ReadStateId::Finished => "FINISHED",
            ReadStateId::Error => "ERROR",
            ReadStateId::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

type Env<'a> = TaskEnv<'a, ReadExecution>;

/// Steps one read request through encode, send, receive and decode.
pub struct ModbusReadMachine<C: Codec> {
    codec: Rc<C>,
    transaction_id: u16,
    max_frame_size: usize,
}

impl<C: Codec> ModbusReadMachine<C> {
    pub(crate) fn new(codec: Rc<C>, transaction_id: u16, max_frame_size: usize) -> Self {
        Self {
            codec,
            transaction_id,
            max_frame_size,
        }
    }

    /// Transaction ID the request is sent with.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Largest response frame the machine accepts.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn advance(&self, state: ReadState, env: &Env<'_>) -> Step<ReadState> {
        if state.is_terminal() {
            return Step::Wait(state);
        }
        if env.context.is_cancelled() {
            return Step::Next(self.cancel(state, env));
        }

        match state {
            ReadState::Init { buffer } => self.start(buffer, env),
            ReadState::Sending {
                frame,
                written,
                buffer,
            } => self.send(frame, written, buffer, env),
            ReadState::AwaitingResponse { buffer } => self.receive(buffer, env),
            ReadState::Parsing { frame, store } => self.parse(&frame, store, env),
            terminal => Step::Wait(terminal),
        }
    }

    fn start(&self, buffer: Vec<u8>, env: &Env<'_>) -> Step<ReadState> {
        if env.connection.is_none() {
            return Step::Next(self.fail(TaskError::MissingConnection, env));
        }

        match self
            .codec
            .encode_request(env.context.request(), self.transaction_id)
        {
            Ok(frame) => {
                trace!(
                    task = %env.token,
                    tid = self.transaction_id,
                    frame = %format_frame(&frame),
                    "request encoded"
                );
                Step::Next(ReadState::Sending {
                    frame,
                    written: 0,
                    buffer,
                })
            }
            Err(err) => Step::Next(self.fail(err, env)),
        }
    }

    fn send(
        &self,
        frame: Vec<u8>,
        written: usize,
        buffer: Vec<u8>,
        env: &Env<'_>,
    ) -> Step<ReadState> {
        let Some(connection) = env.connection else {
            return Step::Next(self.fail(TaskError::MissingConnection, env));
        };
        if !connection.try_acquire(env.token) {
            trace!(task = %env.token, "connection busy");
            return Step::Wait(ReadState::Sending {
                frame,
                written,
                buffer,
            });
        }
        match self.drain(connection, env) {
            Ok(true) => {}
            Ok(false) => {
                return Step::Wait(ReadState::Sending {
                    frame,
                    written,
                    buffer,
                })
            }
            Err(err) => return Step::Next(self.fail(err, env)),
        }

        match connection.write(&frame[written..]) {
            Ok(0) => Step::Next(self.fail(TaskError::ConnectionClosed, env)),
            Ok(n) => {
                let written = written + n;
                trace!(task = %env.token, written, total = frame.len(), "request bytes written");
                if written == frame.len() {
                    Step::Next(ReadState::AwaitingResponse { buffer })
                } else {
                    Step::Wait(ReadState::Sending {
                        frame,
                        written,
                        buffer,
                    })
                }
            }
            Err(err) if is_not_ready(&err) => Step::Wait(ReadState::Sending {
                frame,
                written,
                buffer,
            }),
            Err(err) => Step::Next(self.fail(err.into(), env)),
        }
    }

    fn receive(&self, mut buffer: Vec<u8>, env: &Env<'_>) -> Step<ReadState> {
        let Some(connection) = env.connection else {
            return Step::Next(self.fail(TaskError::MissingConnection, env));
        };

        let filled = buffer.len();
        if filled >= self.max_frame_size {
            return Step::Next(self.fail(self.no_frame_error(), env));
        }

        buffer.resize(self.max_frame_size, 0);
        let received = match connection.read(&mut buffer[filled..]) {
            Ok(0) => return Step::Next(self.fail(TaskError::ConnectionClosed, env)),
            Ok(n) => n,
            Err(err) if is_not_ready(&err) => {
                buffer.truncate(filled);
                return Step::Wait(ReadState::AwaitingResponse { buffer });
            }
            Err(err) => return Step::Next(self.fail(err.into(), env)),
        };
        buffer.truncate(filled + received);
        trace!(task = %env.token, received, buffered = buffer.len(), "response bytes read");

        let frame_len = match self.frame_end(&buffer) {
            Ok(Some(len)) => len,
            Ok(None) => return Step::Wait(ReadState::AwaitingResponse { buffer }),
            Err(err) => return Step::Next(self.fail(err, env)),
        };
        if buffer.len() > frame_len {
            warn!(
                task = %env.token,
                discarded = buffer.len() - frame_len,
                "discarding bytes after response frame"
            );
            buffer.truncate(frame_len);
        }

        trace!(task = %env.token, frame = %format_frame(&buffer), "response frame complete");
        connection.release(env.token);
        let store = ReadResponse::with_capacity(env.context.request().item_count());
        Step::Next(ReadState::Parsing {
            frame: buffer,
            store,
        })
    }

    /// Length of the frame at the start of `buffer` once all of it is in.
    fn frame_end(&self, buffer: &[u8]) -> Result<Option<usize>> {
        let Some(frame_len) = self.codec.frame_length(buffer) else {
            return Ok(None);
        };
        if frame_len > self.max_frame_size {
            return Err(TaskError::decode(format!(
                "frame of {} bytes exceeds the {} byte limit",
                frame_len, self.max_frame_size
            )));
        }
        Ok((buffer.len() >= frame_len).then_some(frame_len))
    }

    fn no_frame_error(&self) -> TaskError {
        TaskError::decode(format!(
            "no complete frame within {} bytes",
            self.max_frame_size
        ))
    }

    /// Finishes an exchange a previous lease holder left open.
    ///
    /// Returns `Ok(true)` once the connection is clear for this task's
    /// request. The abandoned exchange is dropped if draining fails, since
    /// the connection is unusable by then.
    fn drain(&self, connection: &SharedConnection, env: &Env<'_>) -> Result<bool> {
        let Some(mut exchange) = connection.take_abandoned() else {
            return Ok(true);
        };
        if self.drain_exchange(connection, &mut exchange, env)? {
            debug!(task = %env.token, "abandoned exchange drained");
            Ok(true)
        } else {
            connection.restore_abandoned(exchange);
            Ok(false)
        }
    }

    fn drain_exchange(
        &self,
        connection: &SharedConnection,
        exchange: &mut AbandonedExchange,
        env: &Env<'_>,
    ) -> Result<bool> {
        if !exchange.unsent.is_empty() {
            match connection.write(&exchange.unsent) {
                Ok(0) => return Err(TaskError::ConnectionClosed),
                Ok(n) => {
                    exchange.unsent.drain(..n);
                    trace!(
                        task = %env.token,
                        written = n,
                        left = exchange.unsent.len(),
                        "abandoned request bytes written"
                    );
                    if !exchange.unsent.is_empty() {
                        return Ok(false);
                    }
                }
                Err(err) if is_not_ready(&err) => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }

        let filled = exchange.received.len();
        if filled >= self.max_frame_size {
            return Err(self.no_frame_error());
        }
        exchange.received.resize(self.max_frame_size, 0);
        let received = match connection.read(&mut exchange.received[filled..]) {
            Ok(0) => return Err(TaskError::ConnectionClosed),
            Ok(n) => n,
            Err(err) if is_not_ready(&err) => {
                exchange.received.truncate(filled);
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        exchange.received.truncate(filled + received);

        match self.frame_end(&exchange.received)? {
            Some(frame_len) => {
                trace!(
                    task = %env.token,
                    frame = %format_frame(&exchange.received[..frame_len]),
                    discarded = exchange.received.len(),
                    "abandoned response discarded"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn parse(&self, frame: &[u8], mut store: ReadResponse, env: &Env<'_>) -> Step<ReadState> {
        let request = env.context.request();
        let values = match self
            .codec
            .decode_response(frame, request, self.transaction_id)
        {
            Ok(values) => values,
            Err(err) => {
                store.release();
                return Step::Next(self.fail(err, env));
            }
        };

        let expected = request.item_count();
        if values.len() != expected {
            store.release();
            return Step::Next(self.fail(
                TaskError::decode(format!(
                    "expected {} values, response carries {}",
                    expected,
                    values.len()
                )),
                env,
            ));
        }

        let field = request.field();
        for (index, value) in values.into_iter().enumerate() {
            store.push(ResponseItem::new(
                field.item_address(index),
                field.data_type,
                value,
            ));
        }
        env.context.record(Outcome::Finished(store));
        Step::Next(ReadState::Finished)
    }

    fn fail(&self, err: TaskError, env: &Env<'_>) -> ReadState {
        warn!(task = %env.token, tid = self.transaction_id, error = %err, "read failed");
        release_lease(env);
        env.context.record(Outcome::Failed(err));
        ReadState::Error
    }

    /// Leaves a request that is partly or fully on the wire to the next
    /// lease holder. No I/O happens here.
    fn hand_off(&self, state: ReadState, env: &Env<'_>) {
        let Some(connection) = env.connection else {
            return;
        };
        match state {
            ReadState::Sending {
                mut frame, written, ..
            } if written > 0 => {
                frame.drain(..written);
                connection.abandon(env.token, frame, Vec::new());
            }
            ReadState::AwaitingResponse { buffer } => {
                connection.abandon(env.token, Vec::new(), buffer);
            }
            _ => {}
        }
    }

    fn cancel(&self, state: ReadState, env: &Env<'_>) -> ReadState {
        match state {
            ReadState::Parsing { mut store, .. } => {
                store.release();
            }
            open => self.hand_off(open, env),
        }
        release_lease(env);
        env.context.record(Outcome::Cancelled);
        ReadState::Cancelled
    }
}

fn release_lease(env: &Env<'_>) {
    if let Some(connection) = env.connection {
        connection.release(env.token);
    }
}

impl<C: Codec> StateMachine for ModbusReadMachine<C> {
    type State = ReadState;
    type Context = ReadExecution;

    fn step(&self, state: ReadState, env: &Env<'_>) -> Step<ReadState> {
        let from = state.id();
        let step = self.advance(state, env);
        if let Step::Next(next) = &step {
            debug!(
                task = %env.token,
                tid = self.transaction_id,
                from = %from,
                state = %next.id(),
                "read task transition"
            );
        }
        step
    }

    fn completion(&self, state: &ReadState) -> Option<Completion> {
        match state {
            ReadState::Finished => Some(Completion::Finished),
            ReadState::Error => Some(Completion::Failed),
            ReadState::Cancelled => Some(Completion::Cancelled),
            _ => None,
        }
    }

    fn retained_items(&self, state: &ReadState) -> usize {
        match state {
            ReadState::Parsing { store, .. } => store.retained(),
            _ => 0,
        }
    }

    fn abandon(&self, state: ReadState, env: &Env<'_>) {
        self.hand_off(state, env);
    }
}

impl<C: Codec> fmt::Debug for ModbusReadMachine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusReadMachine")
            .field("transaction_id", &self.transaction_id)
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}
