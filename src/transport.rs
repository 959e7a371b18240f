//! Non-blocking connections that tasks perform I/O against.
//!
//! The transport layer only moves bytes. It knows nothing about Modbus frames
//! and never waits: a [`Connection`] that cannot make progress returns
//! [`io::ErrorKind::WouldBlock`] and the calling task tries again on its next
//! poll.
//!
//! # Sharing
//!
//! Several tasks may target the same device. [`SharedConnection`] wraps one
//! connection for all of them and hands out a lease, so only one task at a
//! time has a request/response exchange in flight. A task takes the lease
//! before its first write and gives it back once its response frame is in.
//!
//! A task that goes away mid-exchange leaves its exchange behind with
//! [`SharedConnection::abandon`]: the unsent tail of its request and the
//! response bytes read so far. The next lease holder finishes that exchange
//! first, writing the tail and discarding the owed response frame, so the
//! byte stream stays aligned with the requests on the wire.
//!
//! # Constants
//!
//! - [`DEFAULT_MODBUS_PORT`] - Default Modbus TCP port (502)
//! - [`DEFAULT_CONNECT_TIMEOUT`] - Default connect timeout (2 seconds)
//! - [`MAX_ADU_SIZE`] - Largest Modbus TCP frame (260 bytes)
//!
//! # Example
//!
//! ```no_run
//! use modbus_task::{SharedConnection, TcpConnection};
//!
//! let tcp = TcpConnection::connect("192.168.1.10:502".parse().unwrap()).unwrap();
//! let connection = SharedConnection::new(tcp);
//! assert!(connection.holder().is_none());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;
use crate::task::TaskToken;

/// Default Modbus TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Default timeout for establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum Modbus TCP application data unit size.
pub const MAX_ADU_SIZE: usize = 260;

/// A byte stream that never blocks.
///
/// Implementations return `Err(WouldBlock)` (or `Interrupted`) when no
/// progress can be made right now, `Ok(0)` from `read` when the peer has
/// closed the stream, and any other error for a broken connection.
pub trait Connection {
    /// Writes as many bytes of `buf` as the connection accepts right now.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Reads whatever bytes are available into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Human-readable peer description for logs.
    fn peer(&self) -> String {
        String::from("unknown")
    }
}

/// Returns whether an I/O error only means "try again later".
pub(crate) fn is_not_ready(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Handle to a connection shared between tasks.
pub type ConnectionRef = Rc<SharedConnection>;

/// Leftovers of an exchange whose task stopped before it completed.
#[derive(Debug, Default)]
pub(crate) struct AbandonedExchange {
    /// Request bytes not yet written.
    pub(crate) unsent: Vec<u8>,
    /// Bytes of the owed response read so far.
    pub(crate) received: Vec<u8>,
}

/// A connection shared by several tasks, serialized by a lease.
pub struct SharedConnection {
    io: RefCell<Box<dyn Connection>>,
    lease: Cell<Option<TaskToken>>,
    abandoned: RefCell<Option<AbandonedExchange>>,
}

impl SharedConnection {
    /// Wraps `connection` and returns a shareable handle.
    pub fn new(connection: impl Connection + 'static) -> ConnectionRef {
        Rc::new(Self {
            io: RefCell::new(Box::new(connection)),
            lease: Cell::new(None),
            abandoned: RefCell::new(None),
        })
    }

    /// Takes the lease for `token`.
    ///
    /// Returns `true` if `token` now holds the lease (or already did),
    /// `false` if another task holds it.
    pub fn try_acquire(&self, token: TaskToken) -> bool {
        match self.lease.get() {
            Some(holder) => holder == token,
            None => {
                trace!(task = %token, "connection lease acquired");
                self.lease.set(Some(token));
                true
            }
        }
    }

    /// Gives the lease back if `token` holds it. Otherwise does nothing.
    pub fn release(&self, token: TaskToken) {
        if self.lease.get() == Some(token) {
            trace!(task = %token, "connection lease released");
            self.lease.set(None);
        }
    }

    /// Leaves the open exchange of `token` for the next lease holder and
    /// gives the lease back.
    ///
    /// `unsent` is the request tail still to be written, `received` the part
    /// of the response already read. Does nothing unless `token` holds the
    /// lease.
    pub fn abandon(&self, token: TaskToken, unsent: Vec<u8>, received: Vec<u8>) {
        if self.lease.get() != Some(token) {
            return;
        }
        debug!(
            task = %token,
            unsent = unsent.len(),
            received = received.len(),
            "exchange abandoned, left for the next lease holder"
        );
        *self.abandoned.borrow_mut() = Some(AbandonedExchange { unsent, received });
        self.release(token);
    }

    /// Returns whether an abandoned exchange still has to be drained.
    pub fn is_draining(&self) -> bool {
        self.abandoned.borrow().is_some()
    }

    pub(crate) fn take_abandoned(&self) -> Option<AbandonedExchange> {
        self.abandoned.borrow_mut().take()
    }

    pub(crate) fn restore_abandoned(&self, exchange: AbandonedExchange) {
        *self.abandoned.borrow_mut() = Some(exchange);
    }

    /// The task currently holding the lease.
    pub fn holder(&self) -> Option<TaskToken> {
        self.lease.get()
    }

    /// Non-blocking write on the underlying connection.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.io.borrow_mut().write(buf)
    }

    /// Non-blocking read on the underlying connection.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.io.borrow_mut().read(buf)
    }

    /// Peer description of the underlying connection.
    pub fn peer(&self) -> String {
        self.io.borrow().peer()
    }
}

impl fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("peer", &self.peer())
            .field("lease", &self.lease.get())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Modbus TCP connection over a non-blocking socket.
pub struct TcpConnection {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpConnection {
    /// Connects to `addr` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection cannot be established or the
    /// socket cannot be switched to non-blocking mode.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_timeout(addr, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Connects to `addr`, waiting at most `timeout` for the handshake.
    ///
    /// Connection setup is the only blocking call; once connected the socket
    /// is non-blocking.
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream, switching it to non-blocking mode.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let remote_addr = stream.peer_addr()?;
        debug!(peer = %remote_addr, "tcp connection ready");

        Ok(Self {
            stream,
            remote_addr,
        })
    }

    /// Returns the remote device address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl Connection for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn peer(&self) -> String {
        self.remote_addr.to_string()
    }
}

impl fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConnection")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}
