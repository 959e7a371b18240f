//! Scripted in-memory connection for tests, benches and demos.
//!
//! [`MockConnection`] never touches the network. Writes are recorded and can
//! be throttled per call; reads hand out queued chunks one per call and report
//! `WouldBlock` when nothing is queued. Clones share state, so a test can box
//! one clone into a [`SharedConnection`](crate::SharedConnection) and keep
//! another to script and inspect it.
//!
//! # Example
//!
//! ```
//! use modbus_task::{Connection, MockConnection};
//!
//! let mock = MockConnection::new();
//! let mut io = mock.clone();
//!
//! mock.limit_next_write(2);
//! assert_eq!(io.write(&[1, 2, 3]).unwrap(), 2);
//! assert_eq!(io.write(&[3]).unwrap(), 1);
//! assert_eq!(mock.written(), vec![1, 2, 3]);
//!
//! let mut buf = [0u8; 4];
//! assert!(io.read(&mut buf).is_err()); // nothing queued: WouldBlock
//! mock.push_inbound(&[9, 8]);
//! assert_eq!(io.read(&mut buf).unwrap(), 2);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::transport::Connection;

#[derive(Debug, Default)]
struct MockState {
    written: Vec<u8>,
    write_limits: VecDeque<usize>,
    write_error: Option<io::ErrorKind>,
    inbound: VecDeque<Vec<u8>>,
    read_error: Option<io::ErrorKind>,
    closed: bool,
    reads: usize,
    writes: usize,
}

/// In-memory [`Connection`] driven by a script.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Rc<RefCell<MockState>>,
}

impl MockConnection {
    /// Creates a mock that accepts all writes and has nothing to read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the next write call at `max` bytes. `0` makes it `WouldBlock`.
    /// Calls stack up in order; unscripted writes accept everything.
    pub fn limit_next_write(&self, max: usize) {
        self.state.borrow_mut().write_limits.push_back(max);
    }

    /// Makes every following write fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().write_error = Some(kind);
    }

    /// Queues a chunk that one future read call will return.
    pub fn push_inbound(&self, chunk: &[u8]) {
        self.state.borrow_mut().inbound.push_back(chunk.to_vec());
    }

    /// Makes every following read fail with `kind`.
    pub fn fail_reads(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().read_error = Some(kind);
    }

    /// Makes reads report end of stream once the queue is drained.
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    /// All bytes accepted so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    /// Forgets recorded writes.
    pub fn clear_written(&self) {
        self.state.borrow_mut().written.clear();
    }

    /// Number of read calls made.
    pub fn read_calls(&self) -> usize {
        self.state.borrow().reads
    }

    /// Number of write calls made.
    pub fn write_calls(&self) -> usize {
        self.state.borrow().writes
    }

    /// Number of queued inbound chunks not yet read.
    pub fn pending_inbound(&self) -> usize {
        self.state.borrow().inbound.len()
    }
}

impl Connection for MockConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        if let Some(kind) = state.write_error {
            return Err(io::Error::from(kind));
        }

        let accepted = match state.write_limits.pop_front() {
            Some(0) => return Err(io::Error::from(io::ErrorKind::WouldBlock)),
            Some(max) => max.min(buf.len()),
            None => buf.len(),
        };
        state.written.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        if let Some(kind) = state.read_error {
            return Err(io::Error::from(kind));
        }

        let Some(mut chunk) = state.inbound.pop_front() else {
            return if state.closed {
                Ok(0)
            } else {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            };
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            // the caller's buffer was too small; keep the rest for next time
            state.inbound.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn peer(&self) -> String {
        String::from("mock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_limits_in_order() {
        let mock = MockConnection::new();
        let mut io = mock.clone();
        mock.limit_next_write(1);
        mock.limit_next_write(0);

        assert_eq!(io.write(&[1, 2, 3]).unwrap(), 1);
        assert_eq!(
            io.write(&[2, 3]).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert_eq!(io.write(&[2, 3]).unwrap(), 2);
        assert_eq!(mock.written(), vec![1, 2, 3]);
        assert_eq!(mock.write_calls(), 3);
    }

    #[test]
    fn test_read_chunks() {
        let mock = MockConnection::new();
        let mut io = mock.clone();
        mock.push_inbound(&[1, 2, 3]);
        mock.push_inbound(&[4]);

        let mut buf = [0u8; 2];
        assert_eq!(io.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(io.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(io.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
        assert_eq!(mock.pending_inbound(), 0);
        assert_eq!(
            io.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert_eq!(mock.read_calls(), 4);
    }

    #[test]
    fn test_closed_and_errors() {
        let mock = MockConnection::new();
        let mut io = mock.clone();
        let mut buf = [0u8; 4];

        mock.close();
        assert_eq!(io.read(&mut buf).unwrap(), 0);

        mock.fail_reads(io::ErrorKind::ConnectionReset);
        assert_eq!(
            io.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );

        mock.fail_writes(io::ErrorKind::BrokenPipe);
        assert_eq!(
            io.write(&[1]).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
