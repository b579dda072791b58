use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One direction of a [`MemoryLink`] pair.
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState::default()),
            ready: Condvar::new(),
        })
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }
}

struct Endpoint {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.rx.close();
        self.tx.close();
    }
}

/// In-memory duplex byte link.
///
/// [`MemoryLink::pair`] returns two connected ends; bytes written to one are
/// read from the other. Reads follow serial-port semantics:
///
/// - with no read timeout (the default) an empty link fails with
///   `WouldBlock` immediately;
/// - with a read timeout, the read waits up to that long and then fails with
///   `TimedOut`.
///
/// Once every handle of one end is dropped, the other end reads the remaining
/// bytes followed by `Ok(0)`, and its writes fail with `BrokenPipe`.
pub struct MemoryLink {
    end: Arc<Endpoint>,
    read_timeout: Option<Duration>,
}

impl MemoryLink {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();

        let a = Self {
            end: Arc::new(Endpoint {
                rx: Arc::clone(&b_to_a),
                tx: Arc::clone(&a_to_b),
            }),
            read_timeout: None,
        };
        let b = Self {
            end: Arc::new(Endpoint {
                rx: a_to_b,
                tx: b_to_a,
            }),
            read_timeout: None,
        };
        (a, b)
    }

    /// Set how long a read waits for data. `None` makes reads non-blocking.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Create another handle to the same end (for split reader/writer use).
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            end: Arc::clone(&self.end),
            read_timeout: self.read_timeout,
        })
    }

    /// Number of bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.end.rx.state.lock().buf.len()
    }
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let pipe = &self.end.rx;
        let mut state = pipe.state.lock();

        if state.buf.is_empty() && !state.closed {
            let Some(timeout) = self.read_timeout else {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            };
            let deadline = Instant::now() + timeout;
            while state.buf.is_empty() && !state.closed {
                if pipe.ready.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if state.buf.is_empty() && !state.closed {
                return Err(io::Error::from(ErrorKind::TimedOut));
            }
        }

        let n = buf.len().min(state.buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.buf.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pipe = &self.end.tx;
        let mut state = pipe.state.lock();
        if state.closed {
            return Err(io::Error::from(ErrorKind::BrokenPipe));
        }
        state.buf.extend(buf.iter().copied());
        drop(state);
        pipe.ready.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("pending", &self.pending())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
