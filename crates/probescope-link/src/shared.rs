use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{LinkError, Result};
use crate::traits::ByteLink;

/// Default bounded wait for acquiring the link lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between attempts while the link reports `WouldBlock` on output.
pub const WRITE_BACKOFF: Duration = Duration::from_millis(1);

/// A byte link shared between one reader and any number of writers.
///
/// A single mutex guards both directions. Every acquisition waits at most
/// `lock_timeout`; a caller that loses the race gets
/// [`LinkError::LockTimeout`] and may retry. Clones share the link but carry
/// their own timeout.
pub struct SharedLink<T> {
    inner: Arc<Mutex<T>>,
    lock_timeout: Duration,
}

impl<T> Clone for SharedLink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lock_timeout: self.lock_timeout,
        }
    }
}

impl<T: ByteLink> SharedLink<T> {
    /// Wrap a link with the default lock timeout.
    pub fn new(link: T) -> Self {
        Self::with_lock_timeout(link, DEFAULT_LOCK_TIMEOUT)
    }

    /// Wrap a link with an explicit lock timeout.
    pub fn with_lock_timeout(link: T, lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(link)),
            lock_timeout,
        }
    }

    /// Bounded wait used by this handle.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Change the bounded wait for this handle only.
    pub fn set_lock_timeout(&mut self, lock_timeout: Duration) {
        self.lock_timeout = lock_timeout;
    }

    /// Acquire exclusive access to the link.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.inner.try_lock_for(self.lock_timeout).ok_or_else(|| {
            debug!(timeout = ?self.lock_timeout, "link lock not acquired");
            LinkError::LockTimeout(self.lock_timeout)
        })
    }

    /// Write every byte of `bytes` and flush, holding the lock throughout.
    ///
    /// While the link reports `WouldBlock` the writer sleeps for
    /// [`WRITE_BACKOFF`] between attempts. If no progress is made for
    /// `lock_timeout`, the write fails with [`LinkError::WriteStalled`].
    pub fn write_all(&self, bytes: &[u8]) -> Result<()> {
        let mut link = self.lock()?;
        let mut stall = Stall::new(self.lock_timeout);

        let mut offset = 0usize;
        while offset < bytes.len() {
            match link.write(&bytes[offset..]) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => {
                    offset += n;
                    stall.progress();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => stall.wait()?,
                Err(err) => return Err(LinkError::Io(err)),
            }
        }

        loop {
            match link.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => stall.wait()?,
                Err(err) => return Err(LinkError::Io(err)),
            }
        }
    }

    /// Perform one read of whatever has arrived, up to `buf.len()` bytes.
    ///
    /// "Nothing yet" (`WouldBlock`, `TimedOut`, or `Ok(0)`) is reported as
    /// `Ok(0)`.
    pub fn read_available(&self, buf: &mut [u8]) -> Result<usize> {
        let mut link = self.lock()?;
        loop {
            match link.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(LinkError::Io(err)),
            }
        }
    }

    /// Recover the link if this is the last handle.
    pub fn into_inner(self) -> Option<T> {
        Arc::try_unwrap(self.inner).ok().map(Mutex::into_inner)
    }
}

/// Tracks how long output has been refused since the last accepted byte.
struct Stall {
    limit: Duration,
    since: Instant,
}

impl Stall {
    fn new(limit: Duration) -> Self {
        Self {
            limit,
            since: Instant::now(),
        }
    }

    fn progress(&mut self) {
        self.since = Instant::now();
    }

    fn wait(&self) -> Result<()> {
        if self.since.elapsed() >= self.limit {
            debug!(limit = ?self.limit, "link output stalled");
            return Err(LinkError::WriteStalled(self.limit));
        }
        std::thread::sleep(WRITE_BACKOFF);
        Ok(())
    }
}

impl<T> std::fmt::Debug for SharedLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLink")
            .field("lock_timeout", &self.lock_timeout)
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::memory::MemoryLink;

    #[test]
    fn write_reaches_peer() {
        let (host, mut device) = MemoryLink::pair();
        let link = SharedLink::new(host);

        link.write_all(&[0x1E, 0x43, 0x73, 0x04]).unwrap();

        let mut buf = [0u8; 8];
        let n = device.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x1E, 0x43, 0x73, 0x04]);
    }

    #[test]
    fn read_available_reports_nothing_as_zero() {
        let (host, _device) = MemoryLink::pair();
        let link = SharedLink::new(host);

        let mut buf = [0u8; 8];
        assert_eq!(link.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_available_returns_arrived_bytes() {
        let (host, mut device) = MemoryLink::pair();
        let link = SharedLink::new(host);
        device.write_all(b"abc").unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(link.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(link.read_available(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'c');
    }

    #[test]
    fn lock_wait_is_bounded() {
        let (host, _device) = MemoryLink::pair();
        let link = SharedLink::with_lock_timeout(host, Duration::from_millis(20));
        let other = link.clone();

        let _held = link.lock().unwrap();
        let err = other.write_all(b"x").unwrap_err();
        assert!(matches!(err, LinkError::LockTimeout(t) if t == Duration::from_millis(20)));
    }

    #[test]
    fn lock_contention_from_another_thread() {
        let (host, _device) = MemoryLink::pair();
        let link = SharedLink::with_lock_timeout(host, Duration::from_millis(10));
        let holder = link.clone();

        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let thread = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            locked_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });

        locked_rx.recv().unwrap();
        let mut buf = [0u8; 4];
        let err = link.read_available(&mut buf).unwrap_err();
        assert!(matches!(err, LinkError::LockTimeout(_)));

        release_tx.send(()).unwrap();
        thread.join().unwrap();
        assert_eq!(link.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_to_closed_peer_fails() {
        let (host, device) = MemoryLink::pair();
        drop(device);
        let link = SharedLink::new(host);

        let err = link.write_all(b"x").unwrap_err();
        assert!(matches!(err, LinkError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn into_inner_requires_last_handle() {
        let (host, _device) = MemoryLink::pair();
        let link = SharedLink::new(host);
        let other = link.clone();

        assert!(link.into_inner().is_none());
        assert!(other.into_inner().is_some());
    }

    #[test]
    fn clones_keep_independent_timeouts() {
        let (host, _device) = MemoryLink::pair();
        let link = SharedLink::new(host);
        let mut other = link.clone();
        other.set_lock_timeout(Duration::from_millis(5));

        assert_eq!(link.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
        assert_eq!(other.lock_timeout(), Duration::from_millis(5));
    }

    /// Refuses the first `refusals` writes and flushes with `WouldBlock`.
    struct Congested {
        refusals: usize,
        written: Vec<u8>,
    }

    impl Congested {
        fn refuse(&mut self) -> std::io::Result<()> {
            if self.refusals > 0 {
                self.refusals -= 1;
                return Err(ErrorKind::WouldBlock.into());
            }
            Ok(())
        }
    }

    impl Read for Congested {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(ErrorKind::WouldBlock.into())
        }
    }

    impl Write for Congested {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.refuse()?;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.refuse()
        }
    }

    #[test]
    fn congested_write_backs_off_then_completes() {
        let link = SharedLink::new(Congested {
            refusals: 3,
            written: Vec::new(),
        });

        link.write_all(b"abc").unwrap();
        assert_eq!(link.into_inner().unwrap().written, b"abc");
    }

    #[test]
    fn stalled_write_is_bounded() {
        let link = SharedLink::with_lock_timeout(
            Congested {
                refusals: usize::MAX,
                written: Vec::new(),
            },
            Duration::from_millis(20),
        );

        let started = Instant::now();
        let err = link.write_all(b"x").unwrap_err();
        assert!(matches!(err, LinkError::WriteStalled(t) if t == Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(started.elapsed() < Duration::from_secs(2));
        // Lock is released after the failure.
        assert!(link.lock().is_ok());
    }

    #[test]
    fn works_with_plain_write_sink() {
        let link = SharedLink::new(std::io::Cursor::new(Vec::<u8>::new()));
        link.write_all(b"hello").unwrap();
        let inner = link.into_inner().unwrap();
        assert_eq!(inner.into_inner(), b"hello");
    }
}
