//! Opening an already-configured link path (pty, serial device node, FIFO).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

/// A link made of one file to read from and one to write to.
///
/// Both may be the same node. Reads never block: an empty link reports
/// `WouldBlock`.
#[derive(Debug)]
pub struct PathLink {
    rx: File,
    tx: File,
}

impl PathLink {
    /// Open `rx` for reading and `tx` (or `rx` again) for writing.
    pub fn open(rx: &Path, tx: Option<&Path>) -> io::Result<Self> {
        let rx_file = open_node(rx, true)?;
        let tx_file = match tx {
            Some(path) => open_node(path, false)?,
            None => rx_file.try_clone()?,
        };
        Ok(Self {
            rx: rx_file,
            tx: tx_file,
        })
    }

    /// Separate read and write halves.
    pub fn split(self) -> (File, File) {
        (self.rx, self.tx)
    }
}

// Opened read-write so a FIFO does not wait for, or report EOF without, a peer.
fn open_node(path: &Path, nonblocking: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut flags = libc::O_NOCTTY;
        if nonblocking {
            flags |= libc::O_NONBLOCK;
        }
        options.custom_flags(flags);
    }
    #[cfg(not(unix))]
    let _ = nonblocking;
    options.open(path)
}

impl Read for PathLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rx.read(buf)
    }
}

impl Write for PathLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tx.flush()
    }
}
