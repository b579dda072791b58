use std::io::{Read, Write};

/// A bidirectional byte link to the instrument.
///
/// Anything that is `Read + Write + Send` qualifies: `std::fs::File` opened on
/// a tty or FIFO, a `UnixStream`, a serial port handle from another crate, or
/// [`MemoryLink`](crate::MemoryLink).
///
/// Reads are expected to follow serial-port semantics: when nothing has
/// arrived, a read either returns `Ok(0)` or fails with `WouldBlock` /
/// `TimedOut`. Both are treated as "no data yet", not as end of stream.
pub trait ByteLink: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> ByteLink for T {}
