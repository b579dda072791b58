use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use tracing::warn;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::parser::FrameParser;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and multiple frames per read internally; callers
/// always get complete frames. Framing warnings are logged and counted, never
/// returned.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
    ready: VecDeque<Frame>,
    config: FrameConfig,
    warnings: u64,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(&config),
            ready: VecDeque::new(),
            config,
            warnings: 0,
        }
    }

    /// Next complete frame, reading from the stream as needed.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// `WouldBlock` and `TimedOut` from the stream are returned as
    /// `FrameError::Io`; the partial frame is kept and the call can be
    /// repeated.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            for &byte in &chunk[..read] {
                match self.parser.feed(byte) {
                    Ok(Some(frame)) => self.ready.push_back(frame),
                    Ok(None) => {}
                    Err(warning) => {
                        self.warnings += 1;
                        warn!(%warning, "discarding malformed input");
                    }
                }
            }
        }
    }

    /// Number of framing warnings seen so far.
    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Applies from the next byte; a frame already past the new limit is
    /// dropped with `FrameTooLarge`.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
        self.parser.set_max_frame_size(max_frame_size);
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
