use std::time::Duration;

use probescope_frame::{FrameConfig, DEFAULT_MAX_FRAME_SIZE};
use probescope_link::DEFAULT_LOCK_TIMEOUT;

/// Default time a sample request may stay unanswered.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
/// Default upper bound on bytes drained per poll.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16_000;
/// Default pause between drains in the background reader.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default silence after which a half-received frame is dropped.
pub const DEFAULT_FRAME_IDLE_TIMEOUT: Duration = Duration::from_secs(2);
/// Default pause between empty polls while waiting for a reply.
pub const DEFAULT_WAIT_BACKOFF: Duration = Duration::from_millis(5);

/// Runtime configuration for a device session.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Bounded wait for the shared link lock. Default: 2 s.
    pub lock_timeout: Duration,
    /// Deadline for a sample request. Default: 1 s.
    pub request_timeout: Duration,
    /// Maximum bytes read per poll. Default: 16 000.
    pub read_chunk_size: usize,
    /// Pause between drains in the background reader. Default: 500 ms.
    pub poll_interval: Duration,
    /// Pause between empty polls while waiting for a reply. Default: 5 ms.
    pub wait_backoff: Duration,
    /// Maximum unstuffed frame size. Default: 64 KiB.
    pub max_frame_size: usize,
    /// Drop a partial frame after this long without new bytes.
    /// `None` keeps partial frames forever. Default: 2 s.
    pub frame_idle_timeout: Option<Duration>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_backoff: DEFAULT_WAIT_BACKOFF,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            frame_idle_timeout: Some(DEFAULT_FRAME_IDLE_TIMEOUT),
        }
    }
}

impl DeviceConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
        }
    }
}
