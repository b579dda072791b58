use std::time::Duration;

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Link-level error (I/O, lock wait exceeded).
    #[error("link error: {0}")]
    Link(#[from] probescope_link::LinkError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] probescope_frame::FrameError),

    /// A sample request is still outstanding.
    #[error("sample request already pending ({remaining:?} until it expires)")]
    RequestPending { remaining: Duration },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reader thread stopped abnormally.
    #[error("reader thread stopped: {0}")]
    ReaderStopped(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
