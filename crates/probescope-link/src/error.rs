use std::time::Duration;

/// Errors that can occur while accessing a byte link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// An I/O error occurred on the underlying link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link lock could not be acquired within the bounded wait.
    #[error("link busy: lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// The link kept refusing output for longer than the bounded wait.
    #[error("link stalled: no output accepted within {0:?}")]
    WriteStalled(Duration),

    /// The link accepted no more bytes.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;
