use probescope_link::ByteLink;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::DeviceConfig;
use crate::device::{session, Device, DeviceReader};

/// Open a session over an already-configured link.
pub fn connect<T: ByteLink>(link: T) -> (Device<T>, DeviceReader<T>) {
    connect_with_config(link, DeviceConfig::default())
}

/// Open a session with explicit configuration.
pub fn connect_with_config<T: ByteLink>(
    link: T,
    config: DeviceConfig,
) -> (Device<T>, DeviceReader<T>) {
    connect_with_clock(link, config, SystemClock)
}

/// Open a session whose deadlines follow `clock`.
pub fn connect_with_clock<T: ByteLink, C: Clock>(
    link: T,
    config: DeviceConfig,
    clock: C,
) -> (Device<T, C>, DeviceReader<T, C>) {
    debug!(
        lock_timeout = ?config.lock_timeout,
        request_timeout = ?config.request_timeout,
        read_chunk_size = config.read_chunk_size,
        "device session opened"
    );
    session(link, config, clock)
}
