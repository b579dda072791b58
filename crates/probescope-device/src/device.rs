use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use probescope_link::{ByteLink, SharedLink};
use probescope_message::{
    command, Command, Decoded, Message, MessageDecoder, ProtocolWarning, SampleBlock,
};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};
use crate::tracker::RequestTracker;

/// Command side of a device session.
///
/// Cheap to clone; every clone writes through the same [`SharedLink`] and
/// shares the request tracker with the [`DeviceReader`].
pub struct Device<T, C = SystemClock> {
    link: SharedLink<T>,
    tracker: Arc<Mutex<RequestTracker<C>>>,
}

impl<T, C> Clone for Device<T, C> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<T: ByteLink, C: Clock> Device<T, C> {
    /// Ask the device for one sample block.
    ///
    /// Fails with [`DeviceError::RequestPending`] while an earlier request is
    /// unanswered and unexpired.
    pub fn request_samples(&self) -> Result<Instant> {
        let deadline = self.tracker.lock().begin()?;
        if let Err(err) = self.link.write_all(&command::request_samples()) {
            self.tracker.lock().cancel();
            return Err(err.into());
        }
        Ok(deadline)
    }

    pub fn write_registers(&self, address: u32, data: &[u8]) -> Result<()> {
        debug!(address = format_args!("0x{address:04X}"), len = data.len(), "writing registers");
        self.send_encoded(&command::write_registers(address, data))
    }

    pub fn read_registers(&self, address: u32, length: u32) -> Result<()> {
        debug!(address = format_args!("0x{address:04X}"), length, "reading registers");
        self.send_encoded(&command::read_registers(address, length))
    }

    pub fn init_dac(&self) -> Result<()> {
        self.send_encoded(&command::init_dac())
    }

    pub fn set_dac(&self, a: u16, b: u16, c: u16, d: u16) -> Result<()> {
        self.send_encoded(&command::set_dac(a, b, c, d))
    }

    pub fn set_vga(&self, gain: [u8; 2]) -> Result<()> {
        self.send_encoded(&command::set_vga(gain))
    }

    /// Send any command. Sample requests go through the tracker.
    pub fn send(&self, command: &Command) -> Result<()> {
        match command {
            Command::RequestSamples => self.request_samples().map(|_| ()),
            other => self.send_encoded(&other.to_bytes()),
        }
    }

    /// True while a sample request is outstanding and unexpired.
    pub fn is_request_pending(&self) -> bool {
        self.tracker.lock().is_pending()
    }

    pub fn link(&self) -> &SharedLink<T> {
        &self.link
    }

    fn send_encoded(&self, wire: &Bytes) -> Result<()> {
        self.link.write_all(wire)?;
        Ok(())
    }
}

/// Receive side of a device session.
///
/// Each [`poll`](Self::poll) takes the link lock once, drains at most
/// `read_chunk_size` bytes and decodes them one at a time.
pub struct DeviceReader<T, C = SystemClock> {
    link: SharedLink<T>,
    tracker: Arc<Mutex<RequestTracker<C>>>,
    clock: C,
    decoder: MessageDecoder,
    config: DeviceConfig,
    chunk: Vec<u8>,
    last_byte_at: Instant,
}

impl<T: ByteLink, C: Clock> DeviceReader<T, C> {
    /// Drain what has arrived and decode it.
    ///
    /// Returns the outcomes that carry a message or a warning. Sample blocks
    /// complete the pending request; an expired request is cleared.
    pub fn poll(&mut self) -> Result<Vec<Decoded>> {
        let read = self.link.read_available(&mut self.chunk)?;
        let now = self.clock.now();
        let mut outcomes = Vec::new();

        if read == 0 {
            if let Some(warning) = self.check_idle_frame(now) {
                outcomes.push(self.decoder.report(warning));
            }
        } else {
            self.last_byte_at = now;
            for &byte in &self.chunk[..read] {
                let decoded = self.decoder.feed(byte);
                if !decoded.is_empty() {
                    outcomes.push(decoded);
                }
            }
        }

        let mut tracker = self.tracker.lock();
        tracker.expire();
        for message in outcomes.iter().filter_map(|d| d.message.as_ref()) {
            tracker.observe(message);
        }
        Ok(outcomes)
    }

    /// Poll until a sample block arrives or the pending request expires.
    ///
    /// Returns `Ok(None)` when nothing is pending or the request expired.
    /// Other messages that arrive meanwhile are passed to `other`.
    pub fn wait_for_samples(
        &mut self,
        mut other: impl FnMut(Decoded),
    ) -> Result<Option<SampleBlock>> {
        loop {
            let mut pending = self.tracker.lock().is_pending();
            let mut found = None;
            for Decoded { message, warnings } in self.poll()? {
                match message {
                    Some(Message::Samples(block)) if found.is_none() => {
                        found = Some(block);
                        if !warnings.is_empty() {
                            other(Decoded {
                                message: None,
                                warnings,
                            });
                        }
                    }
                    message => other(Decoded { message, warnings }),
                }
            }
            if found.is_some() {
                return Ok(found);
            }
            pending &= self.tracker.lock().is_pending();
            if !pending {
                return Ok(None);
            }
            thread::sleep(self.config.wait_backoff);
        }
    }

    /// Discard any partial frame. Call after the link was reopened.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn decoder(&self) -> &MessageDecoder {
        &self.decoder
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn check_idle_frame(&mut self, now: Instant) -> Option<ProtocolWarning> {
        let limit = self.config.frame_idle_timeout?;
        if self.decoder.is_idle() || now.saturating_duration_since(self.last_byte_at) < limit {
            return None;
        }
        self.decoder.reset();
        Some(ProtocolWarning::FrameIdleTimeout(limit))
    }
}

impl<T, C> DeviceReader<T, C>
where
    T: ByteLink + 'static,
    C: Clock,
{
    /// Run the drain loop on its own thread.
    ///
    /// Every message is sent on `tx`; warnings are only logged. The thread
    /// sleeps `poll_interval` between drains and ends when the handle is
    /// stopped or dropped, when the receiver hangs up, or on a link error.
    pub fn spawn(mut self, tx: Sender<Message>) -> Result<ReaderHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let interval = self.config.poll_interval;

        let thread = thread::Builder::new()
            .name("probescope-reader".into())
            .spawn(move || -> Result<()> {
                info!(?interval, "reader started");
                while !flag.load(Ordering::Relaxed) {
                    let outcomes = match self.poll() {
                        Ok(outcomes) => outcomes,
                        Err(DeviceError::Link(probescope_link::LinkError::LockTimeout(wait))) => {
                            debug!(?wait, "link busy, retrying next cycle");
                            Vec::new()
                        }
                        Err(err) => {
                            warn!(error = %err, "reader stopping on link error");
                            return Err(err);
                        }
                    };
                    for message in outcomes.into_iter().filter_map(|d| d.message) {
                        if tx.send(message).is_err() {
                            debug!("message receiver dropped, reader stopping");
                            return Ok(());
                        }
                    }
                    thread::sleep(interval);
                }
                debug!("reader stopped");
                Ok(())
            })
            .map_err(probescope_link::LinkError::Io)?;

        Ok(ReaderHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Handle to a background reader. Dropping it stops the thread.
pub struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ReaderHandle {
    /// Ask the reader to stop after its current cycle.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the reader and wait for it to end.
    pub fn join(mut self) -> Result<()> {
        self.stop();
        self.wait()
    }

    fn wait(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| DeviceError::ReaderStopped("reader thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
        if let Err(err) = self.wait() {
            debug!(error = %err, "reader ended with error");
        }
    }
}

pub(crate) fn session<T: ByteLink, C: Clock>(
    link: T,
    config: DeviceConfig,
    clock: C,
) -> (Device<T, C>, DeviceReader<T, C>) {
    let link = SharedLink::with_lock_timeout(link, config.lock_timeout);
    let tracker = Arc::new(Mutex::new(RequestTracker::new(
        clock.clone(),
        config.request_timeout,
    )));
    let device = Device {
        link: link.clone(),
        tracker: Arc::clone(&tracker),
    };
    let reader = DeviceReader {
        link,
        tracker,
        decoder: MessageDecoder::with_config(&config.frame_config()),
        chunk: vec![0u8; config.read_chunk_size.max(1)],
        last_byte_at: clock.now(),
        clock,
        config,
    };
    (device, reader)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::mpsc;
    use std::time::Duration;

    use probescope_link::{LinkError, MemoryLink};
    use probescope_message::opcode::Opcode;
    use probescope_message::{reply, ProtocolWarning};

    use super::*;
    use crate::clock::ManualClock;
    use crate::connector::{connect_with_clock, connect_with_config};
    use crate::emulator::Emulator;

    type Session = (
        Device<MemoryLink, ManualClock>,
        DeviceReader<MemoryLink, ManualClock>,
    );

    fn manual_session(config: DeviceConfig) -> (Session, MemoryLink, ManualClock) {
        let (host, device_end) = MemoryLink::pair();
        let clock = ManualClock::new();
        let session = connect_with_clock(host, config, clock.clone());
        (session, device_end, clock)
    }

    fn drain(end: &mut MemoryLink) -> Vec<u8> {
        let mut buf = vec![0u8; end.pending()];
        let n = end.read(&mut buf).unwrap_or(0);
        buf.truncate(n);
        buf
    }

    #[test]
    fn second_request_rejected_until_deadline() {
        let ((device, _reader), mut device_end, clock) = manual_session(DeviceConfig::default());

        device.request_samples().unwrap();
        assert!(matches!(
            device.request_samples(),
            Err(DeviceError::RequestPending { .. })
        ));

        clock.advance(Duration::from_secs(1));
        device.request_samples().unwrap();

        assert_eq!(
            drain(&mut device_end),
            vec![0x1E, 0x43, 0x73, 0x04, 0x1E, 0x43, 0x73, 0x04]
        );
    }

    #[test]
    fn sample_block_completes_request() {
        let ((device, mut reader), mut device_end, _clock) =
            manual_session(DeviceConfig::default());

        device.request_samples().unwrap();
        device_end
            .write_all(&reply::sample_block(Opcode::RequestSampleData, &[3, -3]))
            .unwrap();

        let outcomes = reader.poll().unwrap();
        assert_eq!(outcomes.len(), 1);
        let block = outcomes[0].message.as_ref().and_then(Message::as_samples).unwrap();
        assert_eq!(block.samples, vec![3, -3]);
        assert!(!device.is_request_pending());
        device.request_samples().unwrap();
    }

    #[test]
    fn poll_drains_bounded_chunks() {
        let config = DeviceConfig {
            read_chunk_size: 4,
            ..DeviceConfig::default()
        };
        let ((_device, mut reader), mut device_end, _clock) = manual_session(config);
        device_end.write_all(&reply::write_ack(9)).unwrap();

        // Nine wire bytes, four per poll.
        assert!(reader.poll().unwrap().is_empty());
        assert!(reader.poll().unwrap().is_empty());
        let outcomes = reader.poll().unwrap();
        assert!(matches!(
            outcomes[0].message,
            Some(Message::WriteAck(ack)) if ack.bytes_written == 9
        ));
    }

    #[test]
    fn stale_partial_frame_is_dropped() {
        let ((_device, mut reader), mut device_end, clock) =
            manual_session(DeviceConfig::default());

        device_end.write_all(&[0x1E, 0x52, 0x73, 0x4C]).unwrap();
        assert!(reader.poll().unwrap().is_empty());
        assert!(!reader.decoder().is_idle());

        clock.advance(Duration::from_millis(500));
        assert!(reader.poll().unwrap().is_empty());

        clock.advance(Duration::from_secs(2));
        let outcomes = reader.poll().unwrap();
        assert_eq!(
            outcomes[0].warnings,
            vec![ProtocolWarning::FrameIdleTimeout(Duration::from_secs(2))]
        );
        assert!(reader.decoder().is_idle());

        device_end.write_all(&reply::triggered()).unwrap();
        let outcomes = reader.poll().unwrap();
        assert!(matches!(outcomes[0].message, Some(Message::Triggered(_))));
    }

    #[test]
    fn idle_timeout_can_be_disabled() {
        let config = DeviceConfig {
            frame_idle_timeout: None,
            ..DeviceConfig::default()
        };
        let ((_device, mut reader), mut device_end, clock) = manual_session(config);

        device_end.write_all(&[0x1E, 0x52]).unwrap();
        reader.poll().unwrap();
        clock.advance(Duration::from_secs(60));
        assert!(reader.poll().unwrap().is_empty());
        assert!(!reader.decoder().is_idle());
    }

    #[test]
    fn busy_link_times_out() {
        let config = DeviceConfig {
            lock_timeout: Duration::from_millis(20),
            ..DeviceConfig::default()
        };
        let ((device, mut reader), _device_end, _clock) = manual_session(config);

        let guard = device.link().lock().unwrap();
        assert!(matches!(
            reader.poll(),
            Err(DeviceError::Link(LinkError::LockTimeout(_)))
        ));
        assert!(matches!(
            device.init_dac(),
            Err(DeviceError::Link(LinkError::LockTimeout(_)))
        ));
        drop(guard);
        device.init_dac().unwrap();
    }

    #[test]
    fn failed_send_releases_request() {
        let ((device, _reader), device_end, _clock) = manual_session(DeviceConfig::default());
        drop(device_end);

        assert!(matches!(
            device.request_samples(),
            Err(DeviceError::Link(LinkError::Io(_)))
        ));
        assert!(!device.is_request_pending());
    }

    #[test]
    fn send_routes_commands() {
        let ((device, _reader), mut device_end, _clock) = manual_session(DeviceConfig::default());

        device
            .send(&Command::ReadRegisters {
                address: 0x3000,
                length: 2,
            })
            .unwrap();
        assert_eq!(drain(&mut device_end), command::read_registers(0x3000, 2).to_vec());

        device.send(&Command::RequestSamples).unwrap();
        assert!(device.is_request_pending());
    }

    #[test]
    fn round_trip_against_emulator() {
        let (host, device_end) = MemoryLink::pair();
        let mut emu_reader = device_end.try_clone().unwrap();
        emu_reader.set_read_timeout(Some(Duration::from_millis(5)));
        let server = thread::spawn(move || {
            let mut emu = Emulator::new(emu_reader, device_end).unwrap();
            emu.run(&AtomicBool::new(true)).unwrap()
        });

        let (device, mut reader) = connect_with_config(host, DeviceConfig::default());
        device.set_vga(probescope_message::VGA_FULL_SCALE).unwrap();
        device.read_registers(0x3000, 2).unwrap();
        device.request_samples().unwrap();

        let mut others = Vec::new();
        let block = reader
            .wait_for_samples(|decoded| others.extend(decoded.message))
            .unwrap()
            .unwrap();
        assert_eq!(block.len(), 1000);
        assert!(block.is_consistent());

        // Replies arrive in order; the ack and the read result precede the block.
        assert!(matches!(others[0], Message::WriteAck(ack) if ack.bytes_written == 2));
        match &others[1] {
            Message::ReadResult(result) => assert_eq!(result.data.as_ref(), &[0xFF, 0xFF]),
            other => panic!("expected read result, got {other:?}"),
        }

        drop(reader);
        drop(device);
        assert_eq!(server.join().unwrap(), 3);
    }

    #[test]
    fn wait_without_request_returns_none() {
        let ((_device, mut reader), _device_end, _clock) =
            manual_session(DeviceConfig::default());
        assert!(reader.wait_for_samples(|_| {}).unwrap().is_none());
    }

    #[test]
    fn background_reader_delivers_messages() {
        let config = DeviceConfig {
            poll_interval: Duration::from_millis(5),
            ..DeviceConfig::default()
        };
        let ((_device, reader), mut device_end, _clock) = manual_session(config);
        let (tx, rx) = mpsc::channel();
        let handle = reader.spawn(tx).unwrap();

        device_end.write_all(&reply::triggered()).unwrap();
        device_end
            .write_all(&reply::sample_block(Opcode::Triggered, &[1, 2]))
            .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.name(), "triggered");
        assert_eq!(second.as_samples().unwrap().samples, vec![1, 2]);

        handle.join().unwrap();
    }

    #[test]
    fn background_reader_stops_when_receiver_drops() {
        let config = DeviceConfig {
            poll_interval: Duration::from_millis(5),
            ..DeviceConfig::default()
        };
        let ((_device, reader), mut device_end, _clock) = manual_session(config);
        let (tx, rx) = mpsc::channel();
        let handle = reader.spawn(tx).unwrap();
        drop(rx);

        device_end.write_all(&reply::triggered()).unwrap();
        for _ in 0..400 {
            if handle.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        handle.join().unwrap();
    }
}
