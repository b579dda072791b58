use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use probescope_frame::{FrameError, FrameReader, FrameWriter};
use probescope_message::opcode::Opcode;
use probescope_message::{reply, Command};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};

const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Shape of the emulated signal and limits of the emulated device.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Samples per block. Default: 1000.
    pub samples_per_block: usize,
    /// Sine amplitude in counts. Default: 123.
    pub amplitude: f64,
    /// Standard deviation of the Gaussian noise, in counts. Default: 4.
    pub noise: f64,
    /// Noise generator seed.
    pub seed: u64,
    /// Largest register read answered in full. Default: 1024.
    pub max_read_len: u32,
    /// Push a trigger block this often while running. Default: never.
    pub trigger_interval: Option<Duration>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            samples_per_block: 1000,
            amplitude: 123.0,
            noise: 4.0,
            seed: 0x9E37_79B9_7F4A_7C15,
            max_read_len: 1024,
            trigger_interval: None,
        }
    }
}

/// The instrument's side of the protocol.
///
/// Answers sample requests with one period of a noisy sine, stores register
/// writes and returns them on reads. Malformed commands are logged and left
/// unanswered.
pub struct Emulator<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: EmulatorConfig,
    registers: BTreeMap<u32, u8>,
    rng: StdRng,
    noise: Normal<f64>,
    served: u64,
}

impl<R: Read, W: Write> Emulator<R, W> {
    pub fn new(reader: R, writer: W) -> Result<Self> {
        Self::with_config(reader, writer, EmulatorConfig::default())
    }

    /// Fails with [`DeviceError::InvalidConfig`] when `noise` is negative or
    /// not finite.
    pub fn with_config(reader: R, writer: W, config: EmulatorConfig) -> Result<Self> {
        let noise = Normal::new(0.0, config.noise).map_err(|err| {
            DeviceError::InvalidConfig(format!("noise sigma {}: {err}", config.noise))
        })?;
        Ok(Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            rng: StdRng::seed_from_u64(config.seed),
            noise,
            config,
            registers: BTreeMap::new(),
            served: 0,
        })
    }

    /// Read one frame and answer it.
    ///
    /// Returns the command that was served, or `None` when the frame was not
    /// a valid host command.
    pub fn serve_one(&mut self) -> Result<Option<Command>> {
        let frame = self.reader.read_frame()?;
        let command = match Command::from_payload(&frame.payload) {
            Ok(command) => command,
            Err(warning) => {
                warn!(%warning, "ignoring malformed command");
                return Ok(None);
            }
        };

        match &command {
            Command::RequestSamples => {
                let samples = self.samples();
                self.writer
                    .send_encoded(&reply::sample_block(Opcode::RequestSampleData, &samples))?;
            }
            Command::WriteRegisters { address, data } => {
                for (offset, &byte) in data.iter().enumerate() {
                    self.registers
                        .insert(address.wrapping_add(offset as u32), byte);
                }
                self.writer.send_encoded(&reply::write_ack(data.len() as u32))?;
            }
            Command::ReadRegisters { address, length } => {
                let length = (*length).min(self.config.max_read_len);
                let data: Vec<u8> = (0..length)
                    .map(|offset| self.register(address.wrapping_add(offset)))
                    .collect();
                self.writer.send_encoded(&reply::read_result(&data))?;
            }
        }

        self.served += 1;
        debug!(opcode = %command.opcode(), served = self.served, "served command");
        Ok(Some(command))
    }

    /// Serve until `running` is cleared or the host goes away.
    ///
    /// Returns the number of commands served.
    pub fn run(&mut self, running: &AtomicBool) -> Result<u64> {
        info!(
            samples_per_block = self.config.samples_per_block,
            trigger_interval = ?self.config.trigger_interval,
            "emulator running"
        );
        let mut last_trigger = Instant::now();
        while running.load(Ordering::Relaxed) {
            let outcome = match self.serve_one() {
                Err(DeviceError::Frame(FrameError::Io(err)))
                    if err.kind() == ErrorKind::WouldBlock =>
                {
                    std::thread::sleep(IDLE_BACKOFF);
                    Ok(())
                }
                Err(DeviceError::Frame(FrameError::Io(err)))
                    if err.kind() == ErrorKind::TimedOut =>
                {
                    Ok(())
                }
                other => other.map(|_| ()),
            };
            match outcome.and_then(|()| self.trigger_if_due(&mut last_trigger)) {
                Ok(()) => {}
                Err(err) if host_gone(&err) => {
                    info!(error = %err, "host closed the link");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.served)
    }

    /// Announce a trigger and push the captured block.
    pub fn push_trigger(&mut self) -> Result<()> {
        let samples = self.samples();
        self.writer.send_encoded(&reply::triggered())?;
        self.writer
            .send_encoded(&reply::sample_block(Opcode::Triggered, &samples))?;
        debug!(len = samples.len(), "pushed trigger block");
        Ok(())
    }

    fn trigger_if_due(&mut self, last: &mut Instant) -> Result<()> {
        match self.config.trigger_interval {
            Some(every) if last.elapsed() >= every => {
                *last = Instant::now();
                self.push_trigger()
            }
            _ => Ok(()),
        }
    }

    /// One block: a full sine period plus Gaussian noise, clamped to `i8`.
    pub fn samples(&mut self) -> Vec<i8> {
        let n = self.config.samples_per_block;
        let step = if n > 1 { 2.0 * PI / (n - 1) as f64 } else { 0.0 };
        (0..n)
            .map(|i| {
                let clean = (-PI + step * i as f64).sin() * self.config.amplitude;
                let value = clean + self.noise.sample(&mut self.rng);
                value.round().clamp(f64::from(i8::MIN), f64::from(i8::MAX)) as i8
            })
            .collect()
    }

    /// Current register value; unwritten registers read as zero.
    pub fn register(&self, address: u32) -> u8 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    /// Commands served so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }
}

fn host_gone(err: &DeviceError) -> bool {
    match err {
        DeviceError::Frame(FrameError::ConnectionClosed) => true,
        DeviceError::Frame(FrameError::Io(err)) => matches!(
            err.kind(),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
