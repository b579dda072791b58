use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use probescope_device::{connect_with_config, DeviceConfig, DeviceError};
use probescope_message::{Decoded, Message, VGA_FULL_SCALE};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::exit::{device_error, io_error, CliResult, SUCCESS};
use crate::output::{print_message, print_warning, raw_bytes, MessageOutput, OutputFormat};
use crate::port::PathLink;

// Sleep slice between requests, so Ctrl-C is honoured promptly.
const SLEEP_STEP: Duration = Duration::from_millis(50);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let config = DeviceConfig {
        request_timeout: parse_duration(&args.timeout)?,
        lock_timeout: parse_duration(&args.lock_timeout)?,
        ..DeviceConfig::default()
    };

    let link = PathLink::open(&args.link.path, args.link.tx.as_deref()).map_err(|err| {
        io_error(&format!("failed opening {}", args.link.path.display()), err)
    })?;
    let (device, mut reader) = connect_with_config(link, config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.init {
        device
            .init_dac()
            .and_then(|()| device.set_vga(VGA_FULL_SCALE))
            .map_err(|err| device_error("device init failed", err))?;
        info!("DAC initialised, gain at full scale");
    }

    let mut index = 0u64;
    let mut blocks = 0u64;
    let mut expired = 0u64;

    while running.load(Ordering::SeqCst) {
        match device.request_samples() {
            Ok(deadline) => debug!(?deadline, "sample request sent"),
            Err(DeviceError::RequestPending { remaining }) => {
                debug!(?remaining, "previous request still pending");
            }
            Err(err) => return Err(device_error("sample request failed", err)),
        }

        let block = reader
            .wait_for_samples(|Decoded { message, warnings }| {
                for warning in &warnings {
                    print_warning(index, warning, format);
                }
                if let Some(message) = &message {
                    let out = MessageOutput::new(index, message, args.scale, args.samples);
                    print_message(&out, raw_bytes(message).as_deref(), format);
                }
                index += 1;
            })
            .map_err(|err| device_error("receive failed", err))?;

        match block {
            Some(block) => {
                let message = Message::Samples(block);
                let out = MessageOutput::new(index, &message, args.scale, args.samples);
                print_message(&out, raw_bytes(&message).as_deref(), format);
                index += 1;
                blocks += 1;
            }
            None => {
                expired += 1;
                warn!(timeout = ?reader.config().request_timeout, "sample request expired");
            }
        }

        if args.count.is_some_and(|count| blocks >= count) {
            break;
        }
        sleep_while_running(interval, &running);
    }

    info!(blocks, expired, frames = reader.decoder().frames(), "monitor stopped");
    Ok(SUCCESS)
}

fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let mut left = total;
    while !left.is_zero() && running.load(Ordering::SeqCst) {
        let step = left.min(SLEEP_STEP);
        thread::sleep(step);
        left -= step;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn sleep_returns_early_once_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        sleep_while_running(Duration::from_secs(5), &running);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_covers_the_interval() {
        let running = AtomicBool::new(true);
        let start = Instant::now();
        sleep_while_running(Duration::from_millis(120), &running);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
