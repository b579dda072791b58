use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use probescope_device::{Emulator, EmulatorConfig};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, EmulateArgs};
use crate::exit::{device_error, io_error, CliError, CliResult, SUCCESS};
use crate::port::PathLink;

pub fn run(args: EmulateArgs) -> CliResult<i32> {
    let config = emulator_config(&args)?;
    let link = PathLink::open(&args.link.path, args.link.tx.as_deref()).map_err(|err| {
        io_error(&format!("failed opening {}", args.link.path.display()), err)
    })?;
    let (rx, tx) = link.split();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(path = %args.link.path.display(), "emulating device");
    let mut emulator = Emulator::with_config(rx, tx, config)
        .map_err(|err| device_error("emulator setup failed", err))?;
    let served = emulator
        .run(&running)
        .map_err(|err| device_error("emulator failed", err))?;
    info!(served, "emulator stopped");
    Ok(SUCCESS)
}

fn emulator_config(args: &EmulateArgs) -> CliResult<EmulatorConfig> {
    if args.samples == 0 {
        return Err(CliError::usage("--samples must be greater than zero"));
    }
    if !args.amplitude.is_finite() || args.amplitude < 0.0 {
        return Err(CliError::usage("--amplitude must be a non-negative number"));
    }
    let trigger_interval = args
        .trigger_every
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    Ok(EmulatorConfig {
        samples_per_block: args.samples,
        amplitude: args.amplitude,
        noise: args.noise,
        trigger_interval,
        ..EmulatorConfig::default()
    })
}
