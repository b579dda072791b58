use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod emulate;
pub mod encode;
pub mod monitor;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the wire bytes of a command.
    Encode(EncodeArgs),
    /// Decode a captured byte stream.
    Decode(DecodeArgs),
    /// Play the device side of the protocol on a link.
    Emulate(EmulateArgs),
    /// Request sample blocks from a device and print them.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Emulate(args) => emulate::run(args),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(subcommand)]
    pub command: EncodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Request one sample block.
    SampleRequest,
    /// Read registers.
    Read {
        /// Start address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u32)]
        address: u32,
        /// Number of bytes to read.
        #[arg(value_parser = parse_u32)]
        length: u32,
    },
    /// Write registers.
    Write {
        /// Start address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u32)]
        address: u32,
        /// Bytes to write, as hex (e.g. "aa 01" or "aa01").
        data: String,
    },
    /// Initialise the DAC.
    InitDac,
    /// Set the four DAC channels.
    SetDac {
        a: u16,
        b: u16,
        c: u16,
        d: u16,
    },
    /// Set the front-end gain.
    SetVga {
        /// Two gain bytes as hex. Default: full scale.
        gain: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Input is hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Exit with a non-zero code if any protocol warning was seen.
    #[arg(long)]
    pub strict: bool,
    /// Include every sample value in the output.
    #[arg(long)]
    pub samples: bool,
    /// Volts per count for pk-pk and RMS.
    #[arg(long)]
    pub scale: Option<f64>,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Link path to read from (pty, serial device, FIFO).
    pub path: PathBuf,
    /// Separate path to write to. Default: the read path.
    #[arg(long, value_name = "PATH")]
    pub tx: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Samples per block.
    #[arg(long, default_value = "1000")]
    pub samples: usize,
    /// Sine amplitude in counts.
    #[arg(long, default_value = "123")]
    pub amplitude: f64,
    /// Standard deviation of the Gaussian noise, in counts.
    #[arg(long, default_value = "4")]
    pub noise: f64,
    /// Push a trigger block at this interval (e.g. 2s, 250ms).
    #[arg(long)]
    pub trigger_every: Option<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after N sample blocks.
    #[arg(long)]
    pub count: Option<u64>,
    /// Pause between requests (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Deadline for each request.
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Bounded wait for the link lock.
    #[arg(long, default_value = "2s")]
    pub lock_timeout: String,
    /// Initialise the DAC and set full-scale gain before sampling.
    #[arg(long)]
    pub init: bool,
    /// Include every sample value in the output.
    #[arg(long)]
    pub samples: bool,
    /// Volts per count for pk-pk and RMS.
    #[arg(long)]
    pub scale: Option<f64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Decimal or `0x`-prefixed hex.
pub fn parse_u32(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid number {input:?}: {err}"))
}

/// Hex digits, with optional whitespace, commas or `0x` prefixes between bytes.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex input: {err}")))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_u32_accepts_hex_and_decimal() {
        assert_eq!(parse_u32("0x4000"), Ok(0x4000));
        assert_eq!(parse_u32("0X30_00"), Ok(0x3000));
        assert_eq!(parse_u32("16384"), Ok(16384));
        assert!(parse_u32("0xZZ").is_err());
    }

    #[test]
    fn parse_hex_tolerates_separators() {
        assert_eq!(parse_hex("1e 43 73 04").unwrap(), vec![0x1E, 0x43, 0x73, 0x04]);
        assert_eq!(parse_hex("0x1E,0x43\n7304").unwrap(), vec![0x1E, 0x43, 0x73, 0x04]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("1e4").is_err());
        assert!(parse_hex("zz").is_err());
        assert_eq!(parse_hex("1é").unwrap_err().code, crate::exit::USAGE);
    }
}
