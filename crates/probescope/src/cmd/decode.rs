use std::fs;
use std::io::Read;

use probescope_message::MessageDecoder;
use tracing::{info, warn};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, CliResult, PROTOCOL_WARNINGS, SUCCESS};
use crate::output::{print_message, print_warning, raw_bytes, MessageOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(&args)?;
    let bytes = if args.hex {
        parse_hex(&String::from_utf8_lossy(&input))?
    } else {
        input
    };

    let mut decoder = MessageDecoder::new();
    let mut index = 0u64;
    let mut warnings = 0u64;

    for decoded in decoder.feed_slice(&bytes) {
        for warning in &decoded.warnings {
            print_warning(index, warning, format);
            warnings += 1;
        }
        if let Some(message) = &decoded.message {
            let out = MessageOutput::new(index, message, args.scale, args.samples);
            print_message(&out, raw_bytes(message).as_deref(), format);
        }
        index += 1;
    }

    if !decoder.is_idle() {
        warn!(
            buffered = decoder.parser().buffered(),
            "input ended inside a frame"
        );
    }
    info!(
        bytes = bytes.len(),
        frames = decoder.frames(),
        warnings,
        "decode finished"
    );

    if args.strict && warnings > 0 {
        return Ok(PROTOCOL_WARNINGS);
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(buf)
        }
    }
}
