use probescope_message::command::{self, VGA_FULL_SCALE};

use crate::cmd::{parse_hex, EncodeArgs, EncodeCommand};
use crate::exit::{CliError, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (name, wire) = wire_for(&args.command)?;
    print_encoded(name, &wire, format);
    Ok(SUCCESS)
}

fn wire_for(command: &EncodeCommand) -> CliResult<(&'static str, Vec<u8>)> {
    let (name, wire) = match command {
        EncodeCommand::SampleRequest => ("sample-request", command::request_samples()),
        EncodeCommand::Read { address, length } => {
            ("read", command::read_registers(*address, *length))
        }
        EncodeCommand::Write { address, data } => {
            ("write", command::write_registers(*address, &parse_hex(data)?))
        }
        EncodeCommand::InitDac => ("init-dac", command::init_dac()),
        EncodeCommand::SetDac { a, b, c, d } => ("set-dac", command::set_dac(*a, *b, *c, *d)),
        EncodeCommand::SetVga { gain } => {
            let gain = match gain {
                Some(hex) => <[u8; 2]>::try_from(parse_hex(hex)?.as_slice())
                    .map_err(|_| CliError::usage("gain must be exactly two bytes"))?,
                None => VGA_FULL_SCALE,
            };
            ("set-vga", command::set_vga(gain))
        }
    };
    Ok((name, wire.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_request_wire() {
        let (name, wire) = wire_for(&EncodeCommand::SampleRequest).unwrap();
        assert_eq!(name, "sample-request");
        assert_eq!(wire, vec![0x1E, 0x43, 0x73, 0x04]);
    }

    #[test]
    fn write_parses_hex_data() {
        let (_, wire) = wire_for(&EncodeCommand::Write {
            address: 0x4000,
            data: "aa".into(),
        })
        .unwrap();
        assert_eq!(wire, command::init_dac().to_vec());
    }

    #[test]
    fn vga_defaults_to_full_scale() {
        let (_, wire) = wire_for(&EncodeCommand::SetVga { gain: None }).unwrap();
        assert_eq!(wire, command::set_vga([0xFF, 0xFF]).to_vec());
    }

    #[test]
    fn vga_gain_must_be_two_bytes() {
        let err = wire_for(&EncodeCommand::SetVga {
            gain: Some("ff".into()),
        })
        .unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
