//! Host-to-device command frames.

use bytes::{BufMut, Bytes, BytesMut};
use probescope_frame::encode_frame;

use crate::opcode::{
    FrameKind, Opcode, ADDRESS_TAG, DATA_TAG, KIND_COMMAND, LENGTH_TAG, READ_REGISTERS,
    REQUEST_SAMPLE_DATA, WRITE_REGISTERS,
};
use crate::warning::{IntegrityWarning, ProtocolWarning};

/// DAC control register.
pub const DAC_INIT_ADDRESS: u32 = 0x4000;
/// Value written to [`DAC_INIT_ADDRESS`] to initialise the DAC.
pub const DAC_INIT_VALUE: u8 = 0xAA;
/// First DAC channel register; four `u16` LE values follow from here.
pub const DAC_CHANNELS_ADDRESS: u32 = 0x4002;
/// Variable-gain amplifier register.
pub const VGA_ADDRESS: u32 = 0x3000;
/// Gain setting for the full input range.
pub const VGA_FULL_SCALE: [u8; 2] = [0xFF, 0xFF];

/// An outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for one sample block.
    RequestSamples,
    /// Write `data` starting at `address`.
    ///
    /// The length field is a `u32`; only the first `u32::MAX` bytes of
    /// `data` are ever encoded.
    WriteRegisters { address: u32, data: Bytes },
    /// Read `length` bytes starting at `address`.
    ReadRegisters { address: u32, length: u32 },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::RequestSamples => Opcode::RequestSampleData,
            Command::WriteRegisters { .. } => Opcode::WriteRegisters,
            Command::ReadRegisters { .. } => Opcode::ReadRegisters,
        }
    }

    /// The unstuffed payload, selector bytes included.
    pub fn payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(KIND_COMMAND);
        match self {
            Command::RequestSamples => buf.put_u8(REQUEST_SAMPLE_DATA),
            Command::WriteRegisters { address, data } => {
                let (length, data) = length_field(data);
                buf.reserve(12 + data.len());
                buf.put_u8(WRITE_REGISTERS);
                buf.put_u8(ADDRESS_TAG);
                buf.put_u32_le(*address);
                buf.put_u8(LENGTH_TAG);
                buf.put_u32_le(length);
                buf.put_u8(DATA_TAG);
                buf.put_slice(data);
            }
            Command::ReadRegisters { address, length } => {
                buf.put_u8(READ_REGISTERS);
                buf.put_u8(ADDRESS_TAG);
                buf.put_u32_le(*address);
                buf.put_u8(LENGTH_TAG);
                buf.put_u32_le(*length);
            }
        }
        buf.freeze()
    }

    /// Append the framed, stuffed wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(&self.payload(), dst);
    }

    /// The framed, stuffed wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Parse a host command from an unstuffed payload (device side).
    pub fn from_payload(payload: &[u8]) -> Result<Command, ProtocolWarning> {
        let Some(&kind_byte) = payload.first() else {
            return Err(ProtocolWarning::EmptyFrame);
        };
        if kind_byte != KIND_COMMAND {
            return Err(ProtocolWarning::UnknownKind {
                kind: kind_byte,
                len: payload.len(),
            });
        }
        let Some(&opcode) = payload.get(1) else {
            return Err(ProtocolWarning::MissingOpcode {
                kind: FrameKind::Command,
            });
        };

        match Opcode::from_byte(opcode) {
            Some(Opcode::RequestSampleData) => Ok(Command::RequestSamples),
            Some(Opcode::WriteRegisters) => {
                let (address, length) = address_and_length(payload)?;
                expect_tag(payload, "data", 12, DATA_TAG)?;
                let data = &payload[13..];
                if data.len() as u64 != u64::from(length) {
                    return Err(IntegrityWarning::Truncated {
                        needed: usize::try_from(length)
                            .map_or(usize::MAX, |length| length.saturating_add(13)),
                        actual: payload.len(),
                    }
                    .into());
                }
                Ok(Command::WriteRegisters {
                    address,
                    data: Bytes::copy_from_slice(data),
                })
            }
            Some(Opcode::ReadRegisters) => {
                let (address, length) = address_and_length(payload)?;
                Ok(Command::ReadRegisters { address, length })
            }
            Some(Opcode::Triggered) | None => Err(ProtocolWarning::UnknownOpcode {
                kind: FrameKind::Command,
                opcode,
            }),
        }
    }
}

/// The `u32` length field for `data`, and the part of `data` it covers.
fn length_field(data: &[u8]) -> (u32, &[u8]) {
    match u32::try_from(data.len()) {
        Ok(length) => (length, data),
        Err(_) => (u32::MAX, &data[..u32::MAX as usize]),
    }
}

fn address_and_length(payload: &[u8]) -> Result<(u32, u32), ProtocolWarning> {
    if payload.len() < 12 {
        return Err(IntegrityWarning::Truncated {
            needed: 12,
            actual: payload.len(),
        }
        .into());
    }
    expect_tag(payload, "address", 2, ADDRESS_TAG)?;
    expect_tag(payload, "length", 7, LENGTH_TAG)?;
    let address = u32::from_le_bytes([payload[3], payload[4], payload[5], payload[6]]);
    let length = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]);
    Ok((address, length))
}

fn expect_tag(
    payload: &[u8],
    field: &'static str,
    offset: usize,
    expected: u8,
) -> Result<(), ProtocolWarning> {
    match payload.get(offset) {
        Some(&found) if found == expected => Ok(()),
        Some(&found) => Err(IntegrityWarning::TagMismatch {
            field,
            offset,
            expected,
            found,
        }
        .into()),
        None => Err(IntegrityWarning::Truncated {
            needed: offset + 1,
            actual: payload.len(),
        }
        .into()),
    }
}

/// `1E 43 73 04`.
pub fn request_samples() -> Bytes {
    Command::RequestSamples.to_bytes()
}

pub fn write_registers(address: u32, data: &[u8]) -> Bytes {
    Command::WriteRegisters {
        address,
        data: Bytes::copy_from_slice(data),
    }
    .to_bytes()
}

pub fn read_registers(address: u32, length: u32) -> Bytes {
    Command::ReadRegisters { address, length }.to_bytes()
}

/// Initialise the DAC.
pub fn init_dac() -> Bytes {
    write_registers(DAC_INIT_ADDRESS, &[DAC_INIT_VALUE])
}

/// Set the four DAC channels.
pub fn set_dac(a: u16, b: u16, c: u16, d: u16) -> Bytes {
    let mut data = [0u8; 8];
    for (chunk, value) in data.chunks_exact_mut(2).zip([a, b, c, d]) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    write_registers(DAC_CHANNELS_ADDRESS, &data)
}

/// Set the front-end gain. [`VGA_FULL_SCALE`] selects the full range.
pub fn set_vga(gain: [u8; 2]) -> Bytes {
    write_registers(VGA_ADDRESS, &gain)
}
