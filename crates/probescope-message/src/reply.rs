//! Device-to-host frames, as the instrument writes them.
//!
//! The host never sends these. They exist for the emulator and for tests that
//! need realistic device traffic.

use bytes::{BufMut, Bytes, BytesMut};
use probescope_frame::{encode_frame, escape_into, BLOCK_END, END, START};

use crate::decode::{MAX_SAMPLE_COUNT, SAMPLE_HEADER_LEN};
use crate::opcode::{
    Opcode, DATA_TAG, KIND_COMMAND, KIND_RESPONSE, LENGTH_TAG, READ_REGISTERS, TRIGGERED,
    WRITE_REGISTERS,
};

/// A sample block answering `opcode` (request sample data, or triggered).
///
/// The count field is 24 bits wide; samples past [`MAX_SAMPLE_COUNT`] are
/// not sent.
pub fn sample_block(opcode: Opcode, samples: &[i8]) -> Bytes {
    let samples = &samples[..samples.len().min(MAX_SAMPLE_COUNT)];
    let mut payload = BytesMut::with_capacity(SAMPLE_HEADER_LEN + samples.len());
    payload.put_u8(KIND_RESPONSE);
    payload.put_u8(opcode.as_byte());
    payload.put_u8(LENGTH_TAG);
    payload.put_uint_le(samples.len() as u64, 3);
    payload.put_u8(0x00);
    payload.put_u8(DATA_TAG);
    payload.extend(samples.iter().map(|&s| s as u8));
    framed(&payload)
}

/// Acknowledge a register write of `bytes_written` bytes.
pub fn write_ack(bytes_written: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(7);
    payload.put_u8(KIND_RESPONSE);
    payload.put_u8(WRITE_REGISTERS);
    payload.put_u8(LENGTH_TAG);
    payload.put_u32_le(bytes_written);
    framed(&payload)
}

/// Return register bytes.
///
/// The device closes the data field with an unescaped block-end byte, which
/// the parser keeps as the last payload byte. At most `u32::MAX` bytes are
/// sent.
pub fn read_result(data: &[u8]) -> Bytes {
    let length = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let data = &data[..length as usize];
    let mut wire = BytesMut::with_capacity(2 * data.len() + 24);
    wire.put_u8(START);
    wire.put_slice(&[KIND_RESPONSE, READ_REGISTERS, LENGTH_TAG, 0x00]);
    escape_into(&length.to_le_bytes(), &mut wire);
    wire.put_u8(DATA_TAG);
    escape_into(data, &mut wire);
    wire.put_u8(BLOCK_END);
    wire.put_u8(END);
    wire.freeze()
}

/// Trigger notification.
pub fn triggered() -> Bytes {
    framed(&[KIND_COMMAND, TRIGGERED])
}

fn framed(payload: &[u8]) -> Bytes {
    let mut wire = BytesMut::new();
    encode_frame(payload, &mut wire);
    wire.freeze()
}
