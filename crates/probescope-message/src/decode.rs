//! Typed decoders.
//!
//! Each decoder takes the whole unstuffed payload, selector bytes included.
//! Declared fields are checked against what actually arrived; disagreements
//! are pushed to the warning sink and the decoder returns whatever the bytes
//! present support. Missing bytes read as zero.

use bytes::Bytes;

use crate::message::{RegisterReadResult, RegisterWriteAck, SampleBlock, TriggerNotification};
use crate::opcode::{DATA_TAG, LENGTH_TAG};
use crate::warning::{IntegrityWarning, ProtocolWarning};

/// Bytes before the first sample: kind, opcode, 'L', 24-bit count, pad, 'D'.
pub const SAMPLE_HEADER_LEN: usize = 8;
/// Largest count the 24-bit sample count field can carry.
pub const MAX_SAMPLE_COUNT: usize = 0xFF_FFFF;
/// Fixed size of a write acknowledgement: kind, opcode, 'L', u32.
pub const WRITE_ACK_LEN: usize = 7;
/// Bytes before the register data: kind, opcode, 'L', pad, u32 length, 'D'.
pub const READ_HEADER_LEN: usize = 9;
/// Header plus the trailing block-end byte.
pub const READ_OVERHEAD: usize = READ_HEADER_LEN + 1;

/// Decode a sample block (response to `REQUEST_SAMPLE_DATA` or `TRIGGERED`).
///
/// Layout: `[0]=kind [1]=opcode [2]='L' [3..6]=24-bit LE count [6]=pad
/// [7]='D' [8..]=samples`. The pad byte is not part of the count.
pub fn sample_block(payload: &[u8], warnings: &mut Vec<ProtocolWarning>) -> SampleBlock {
    check_len(payload, SAMPLE_HEADER_LEN, warnings);
    check_tag(payload, "length", 2, LENGTH_TAG, warnings);
    let declared = read_le(payload, 3, 3);
    check_tag(payload, "data", 7, DATA_TAG, warnings);

    let samples: Vec<i8> = payload
        .get(SAMPLE_HEADER_LEN..)
        .unwrap_or_default()
        .iter()
        .map(|&b| b as i8)
        .collect();

    let block = SampleBlock::new(declared, samples);
    if !block.is_consistent() {
        warnings.push(
            IntegrityWarning::SampleCountMismatch {
                declared,
                actual: block.len(),
            }
            .into(),
        );
    }
    block
}

/// Decode a register-write acknowledgement.
///
/// Layout: `[0]=kind [1]=opcode [2]='L' [3..7]=u32 LE bytes written`.
pub fn write_ack(payload: &[u8], warnings: &mut Vec<ProtocolWarning>) -> RegisterWriteAck {
    check_len(payload, WRITE_ACK_LEN, warnings);
    check_tag(payload, "length", 2, LENGTH_TAG, warnings);
    RegisterWriteAck {
        bytes_written: read_le(payload, 3, 4),
    }
}

/// Decode a register-read result.
///
/// Layout: `[2]='L' [4..8]=u32 LE length [8]='D' [9..len-1]=data`, with one
/// trailing block-end byte. The whole payload is `length + 10` bytes.
pub fn read_result(payload: &[u8], warnings: &mut Vec<ProtocolWarning>) -> RegisterReadResult {
    check_len(payload, READ_OVERHEAD, warnings);
    check_tag(payload, "length", 2, LENGTH_TAG, warnings);
    let declared = read_le(payload, 4, 4);
    check_tag(payload, "data", 8, DATA_TAG, warnings);

    let data_end = payload.len().saturating_sub(1).max(READ_HEADER_LEN);
    let data = payload
        .get(READ_HEADER_LEN..data_end)
        .map(Bytes::copy_from_slice)
        .unwrap_or_default();

    let expected = u64::from(declared) + READ_OVERHEAD as u64;
    if payload.len() as u64 != expected {
        warnings.push(
            IntegrityWarning::ReadLengthMismatch {
                declared,
                actual: data.len(),
            }
            .into(),
        );
    }

    RegisterReadResult { declared, data }
}

/// Decode a trigger notification. Any bytes after the opcode are ignored.
pub fn trigger(_payload: &[u8]) -> TriggerNotification {
    TriggerNotification
}

fn check_len(payload: &[u8], needed: usize, warnings: &mut Vec<ProtocolWarning>) {
    if payload.len() < needed {
        warnings.push(
            IntegrityWarning::Truncated {
                needed,
                actual: payload.len(),
            }
            .into(),
        );
    }
}

fn check_tag(
    payload: &[u8],
    field: &'static str,
    offset: usize,
    expected: u8,
    warnings: &mut Vec<ProtocolWarning>,
) {
    // Absent tags are already covered by the length check.
    if let Some(&found) = payload.get(offset) {
        if found != expected {
            warnings.push(
                IntegrityWarning::TagMismatch {
                    field,
                    offset,
                    expected,
                    found,
                }
                .into(),
            );
        }
    }
}

/// Little-endian unsigned field of `width` (at most 4) bytes.
fn read_le(payload: &[u8], offset: usize, width: usize) -> u32 {
    let mut raw = [0u8; 4];
    for (i, slot) in raw.iter_mut().take(width).enumerate() {
        *slot = payload.get(offset + i).copied().unwrap_or(0);
    }
    u32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrity(warnings: &[ProtocolWarning]) -> Vec<IntegrityWarning> {
        warnings
            .iter()
            .filter_map(|w| match w {
                ProtocolWarning::Integrity(i) => Some(i.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sample_block_consistent() {
        let payload = [0x52, 0x73, 0x4C, 0x03, 0, 0, 0, 0x44, 0x01, 0xFF, 0x80];
        let mut warnings = Vec::new();
        let block = sample_block(&payload, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(block.declared, 3);
        assert_eq!(block.samples, vec![1, -1, -128]);
    }

    #[test]
    fn sample_count_ignores_pad_byte() {
        let payload = [0x52, 0x73, 0x4C, 0x01, 0x00, 0x00, 0x01, 0x44, 0x2A];
        let mut warnings = Vec::new();
        let block = sample_block(&payload, &mut warnings);

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(block.declared, 1);
        assert_eq!(block.samples, vec![42]);
    }

    #[test]
    fn sample_count_is_three_bytes_wide() {
        let mut payload = vec![0x52, 0x73, 0x4C, 0x03, 0x01, 0x00, 0xFF, 0x44];
        payload.resize(SAMPLE_HEADER_LEN + 0x0103, 0);
        let mut warnings = Vec::new();
        let block = sample_block(&payload, &mut warnings);

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(block.declared, 0x0103);
    }

    #[test]
    fn sample_count_mismatch_keeps_actual_bytes() {
        let payload = [0x52, 0x73, 0x4C, 0x05, 0, 0, 0, 0x44, 0x07, 0x08];
        let mut warnings = Vec::new();
        let block = sample_block(&payload, &mut warnings);

        assert_eq!(block.samples, vec![7, 8]);
        assert_eq!(
            integrity(&warnings),
            vec![IntegrityWarning::SampleCountMismatch {
                declared: 5,
                actual: 2
            }]
        );
    }

    #[test]
    fn sample_block_wrong_tags_still_decodes() {
        let payload = [0x52, 0x74, 0x00, 0x01, 0, 0, 0, 0x00, 0x2A];
        let mut warnings = Vec::new();
        let block = sample_block(&payload, &mut warnings);

        assert_eq!(block.samples, vec![42]);
        let found = integrity(&warnings);
        assert_eq!(found.len(), 2);
        assert!(matches!(
            found[0],
            IntegrityWarning::TagMismatch { field: "length", offset: 2, .. }
        ));
        assert!(matches!(
            found[1],
            IntegrityWarning::TagMismatch { field: "data", offset: 7, .. }
        ));
    }

    #[test]
    fn truncated_sample_header_does_not_panic() {
        let mut warnings = Vec::new();
        let block = sample_block(&[0x52, 0x73, 0x4C, 0x02], &mut warnings);

        assert!(block.is_empty());
        assert_eq!(block.declared, 2);
        let found = integrity(&warnings);
        assert!(found.contains(&IntegrityWarning::Truncated {
            needed: SAMPLE_HEADER_LEN,
            actual: 4
        }));
        assert!(found.contains(&IntegrityWarning::SampleCountMismatch {
            declared: 2,
            actual: 0
        }));
    }

    #[test]
    fn write_ack_reads_count() {
        let mut warnings = Vec::new();
        let ack = write_ack(&[0x52, 0x77, 0x4C, 0x04, 0x01, 0, 0], &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(ack.bytes_written, 0x0104);
    }

    #[test]
    fn short_write_ack_reads_missing_bytes_as_zero() {
        let mut warnings = Vec::new();
        let ack = write_ack(&[0x52, 0x77, 0x4C, 0x09], &mut warnings);
        assert_eq!(ack.bytes_written, 9);
        assert_eq!(
            integrity(&warnings),
            vec![IntegrityWarning::Truncated {
                needed: WRITE_ACK_LEN,
                actual: 4
            }]
        );
    }

    #[test]
    fn read_result_extracts_data() {
        let payload = [
            0x52, 0x72, 0x4C, 0x00, 0x03, 0, 0, 0, 0x44, 0xAA, 0xBB, 0xCC, 0x17,
        ];
        let mut warnings = Vec::new();
        let result = read_result(&payload, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(result.declared, 3);
        assert_eq!(result.data.as_ref(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn read_result_length_mismatch() {
        let payload = [0x52, 0x72, 0x4C, 0x00, 0x04, 0, 0, 0, 0x44, 0xAA, 0x17];
        let mut warnings = Vec::new();
        let result = read_result(&payload, &mut warnings);

        assert_eq!(result.data.as_ref(), &[0xAA]);
        assert_eq!(
            integrity(&warnings),
            vec![IntegrityWarning::ReadLengthMismatch {
                declared: 4,
                actual: 1
            }]
        );
    }

    #[test]
    fn read_result_header_only() {
        let mut warnings = Vec::new();
        let result = read_result(&[0x52, 0x72], &mut warnings);
        assert!(result.data.is_empty());
        assert_eq!(result.declared, 0);
        assert!(!warnings.is_empty());
    }
}
