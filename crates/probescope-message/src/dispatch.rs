use tracing::trace;

use crate::decode;
use crate::message::Message;
use crate::opcode::{FrameKind, Opcode};
use crate::warning::ProtocolWarning;

/// Interpret one complete payload.
///
/// Byte 0 selects the frame kind and byte 1 the opcode. Payloads that select
/// nothing produce a dispatch warning and no message; payloads that select a
/// decoder always produce a message, possibly with integrity warnings.
pub fn dispatch(payload: &[u8], warnings: &mut Vec<ProtocolWarning>) -> Option<Message> {
    let Some(&kind_byte) = payload.first() else {
        warnings.push(ProtocolWarning::EmptyFrame);
        return None;
    };

    let Some(kind) = FrameKind::from_byte(kind_byte) else {
        warnings.push(ProtocolWarning::UnknownKind {
            kind: kind_byte,
            len: payload.len(),
        });
        return None;
    };

    let Some(&opcode_byte) = payload.get(1) else {
        warnings.push(ProtocolWarning::MissingOpcode { kind });
        return None;
    };

    trace!(%kind, opcode = opcode_byte, len = payload.len(), "dispatching frame");

    let unknown = ProtocolWarning::UnknownOpcode {
        kind,
        opcode: opcode_byte,
    };

    let message = match (kind, Opcode::from_byte(opcode_byte)) {
        (FrameKind::Command, Some(Opcode::Triggered)) => {
            Message::Triggered(decode::trigger(payload))
        }
        (FrameKind::Command, Some(Opcode::RequestSampleData))
        | (FrameKind::Command, Some(Opcode::WriteRegisters))
        | (FrameKind::Command, Some(Opcode::ReadRegisters))
        | (_, None) => {
            warnings.push(unknown);
            return None;
        }
        (FrameKind::Response, Some(Opcode::RequestSampleData))
        | (FrameKind::Response, Some(Opcode::Triggered)) => {
            Message::Samples(decode::sample_block(payload, warnings))
        }
        (FrameKind::Response, Some(Opcode::WriteRegisters)) => {
            Message::WriteAck(decode::write_ack(payload, warnings))
        }
        (FrameKind::Response, Some(Opcode::ReadRegisters)) => {
            Message::ReadResult(decode::read_result(payload, warnings))
        }
    };

    Some(message)
}
