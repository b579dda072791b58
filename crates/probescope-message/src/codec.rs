//! `tokio_util::codec` adapter.

use bytes::{Buf, BytesMut};
use probescope_frame::{FrameConfig, FrameError};
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Command;
use crate::decoder::MessageDecoder;
use crate::message::Message;

/// Host-side codec: decodes device messages, encodes commands.
///
/// Protocol warnings are logged by the inner [`MessageDecoder`] and do not
/// end the stream.
#[derive(Debug, Default)]
pub struct ProbeCodec {
    decoder: MessageDecoder,
}

impl ProbeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            decoder: MessageDecoder::with_config(config),
        }
    }

    pub fn decoder(&self) -> &MessageDecoder {
        &self.decoder
    }
}

impl Decoder for ProbeCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(message) = self.decoder.feed(byte).message {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            None if self.decoder.is_idle() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Command> for ProbeCodec {
    type Error = FrameError;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        command.encode(dst);
        Ok(())
    }
}
