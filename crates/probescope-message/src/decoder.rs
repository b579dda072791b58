use probescope_frame::{FrameConfig, FrameParser};
use tracing::{debug, warn};

use crate::dispatch::dispatch;
use crate::message::Message;
use crate::warning::ProtocolWarning;

/// Outcome of feeding input to a [`MessageDecoder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// The message completed by this input, if any.
    pub message: Option<Message>,
    /// Non-fatal violations noticed while handling this input.
    pub warnings: Vec<ProtocolWarning>,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.warnings.is_empty()
    }
}

/// Streaming decoder: bytes in, typed messages out.
///
/// Owns one [`FrameParser`]; completed frames go straight to the dispatcher.
/// One instance per connection.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    parser: FrameParser,
    frames: u64,
    warnings: u64,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_config(config),
            frames: 0,
            warnings: 0,
        }
    }

    /// Feed one byte. At most one message results.
    pub fn feed(&mut self, byte: u8) -> Decoded {
        let mut decoded = Decoded::default();
        match self.parser.feed(byte) {
            Ok(None) => {}
            Ok(Some(frame)) => {
                self.frames += 1;
                decoded.message = dispatch(&frame.payload, &mut decoded.warnings);
                if let Some(message) = &decoded.message {
                    debug!(message = message.name(), len = frame.payload.len(), "decoded message");
                }
            }
            Err(warning) => decoded.warnings.push(warning.into()),
        }
        self.note(&decoded.warnings);
        decoded
    }

    /// Feed a chunk, returning only the outcomes that carry something.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<Decoded> {
        bytes
            .iter()
            .map(|&byte| self.feed(byte))
            .filter(|decoded| !decoded.is_empty())
            .collect()
    }

    /// Feed a chunk and keep only the messages. Warnings are still logged.
    pub fn messages(&mut self, bytes: &[u8]) -> Vec<Message> {
        self.feed_slice(bytes)
            .into_iter()
            .filter_map(|decoded| decoded.message)
            .collect()
    }

    /// True between frames.
    pub fn is_idle(&self) -> bool {
        self.parser.is_idle()
    }

    /// Discard any partial frame. Call on reconnect.
    pub fn reset(&mut self) {
        if !self.parser.is_idle() {
            debug!(buffered = self.parser.buffered(), "discarding partial frame");
        }
        self.parser.reset();
    }

    /// Record a warning raised outside the byte path (e.g. an idle timeout).
    pub fn report(&mut self, warning: ProtocolWarning) -> Decoded {
        let decoded = Decoded {
            message: None,
            warnings: vec![warning],
        };
        self.note(&decoded.warnings);
        decoded
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Warnings reported so far.
    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    fn note(&mut self, warnings: &[ProtocolWarning]) {
        for warning in warnings {
            self.warnings += 1;
            warn!(%warning, category = warning.category(), "protocol warning");
        }
    }
}
