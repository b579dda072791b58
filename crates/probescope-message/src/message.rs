use bytes::Bytes;

/// A decoded inbound message.
///
/// Every variant owns its data; nothing borrows from the parser's buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Acquired samples (polled reply or trigger push).
    Samples(SampleBlock),
    /// Acknowledgement of a register write.
    WriteAck(RegisterWriteAck),
    /// Bytes returned by a register read.
    ReadResult(RegisterReadResult),
    /// The device triggered.
    Triggered(TriggerNotification),
}

impl Message {
    /// Short name for logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Samples(_) => "samples",
            Message::WriteAck(_) => "write-ack",
            Message::ReadResult(_) => "read-result",
            Message::Triggered(_) => "triggered",
        }
    }

    pub fn as_samples(&self) -> Option<&SampleBlock> {
        match self {
            Message::Samples(block) => Some(block),
            _ => None,
        }
    }
}

/// A burst of signed 8-bit samples.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleBlock {
    /// Sample count the device declared in the frame header.
    pub declared: u32,
    /// Samples actually received, in acquisition order.
    pub samples: Vec<i8>,
}

impl SampleBlock {
    pub fn new(declared: u32, samples: Vec<i8>) -> Self {
        Self { declared, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when the declared count matches the samples received.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.declared) == self.samples.len() as u64
    }

    /// Samples scaled to volts with `volts_per_count`.
    pub fn volts(&self, volts_per_count: f64) -> Vec<f64> {
        self.samples
            .iter()
            .map(|&s| f64::from(s) * volts_per_count)
            .collect()
    }

    /// Peak-to-peak span in raw counts, or `None` for an empty block.
    pub fn peak_to_peak(&self) -> Option<u8> {
        let min = self.samples.iter().min()?;
        let max = self.samples.iter().max()?;
        // i8 span is at most 255.
        Some((i16::from(*max) - i16::from(*min)) as u8)
    }

    /// Root-mean-square in raw counts, or `None` for an empty block.
    pub fn rms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum_sq: f64 = self.samples.iter().map(|&s| f64::from(s).powi(2)).sum();
        Some((sum_sq / self.samples.len() as f64).sqrt())
    }
}

/// Register-write acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWriteAck {
    /// Bytes the device reports as written.
    pub bytes_written: u32,
}

/// Register-read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReadResult {
    /// Length the device declared.
    pub declared: u32,
    /// Register bytes received.
    pub data: Bytes,
}

/// Trigger notification; carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerNotification;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_compares_declared_with_received() {
        assert!(SampleBlock::new(3, vec![1, 2, 3]).is_consistent());
        assert!(!SampleBlock::new(4, vec![1, 2, 3]).is_consistent());
    }

    #[test]
    fn peak_to_peak_spans_full_range() {
        let block = SampleBlock::new(3, vec![-128, 0, 127]);
        assert_eq!(block.peak_to_peak(), Some(255));
        assert_eq!(SampleBlock::default().peak_to_peak(), None);
    }

    #[test]
    fn rms_of_constant_magnitude() {
        let block = SampleBlock::new(4, vec![3, -3, 3, -3]);
        assert!((block.rms().unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(SampleBlock::default().rms(), None);
    }

    #[test]
    fn volts_scale_each_sample() {
        let block = SampleBlock::new(2, vec![10, -20]);
        assert_eq!(block.volts(0.5), vec![5.0, -10.0]);
    }

    #[test]
    fn message_names() {
        assert_eq!(Message::Triggered(TriggerNotification).name(), "triggered");
        let samples = Message::Samples(SampleBlock::default());
        assert!(samples.as_samples().is_some());
        assert!(Message::WriteAck(RegisterWriteAck { bytes_written: 1 })
            .as_samples()
            .is_none());
    }
}
