use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use probescope_message::{Message, ProtocolWarning, SampleBlock};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    record: &'static str,
    command: &'a str,
    size: usize,
    hex: String,
}

pub fn print_encoded(command: &str, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            record: "encoded",
            command,
            size: wire.len(),
            hex: hex(wire),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SIZE", "BYTES"])
                .add_row(vec![command.to_string(), wire.len().to_string(), hex(wire)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{command} ({} bytes): {}", wire.len(), hex(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

/// Summary of one decoded message.
#[derive(Serialize, Default)]
pub struct MessageOutput {
    record: &'static str,
    index: u64,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    declared: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_to_peak: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<Vec<i8>>,
    timestamp: String,
}

impl MessageOutput {
    /// `scale` converts counts to volts for pk-pk and RMS; `None` keeps counts.
    pub fn new(index: u64, message: &Message, scale: Option<f64>, with_samples: bool) -> Self {
        let mut out = MessageOutput {
            record: "message",
            index,
            message: message.name(),
            timestamp: now_unix_seconds(),
            ..MessageOutput::default()
        };
        match message {
            Message::Samples(block) => out.fill_samples(block, scale, with_samples),
            Message::WriteAck(ack) => out.declared = Some(ack.bytes_written),
            Message::ReadResult(result) => {
                out.declared = Some(result.declared);
                out.received = Some(result.data.len());
                out.data = Some(hex(&result.data));
            }
            Message::Triggered(_) => {}
        }
        out
    }

    fn fill_samples(&mut self, block: &SampleBlock, scale: Option<f64>, with_samples: bool) {
        let scale = scale.unwrap_or(1.0);
        self.declared = Some(block.declared);
        self.received = Some(block.len());
        self.consistent = Some(block.is_consistent());
        self.min = block.samples.iter().min().copied();
        self.max = block.samples.iter().max().copied();
        self.peak_to_peak = block.peak_to_peak().map(|p| f64::from(p) * scale);
        self.rms = block.rms().map(|r| r * scale);
        if with_samples {
            self.samples = Some(block.samples.clone());
        }
    }

    fn detail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(declared) = self.declared {
            parts.push(format!("declared={declared}"));
        }
        if let Some(received) = self.received {
            parts.push(format!("received={received}"));
        }
        if let Some(p2p) = self.peak_to_peak {
            parts.push(format!("pk-pk={p2p:.3}"));
        }
        if let Some(rms) = self.rms {
            parts.push(format!("rms={rms:.3}"));
        }
        if let Some(data) = &self.data {
            parts.push(format!("data={data}"));
        }
        parts.join(" ")
    }
}

pub fn print_message(out: &MessageOutput, raw: Option<&[u8]>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "MESSAGE", "DETAIL"])
                .add_row(vec![out.index.to_string(), out.message.to_string(), out.detail()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("#{} {} {}", out.index, out.message, out.detail()),
        OutputFormat::Raw => {
            if let Some(raw) = raw {
                print_raw(raw);
            }
        }
    }
}

#[derive(Serialize)]
struct WarningOutput {
    record: &'static str,
    index: u64,
    category: &'static str,
    warning: String,
}

pub fn print_warning(index: u64, warning: &ProtocolWarning, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&WarningOutput {
            record: "warning",
            index,
            category: warning.category(),
            warning: warning.to_string(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("#{index} warning [{}] {warning}", warning.category());
        }
        // Raw output carries payload bytes only; warnings are on stderr.
        OutputFormat::Raw => {}
    }
}

/// Bytes a raw-format consumer gets for a message.
pub fn raw_bytes(message: &Message) -> Option<Vec<u8>> {
    match message {
        Message::Samples(block) => Some(block.samples.iter().map(|&s| s as u8).collect()),
        Message::ReadResult(result) => Some(result.data.to_vec()),
        Message::WriteAck(_) | Message::Triggered(_) => None,
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex, one space between bytes.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| ::hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
