use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use alexlink_relay::{log_event, EventSink, RelayEvent, Reply, StatusReport};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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
struct EventOutput<'a> {
    schema_id: &'a str,
    #[serde(flatten)]
    event: &'a RelayEvent,
    timestamp: String,
}

/// Renders controller events on stdout in the selected format.
///
/// Faults and decode failures are logged as well so they reach stderr even
/// when stdout is redirected.
pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl EventSink for ConsoleSink {
    fn on_event(&mut self, event: &RelayEvent) {
        if is_warning(event) {
            log_event(event);
        }
        print_event(event, self.format);
    }
}

fn is_warning(event: &RelayEvent) -> bool {
    matches!(
        event,
        RelayEvent::ControllerFault { .. }
            | RelayEvent::UnexpectedResponse { .. }
            | RelayEvent::CorruptedColour { .. }
            | RelayEvent::BadFraming { .. }
            | RelayEvent::BadChecksum { .. }
    )
}

pub fn print_event(event: &RelayEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                schema_id: "https://schemas.3leaps.dev/alexlink/cli/v1/relay-event.schema.json",
                event,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => match event {
            RelayEvent::Status(report) => println!("{}", status_table(report)),
            other => println!("{}", describe_event(other)),
        },
        OutputFormat::Pretty => match event {
            RelayEvent::Status(report) => {
                println!("status:");
                for (label, value) in report.rows() {
                    println!("  {label:<26} {value}");
                }
            }
            other => println!("{}", describe_event(other)),
        },
        OutputFormat::Raw => {
            if let RelayEvent::Message { text } = event {
                print_raw(text.as_bytes());
                print_raw(b"\n");
            }
        }
    }
    let _ = std::io::stdout().flush();
}

pub fn status_table(report: &StatusReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["COUNTER", "VALUE"]);
    for (label, value) in report.rows() {
        table.add_row(vec![label.to_string(), value.to_string()]);
    }
    table
}

pub fn describe_event(event: &RelayEvent) -> String {
    match event {
        RelayEvent::ControllerAck => "controller: command ok".to_string(),
        RelayEvent::Status(_) => "controller: status report".to_string(),
        RelayEvent::UnexpectedResponse { code } => {
            format!("controller: unexpected response code {code}")
        }
        RelayEvent::ControllerFault { fault } => fault.description().to_string(),
        RelayEvent::Message { text } => format!("message: {text}"),
        RelayEvent::Colour { colour } => format!("colour: {}", colour.name()),
        RelayEvent::CorruptedColour { code } => format!("colour: corrupted report (code {code})"),
        RelayEvent::Ignored { packet_type } => format!("ignored packet type {packet_type}"),
        RelayEvent::BadFraming { discarded } => {
            format!("serial: bad framing, {discarded} bytes dropped")
        }
        RelayEvent::BadChecksum { expected, actual } => {
            format!("serial: bad checksum (expected {expected:#04x}, got {actual:#04x})")
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    schema_id: &'a str,
    reply: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    colour: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<u8>,
    peer: &'a str,
}

pub fn print_replies(replies: &[Reply], peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for reply in replies {
                let (name, colour, tag) = reply_parts(reply);
                let out = ReplyOutput {
                    schema_id: "https://schemas.3leaps.dev/alexlink/cli/v1/relay-reply.schema.json",
                    reply: name,
                    colour,
                    tag,
                    peer,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REPLY", "DETAIL", "PEER"]);
            for reply in replies {
                let (name, colour, tag) = reply_parts(reply);
                let detail = match (colour, tag) {
                    (Some(colour), _) => colour.to_string(),
                    (None, Some(tag)) => format!("tag {tag}"),
                    (None, None) => String::new(),
                };
                table.add_row(vec![name.to_string(), detail, peer.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for reply in replies {
                match reply {
                    Reply::Ack => println!("ack from {peer}"),
                    Reply::Colour(colour) => println!("colour={} from {peer}", colour.name()),
                    Reply::Other(tag) => println!("unknown reply tag={tag} from {peer}"),
                }
            }
        }
        OutputFormat::Raw => {
            for reply in replies {
                let (name, colour, _) = reply_parts(reply);
                print_raw(colour.unwrap_or(name).as_bytes());
                print_raw(b"\n");
            }
        }
    }
}

fn reply_parts(reply: &Reply) -> (&'static str, Option<&'static str>, Option<u8>) {
    match reply {
        Reply::Ack => ("ack", None, None),
        Reply::Colour(colour) => ("colour", Some(colour.name()), None),
        Reply::Other(tag) => ("other", None, Some(*tag)),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
