use alexlink_packet::types::{
    RESP_BAD_CHECKSUM, RESP_BAD_COMMAND, RESP_BAD_PACKET, RESP_BAD_RESPONSE,
};
use alexlink_packet::PARAM_COUNT;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::colour::Colour;

/// What the serial path observed, one per decoded packet or decode failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    /// The controller acknowledged a command.
    ControllerAck,
    /// Odometry counters in reply to a stats request.
    Status(StatusReport),
    /// A response code this relay does not know.
    UnexpectedResponse { code: u8 },
    /// The controller reported a protocol error.
    ControllerFault { fault: ControllerFault },
    /// Free text from the controller.
    Message { text: String },
    /// A colour-sensor result; also published to the colour slot.
    Colour { colour: Colour },
    /// A colour report with an invalid code. The colour slot is untouched.
    CorruptedColour { code: u8 },
    /// A packet type with no handler (echoed commands, unknown tags).
    Ignored { packet_type: u8 },
    /// Bytes that did not frame as a packet were dropped.
    BadFraming { discarded: usize },
    /// A packet failed its checksum and was dropped.
    BadChecksum { expected: u8, actual: u8 },
}

/// Odometry counters carried by a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub left_forward_ticks: i32,
    pub right_forward_ticks: i32,
    pub left_reverse_ticks: i32,
    pub right_reverse_ticks: i32,
    pub left_forward_turn_ticks: i32,
    pub right_forward_turn_ticks: i32,
    pub left_reverse_turn_ticks: i32,
    pub right_reverse_turn_ticks: i32,
    pub forward_distance: i32,
    pub reverse_distance: i32,
}

impl StatusReport {
    pub fn from_params(params: &[i32; PARAM_COUNT]) -> Self {
        Self {
            left_forward_ticks: params[0],
            right_forward_ticks: params[1],
            left_reverse_ticks: params[2],
            right_reverse_ticks: params[3],
            left_forward_turn_ticks: params[4],
            right_forward_turn_ticks: params[5],
            left_reverse_turn_ticks: params[6],
            right_reverse_turn_ticks: params[7],
            forward_distance: params[8],
            reverse_distance: params[9],
        }
    }

    /// Labelled counters in wire order, for rendering.
    pub fn rows(&self) -> [(&'static str, i32); 10] {
        [
            ("Left Forward Ticks", self.left_forward_ticks),
            ("Right Forward Ticks", self.right_forward_ticks),
            ("Left Reverse Ticks", self.left_reverse_ticks),
            ("Right Reverse Ticks", self.right_reverse_ticks),
            ("Left Forward Ticks Turns", self.left_forward_turn_ticks),
            ("Right Forward Ticks Turns", self.right_forward_turn_ticks),
            ("Left Reverse Ticks Turns", self.left_reverse_turn_ticks),
            ("Right Reverse Ticks Turns", self.right_reverse_turn_ticks),
            ("Forward Distance", self.forward_distance),
            ("Reverse Distance", self.reverse_distance),
        ]
    }
}

/// Error codes the controller sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerFault {
    BadMagic,
    BadChecksum,
    BadCommand,
    UnexpectedResponse,
    Other(u8),
}

impl ControllerFault {
    pub fn from_code(code: u8) -> Self {
        match code {
            RESP_BAD_PACKET => Self::BadMagic,
            RESP_BAD_CHECKSUM => Self::BadChecksum,
            RESP_BAD_COMMAND => Self::BadCommand,
            RESP_BAD_RESPONSE => Self::UnexpectedResponse,
            other => Self::Other(other),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BadMagic => "controller received bad magic number",
            Self::BadChecksum => "controller received bad checksum",
            Self::BadCommand => "controller received bad command",
            Self::UnexpectedResponse => "controller received unexpected response",
            Self::Other(_) => "controller reports an unknown error",
        }
    }
}

/// Receives every event produced on the serial path.
pub trait EventSink: Send {
    fn on_event(&mut self, event: &RelayEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&RelayEvent) + Send,
{
    fn on_event(&mut self, event: &RelayEvent) {
        self(event)
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&mut self, event: &RelayEvent) {
        log_event(event);
    }
}

/// Structured log line for an event.
pub fn log_event(event: &RelayEvent) {
    match event {
        RelayEvent::ControllerAck => info!("controller acknowledged command"),
        RelayEvent::Status(report) => info!(
            left_forward_ticks = report.left_forward_ticks,
            right_forward_ticks = report.right_forward_ticks,
            left_reverse_ticks = report.left_reverse_ticks,
            right_reverse_ticks = report.right_reverse_ticks,
            left_forward_turn_ticks = report.left_forward_turn_ticks,
            right_forward_turn_ticks = report.right_forward_turn_ticks,
            left_reverse_turn_ticks = report.left_reverse_turn_ticks,
            right_reverse_turn_ticks = report.right_reverse_turn_ticks,
            forward_distance = report.forward_distance,
            reverse_distance = report.reverse_distance,
            "controller status report"
        ),
        RelayEvent::UnexpectedResponse { code } => {
            warn!(code, "controller sent an unexpected response")
        }
        RelayEvent::ControllerFault { fault } => {
            warn!(fault = ?fault, "{}", fault.description())
        }
        RelayEvent::Message { text } => info!(%text, "message from controller"),
        RelayEvent::Colour { colour } => info!(colour = colour.name(), "colour detected"),
        RelayEvent::CorruptedColour { code } => warn!(code, "corrupted colour report"),
        RelayEvent::Ignored { packet_type } => debug!(packet_type, "packet ignored"),
        RelayEvent::BadFraming { discarded } => {
            warn!(discarded, "bad packet framing from controller")
        }
        RelayEvent::BadChecksum { expected, actual } => {
            warn!(expected, actual, "bad packet checksum from controller")
        }
    }
}
