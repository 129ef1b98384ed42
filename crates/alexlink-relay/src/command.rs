use alexlink_packet::types::{
    COMMAND_CLEAR_STATS, COMMAND_FORWARD, COMMAND_GET_COLOUR, COMMAND_GET_STATS, COMMAND_REVERSE,
    COMMAND_STOP, COMMAND_TURN_LEFT, COMMAND_TURN_RIGHT,
};
use alexlink_packet::Packet;

/// Canonical action derived from one request character and two params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Forward(i32, i32),
    Reverse(i32, i32),
    TurnLeft(i32, i32),
    TurnRight(i32, i32),
    Stop,
    ClearStats,
    GetStats,
    GetColour,
    /// Stop the relay and schedule a host shutdown. Uppercase `Q` only.
    Shutdown,
    Unknown(u8),
}

/// What the relay should do with a [`HostCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Send this packet to the controller.
    Send(Packet),
    /// Begin the relay shutdown; nothing goes to the controller.
    Shutdown,
    /// Not a known command character; nothing is sent.
    Unknown(u8),
}

impl HostCommand {
    /// Parse a request character. Letters are case-insensitive except `Q`.
    pub fn parse(command: u8, param1: i32, param2: i32) -> Self {
        match command {
            b'w' | b'W' => Self::Forward(param1, param2),
            b'x' | b'X' => Self::Reverse(param1, param2),
            b'a' | b'A' => Self::TurnLeft(param1, param2),
            b'd' | b'D' => Self::TurnRight(param1, param2),
            b's' | b'S' => Self::Stop,
            b'z' | b'Z' => Self::ClearStats,
            b'g' | b'G' => Self::GetStats,
            b'c' | b'C' => Self::GetColour,
            b'Q' => Self::Shutdown,
            other => Self::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Forward(..) => "forward",
            Self::Reverse(..) => "reverse",
            Self::TurnLeft(..) => "turn_left",
            Self::TurnRight(..) => "turn_right",
            Self::Stop => "stop",
            Self::ClearStats => "clear_stats",
            Self::GetStats => "get_stats",
            Self::GetColour => "get_colour",
            Self::Shutdown => "shutdown",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Translate into at most one controller packet. Pure; never blocks.
    pub fn translate(&self) -> Translation {
        match *self {
            Self::Forward(p1, p2) => Translation::Send(Packet::command(COMMAND_FORWARD, &[p1, p2])),
            Self::Reverse(p1, p2) => Translation::Send(Packet::command(COMMAND_REVERSE, &[p1, p2])),
            Self::TurnLeft(p1, p2) => {
                Translation::Send(Packet::command(COMMAND_TURN_LEFT, &[p1, p2]))
            }
            Self::TurnRight(p1, p2) => {
                Translation::Send(Packet::command(COMMAND_TURN_RIGHT, &[p1, p2]))
            }
            Self::Stop => Translation::Send(Packet::command(COMMAND_STOP, &[])),
            Self::ClearStats => Translation::Send(Packet::command(COMMAND_CLEAR_STATS, &[0])),
            Self::GetStats => Translation::Send(Packet::command(COMMAND_GET_STATS, &[])),
            Self::GetColour => Translation::Send(Packet::command(COMMAND_GET_COLOUR, &[])),
            Self::Shutdown => Translation::Shutdown,
            Self::Unknown(ch) => Translation::Unknown(ch),
        }
    }
}

/// Translate a request character and params in one step.
pub fn translate(command: u8, param1: i32, param2: i32) -> Translation {
    HostCommand::parse(command, param1, param2).translate()
}
