//! Packet type tags and the code tables carried in a packet's `code` byte.
//!
//! The meaning of `code` depends on the packet type: a command code for
//! `COMMAND`, a response code for `RESPONSE`, an error code for `ERROR`
//! and a colour code for `COLOUR`.

/// Packet type tag (first body byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Command,
    Response,
    Error,
    Message,
    Hello,
    Colour,
    /// A tag this relay does not know. Framed and checksummed, but ignored.
    Unknown(u8),
}

impl PacketType {
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            0 => Self::Command,
            1 => Self::Response,
            2 => Self::Error,
            3 => Self::Message,
            4 => Self::Hello,
            5 => Self::Colour,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Command => 0,
            Self::Response => 1,
            Self::Error => 2,
            Self::Message => 3,
            Self::Hello => 4,
            Self::Colour => 5,
            Self::Unknown(tag) => tag,
        }
    }

    /// Returns a human-readable name for the packet type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Response => "RESPONSE",
            Self::Error => "ERROR",
            Self::Message => "MESSAGE",
            Self::Hello => "HELLO",
            Self::Colour => "COLOUR",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Drive forward; params: distance, speed.
pub const COMMAND_FORWARD: u8 = 0;
/// Drive in reverse; params: distance, speed.
pub const COMMAND_REVERSE: u8 = 1;
/// Turn left; params: angle, speed.
pub const COMMAND_TURN_LEFT: u8 = 2;
/// Turn right; params: angle, speed.
pub const COMMAND_TURN_RIGHT: u8 = 3;
pub const COMMAND_STOP: u8 = 4;
pub const COMMAND_GET_STATS: u8 = 5;
pub const COMMAND_CLEAR_STATS: u8 = 6;
/// Ask the controller to sample its colour sensor.
pub const COMMAND_GET_COLOUR: u8 = 7;

pub const RESP_OK: u8 = 0;
/// Status report; params 0..10 carry the odometry counters.
pub const RESP_STATUS: u8 = 1;

/// Controller saw a bad magic number.
pub const RESP_BAD_PACKET: u8 = 2;
pub const RESP_BAD_CHECKSUM: u8 = 3;
pub const RESP_BAD_COMMAND: u8 = 4;
pub const RESP_BAD_RESPONSE: u8 = 5;

pub const COLOUR_GREEN: u8 = 0;
pub const COLOUR_RED: u8 = 1;
/// The sensor could not decide.
pub const COLOUR_NONE: u8 = 2;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u8) -> &'static str {
    match code {
        COMMAND_FORWARD => "FORWARD",
        COMMAND_REVERSE => "REVERSE",
        COMMAND_TURN_LEFT => "TURN_LEFT",
        COMMAND_TURN_RIGHT => "TURN_RIGHT",
        COMMAND_STOP => "STOP",
        COMMAND_GET_STATS => "GET_STATS",
        COMMAND_CLEAR_STATS => "CLEAR_STATS",
        COMMAND_GET_COLOUR => "GET_COLOUR",
        _ => "UNKNOWN",
    }
}
