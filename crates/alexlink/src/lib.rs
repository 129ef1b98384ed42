//! Serial-to-TLS relay for a small tracked robot.
//!
//! alexlink sits on the robot's host computer between a remote operator,
//! connected over mutual TLS, and the motor controller on a serial port.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial link and TLS sessions
//! - [`packet`]: checksummed controller packets
//! - [`relay`]: command translation, dispatch, colour rendezvous, lifecycle

/// Re-export transport types.
pub mod transport {
    pub use alexlink_transport::*;
}

/// Re-export packet types.
pub mod packet {
    pub use alexlink_packet::*;
}

/// Re-export relay types.
pub mod relay {
    pub use alexlink_relay::*;
}
