use std::fmt;
use std::io;

use alexlink_packet::PacketError;
use alexlink_relay::RelayError;
use alexlink_transport::TransportError;

// Process exit codes. 64 and 124 follow sysexits and timeout(1); the rest
// group failures by cause (transport, permission, invalid data, health check).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_kind_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::UnexpectedEof => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_kind_code(err.kind()), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::SerialOpen { .. } => match err.io_kind() {
            Some(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
            _ => TRANSPORT_ERROR,
        },
        TransportError::Pem { .. } | TransportError::Tls(_) => DATA_INVALID,
        TransportError::PeerNotAuthorized { .. } => PERMISSION_DENIED,
        TransportError::Bind { .. }
        | TransportError::Connect { .. }
        | TransportError::Accept(_)
        | TransportError::Handshake { .. }
        | TransportError::Io(_) => err.io_kind().map(io_kind_code).unwrap_or(INTERNAL),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    match err {
        PacketError::Io(source) => io_error(context, source),
        PacketError::BadFraming { .. } | PacketError::BadChecksum { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PacketError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    match err {
        RelayError::Transport(err) => transport_error(context, err),
        RelayError::Packet(err) => packet_error(context, err),
        RelayError::Io(source) => io_error(context, source),
        RelayError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        RelayError::Thread(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
