use std::net::SocketAddr;
use std::path::PathBuf;

/// Errors that can occur in serial and session transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open or configure the serial port.
    #[error("failed to open serial port {path}: {source}")]
    SerialOpen {
        path: String,
        source: serialport::Error,
    },

    /// Failed to load PEM material from disk.
    #[error("failed to load {path}: {message}")]
    Pem { path: PathBuf, message: String },

    /// The TLS configuration was rejected.
    #[error("tls configuration error: {0}")]
    Tls(String),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The TLS handshake with a peer failed.
    #[error("tls handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        source: std::io::Error,
    },

    /// The peer certificate did not carry the expected name.
    #[error("peer {peer} is not authorized as {expected}")]
    PeerNotAuthorized { peer: SocketAddr, expected: String },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Underlying I/O error kind, when the failure came from the OS.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::SerialOpen { source, .. } => match source.kind() {
                serialport::ErrorKind::Io(kind) => Some(kind),
                _ => None,
            },
            Self::Bind { source, .. }
            | Self::Connect { source, .. }
            | Self::Handshake { source, .. }
            | Self::Accept(source)
            | Self::Io(source) => Some(source.kind()),
            Self::Pem { .. } | Self::Tls(_) | Self::PeerNotAuthorized { .. } => None,
        }
    }
}

impl From<rustls::Error> for TransportError {
    fn from(err: rustls::Error) -> Self {
        TransportError::Tls(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn io_kind_follows_source() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:5000".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));

        let err = TransportError::SerialOpen {
            path: "/dev/ttyACM0".to_string(),
            source: serialport::Error::new(
                serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
                "denied",
            ),
        };
        assert_eq!(err.io_kind(), Some(io::ErrorKind::PermissionDenied));

        let err = TransportError::Tls("bad key".to_string());
        assert_eq!(err.io_kind(), None);
    }
}
