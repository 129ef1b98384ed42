/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] alexlink_transport::TransportError),

    /// Packet-level error on the serial link.
    #[error("packet error: {0}")]
    Packet(#[from] alexlink_packet::PacketError),

    /// I/O error on a network session.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The network peer closed the session.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A relay thread could not be started or panicked.
    #[error("relay thread failed: {0}")]
    Thread(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
