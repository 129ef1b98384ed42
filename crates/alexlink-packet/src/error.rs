/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// Bytes that do not start a valid envelope (bad magic or size field).
    /// The offending bytes have been discarded.
    #[error("bad packet framing ({discarded} bytes discarded)")]
    BadFraming { discarded: usize },

    /// A complete envelope whose checksum does not match its body.
    /// The whole envelope has been discarded.
    #[error("bad packet checksum (expected {expected:#04x}, got {actual:#04x})")]
    BadChecksum { expected: u8, actual: u8 },

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

impl PacketError {
    /// Whether the stream can keep being decoded after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BadFraming { .. } | Self::BadChecksum { .. })
    }
}

pub type Result<T> = std::result::Result<T, PacketError>;
