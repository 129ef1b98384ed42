use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_packet, Packet, PACKET_SIZE};
use crate::error::{PacketError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * PACKET_SIZE;
const READ_CHUNK_SIZE: usize = PACKET_SIZE;

/// Reads complete packets from any `Read` stream.
///
/// Handles partial reads internally; buffered bytes survive errors, so a
/// read timeout in the middle of a packet loses nothing.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Err(PacketError::ConnectionClosed)` when EOF is reached.
    /// Framing and checksum errors are returned once per bad region; calling
    /// again continues with the bytes that follow it.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = decode_packet(&mut self.buf)? {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(PacketError::Io(err)),
            };

            if read == 0 {
                return Err(PacketError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
