//! Fixed 128-byte frames exchanged with the network peer.

use std::io::{ErrorKind, Read};

use crate::colour::Colour;
use crate::error::{RelayError, Result};

/// Size of every frame in either direction.
pub const REQUEST_FRAME_SIZE: usize = 128;
/// Tag byte of an acknowledgement frame.
pub const NET_RESP_OK: u8 = 0;
/// Tag byte of a frame that carries a controller result (colour reply).
pub const NET_MESSAGE_PACKET: u8 = 2;

const COMMAND_OFFSET: usize = 1;
const PARAM1_OFFSET: usize = 2;
const PARAM2_OFFSET: usize = 6;

/// One decoded request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub command: u8,
    pub param1: i32,
    pub param2: i32,
}

impl Request {
    pub fn new(command: u8, param1: i32, param2: i32) -> Self {
        Self {
            command,
            param1,
            param2,
        }
    }

    /// Decode a request. Params are read as the single unsigned byte at
    /// their offset, so values above 255 do not survive the trip.
    pub fn parse(frame: &[u8; REQUEST_FRAME_SIZE]) -> Self {
        Self {
            command: frame[COMMAND_OFFSET],
            param1: i32::from(frame[PARAM1_OFFSET]),
            param2: i32::from(frame[PARAM2_OFFSET]),
        }
    }

    /// Encode as the client sends it: full little-endian `i32` params.
    pub fn encode(&self) -> [u8; REQUEST_FRAME_SIZE] {
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        frame[COMMAND_OFFSET] = self.command;
        frame[PARAM1_OFFSET..PARAM1_OFFSET + 4].copy_from_slice(&self.param1.to_le_bytes());
        frame[PARAM2_OFFSET..PARAM2_OFFSET + 4].copy_from_slice(&self.param2.to_le_bytes());
        frame
    }
}

pub fn ack_frame() -> [u8; REQUEST_FRAME_SIZE] {
    let mut frame = [0u8; REQUEST_FRAME_SIZE];
    frame[0] = NET_RESP_OK;
    frame
}

pub fn colour_frame(colour: Colour) -> [u8; REQUEST_FRAME_SIZE] {
    let mut frame = [0u8; REQUEST_FRAME_SIZE];
    frame[0] = NET_MESSAGE_PACKET;
    frame[1] = colour.wire_byte();
    frame
}

/// A frame written back to the network peer, as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Colour(Colour),
    Other(u8),
}

impl Reply {
    pub fn parse(frame: &[u8; REQUEST_FRAME_SIZE]) -> Self {
        match frame[0] {
            NET_RESP_OK => Self::Ack,
            NET_MESSAGE_PACKET => match Colour::from_wire_byte(frame[1]) {
                Some(colour) => Self::Colour(colour),
                None => Self::Other(NET_MESSAGE_PACKET),
            },
            other => Self::Other(other),
        }
    }
}

/// Accumulates one frame across reads that may time out part way through.
#[derive(Debug)]
pub struct NetFrameReader {
    buf: [u8; REQUEST_FRAME_SIZE],
    filled: usize,
}

impl Default for NetFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl NetFrameReader {
    pub fn new() -> Self {
        Self {
            buf: [0u8; REQUEST_FRAME_SIZE],
            filled: 0,
        }
    }

    /// Read until a whole frame is buffered.
    ///
    /// Returns `Ok(None)` when the stream's read timeout fires; bytes read so
    /// far are kept for the next call. End of stream is
    /// `RelayError::Disconnected`.
    pub fn read_frame<R: Read>(
        &mut self,
        stream: &mut R,
    ) -> Result<Option<[u8; REQUEST_FRAME_SIZE]>> {
        while self.filled < REQUEST_FRAME_SIZE {
            match stream.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    return Err(RelayError::Disconnected(format!(
                        "end of stream after {} of {REQUEST_FRAME_SIZE} bytes",
                        self.filled
                    )))
                }
                Ok(n) => self.filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(RelayError::Disconnected(err.to_string()))
                }
                Err(err) => return Err(RelayError::Io(err)),
            }
        }

        self.filled = 0;
        Ok(Some(self.buf))
    }

    /// Bytes of a partial frame held from earlier reads.
    pub fn pending(&self) -> usize {
        self.filled
    }
}
