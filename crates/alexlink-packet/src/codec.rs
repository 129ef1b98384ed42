use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PacketError, Result};
use crate::types::PacketType;

/// Number of signed 32-bit parameters carried by every packet.
pub const PARAM_COUNT: usize = 16;

/// Size of the NUL-padded text field.
pub const TEXT_SIZE: usize = 32;

/// Packet body: type (1) + code (1) + pad (2) + text (32) + params (64) = 100 bytes.
pub const BODY_SIZE: usize = 4 + TEXT_SIZE + PARAM_COUNT * 4;

/// Envelope magic number, little-endian on the wire.
pub const MAGIC: u32 = 0xFCFD_FEFF;

/// Envelope: magic (4) + size (4) + body (100) + checksum (1) + pad (3) = 112 bytes.
pub const PACKET_SIZE: usize = 8 + BODY_SIZE + 4;

const MAGIC_BYTES: [u8; 4] = MAGIC.to_le_bytes();
const BODY_OFFSET: usize = 8;
const CHECKSUM_OFFSET: usize = BODY_OFFSET + BODY_SIZE;

/// A decoded controller packet.
///
/// `packet_type` decides which of `code`, `params` and `text` carry meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub code: u8,
    pub text: [u8; TEXT_SIZE],
    pub params: [i32; PARAM_COUNT],
}

impl Packet {
    /// Create a packet with zeroed text and params.
    pub fn new(packet_type: PacketType, code: u8) -> Self {
        Self {
            packet_type,
            code,
            text: [0; TEXT_SIZE],
            params: [0; PARAM_COUNT],
        }
    }

    /// Create a `COMMAND` packet; extra params beyond [`PARAM_COUNT`] are dropped.
    pub fn command(code: u8, params: &[i32]) -> Self {
        let mut packet = Self::new(PacketType::Command, code);
        for (slot, value) in packet.params.iter_mut().zip(params) {
            *slot = *value;
        }
        packet
    }

    /// The one-shot liveness probe sent after the controller reboots.
    pub fn hello() -> Self {
        Self::new(PacketType::Hello, 0)
    }

    /// Set the text field, truncating so a terminating NUL always fits.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = [0; TEXT_SIZE];
        let len = text.len().min(TEXT_SIZE - 1);
        self.text[..len].copy_from_slice(&text.as_bytes()[..len]);
        self
    }

    /// Text up to the first NUL, lossily decoded.
    pub fn text(&self) -> String {
        let end = self
            .text
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TEXT_SIZE);
        String::from_utf8_lossy(&self.text[..end]).into_owned()
    }
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────────────────────────────────────┬──────────┬─────────┐
/// │ Magic (4B LE)│ Size      │ Body (100B)                              │ Checksum │ Pad     │
/// │ 0xFCFDFEFF   │ (4B LE)   │ type, code, pad(2), text(32), params(64) │ XOR(body)│ (3B)    │
/// └──────────────┴───────────┴──────────────────────────────────────────┴──────────┴─────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) {
    dst.reserve(PACKET_SIZE);
    dst.put_slice(&MAGIC_BYTES);
    dst.put_u32_le(BODY_SIZE as u32);

    let body_start = dst.len();
    dst.put_u8(packet.packet_type.as_u8());
    dst.put_u8(packet.code);
    dst.put_bytes(0, 2);
    dst.put_slice(&packet.text);
    for param in packet.params {
        dst.put_i32_le(param);
    }
    let checksum = xor_checksum(&dst[body_start..]);

    dst.put_u8(checksum);
    dst.put_bytes(0, 3);
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer. On
/// [`PacketError::BadFraming`] and [`PacketError::BadChecksum`] the offending
/// bytes are consumed too, so decoding can resume with the next call.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    let probe = src.len().min(MAGIC_BYTES.len());
    if src[..probe] != MAGIC_BYTES[..probe] {
        let discarded = resync(src);
        return Err(PacketError::BadFraming { discarded });
    }

    if src.len() < PACKET_SIZE {
        return Ok(None); // Need more data
    }

    let size = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if size != BODY_SIZE {
        let discarded = resync(src);
        return Err(PacketError::BadFraming { discarded });
    }

    let expected = src[CHECKSUM_OFFSET];
    let actual = xor_checksum(&src[BODY_OFFSET..CHECKSUM_OFFSET]);
    if expected != actual {
        src.advance(PACKET_SIZE);
        return Err(PacketError::BadChecksum { expected, actual });
    }

    src.advance(BODY_OFFSET);
    let mut body = src.split_to(BODY_SIZE);
    src.advance(PACKET_SIZE - CHECKSUM_OFFSET);

    let packet_type = PacketType::from_u8(body.get_u8());
    let code = body.get_u8();
    body.advance(2);
    let mut text = [0u8; TEXT_SIZE];
    body.copy_to_slice(&mut text);
    let mut params = [0i32; PARAM_COUNT];
    for param in params.iter_mut() {
        *param = body.get_i32_le();
    }

    Ok(Some(Packet {
        packet_type,
        code,
        text,
        params,
    }))
}

/// XOR of all body bytes.
pub fn xor_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Drop bytes up to the next position that could start an envelope.
///
/// Position 0 is never kept; a trailing partial match of the magic is.
fn resync(src: &mut BytesMut) -> usize {
    let skip = (1..src.len())
        .find(|&i| {
            let n = (src.len() - i).min(MAGIC_BYTES.len());
            src[i..i + n] == MAGIC_BYTES[..n]
        })
        .unwrap_or(src.len());
    src.advance(skip);
    skip
}
