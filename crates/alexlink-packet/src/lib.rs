//! Fixed-size, checksummed packet codec for the controller protocol.
//!
//! Every packet travels in a 112-byte envelope:
//! - a 4-byte little-endian magic number (0xFCFDFEFF) for stream synchronization
//! - a 4-byte little-endian body size
//! - a 100-byte body: type tag, code, 32 bytes of text, sixteen `i32` params
//! - an XOR checksum over the body, padded to a 4-byte boundary
//!
//! Bad magic and bad checksums are reported once and skipped; the decoder
//! then picks up the next envelope in the stream.

pub mod codec;
pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use codec::{
    decode_packet, encode_packet, xor_checksum, Packet, BODY_SIZE, MAGIC, PACKET_SIZE,
    PARAM_COUNT, TEXT_SIZE,
};
pub use error::{PacketError, Result};
pub use reader::PacketReader;
pub use types::PacketType;
pub use writer::PacketWriter;
