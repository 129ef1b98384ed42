use std::io::Write;
use std::sync::{Mutex, PoisonError};

use alexlink_packet::{Packet, PacketWriter};

use crate::error::Result;

/// Shared, serialized route to the controller.
pub trait PacketSink: Send + Sync {
    fn send_packet(&self, packet: &Packet) -> Result<()>;
}

/// Writes packets to the serial link one at a time.
pub struct SerialSender<W> {
    writer: Mutex<PacketWriter<W>>,
}

impl<W: Write> SerialSender<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Mutex::new(PacketWriter::new(inner)),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_inner()
    }
}

impl<W: Write + Send> PacketSink for SerialSender<W> {
    fn send_packet(&self, packet: &Packet) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_packet(packet)?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for SerialSender<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSender").finish_non_exhaustive()
    }
}
