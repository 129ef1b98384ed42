use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::colour::ColourSlot;
use crate::command::{HostCommand, Translation};
use crate::error::{RelayError, Result};
use crate::lifecycle::{RelayLifecycle, ShutdownReason};
use crate::net::{ack_frame, colour_frame, NetFrameReader, Request};
use crate::sink::PacketSink;

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a colour query waits for the controller's report.
    pub colour_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            colour_timeout: Duration::from_secs(5),
        }
    }
}

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    /// The relay began draining.
    Draining,
}

/// Services one network peer at a time.
pub struct NetworkWorker {
    sink: Arc<dyn PacketSink>,
    slot: Arc<ColourSlot>,
    lifecycle: Arc<RelayLifecycle>,
    config: WorkerConfig,
}

impl NetworkWorker {
    pub fn new(
        sink: Arc<dyn PacketSink>,
        slot: Arc<ColourSlot>,
        lifecycle: Arc<RelayLifecycle>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            sink,
            slot,
            lifecycle,
            config,
        }
    }

    /// Read and answer request frames until the peer leaves or the relay
    /// drains. The stream's read timeout sets how often the lifecycle is
    /// checked.
    ///
    /// I/O errors end this connection only and are returned to the caller.
    pub fn serve<S: Read + Write>(&self, stream: &mut S, peer: &str) -> Result<SessionEnd> {
        let mut frames = NetFrameReader::new();
        loop {
            if !self.lifecycle.is_running() {
                return Ok(SessionEnd::Draining);
            }

            let frame = match frames.read_frame(stream) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(RelayError::Disconnected(reason)) => {
                    info!(%peer, %reason, "peer closed connection");
                    return Ok(SessionEnd::PeerClosed);
                }
                Err(err) => return Err(err),
            };

            if !self.lifecycle.is_running() {
                debug!(%peer, "request dropped while draining");
                return Ok(SessionEnd::Draining);
            }

            self.handle_request(stream, Request::parse(&frame), peer)?;
        }
    }

    /// Translate one request, forward it, and answer the peer.
    pub fn handle_request<S: Write>(
        &self,
        stream: &mut S,
        request: Request,
        peer: &str,
    ) -> Result<()> {
        let command = HostCommand::parse(request.command, request.param1, request.param2);
        debug!(
            %peer,
            command = command.name(),
            param1 = request.param1,
            param2 = request.param2,
            "request received"
        );

        match command.translate() {
            Translation::Send(packet) if command == HostCommand::GetColour => {
                self.slot.arm();
                if self.forward(&packet) {
                    match self.slot.wait_take(self.config.colour_timeout) {
                        Some(colour) => {
                            debug!(%peer, colour = colour.name(), "colour reply");
                            write_frame(stream, &colour_frame(colour))?;
                        }
                        None => warn!(
                            %peer,
                            timeout_ms = self.config.colour_timeout.as_millis() as u64,
                            "no colour report from controller"
                        ),
                    }
                }
            }
            Translation::Send(packet) => {
                self.forward(&packet);
            }
            Translation::Shutdown => {
                info!(%peer, "shutdown requested by peer");
                self.lifecycle.begin_draining(ShutdownReason::HostCommand);
            }
            Translation::Unknown(ch) => {
                warn!(%peer, command = %char::from(ch).escape_default(), "unknown command");
            }
        }

        write_frame(stream, &ack_frame())
    }

    fn forward(&self, packet: &alexlink_packet::Packet) -> bool {
        match self.sink.send_packet(packet) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, code = packet.code, "could not send command to controller");
                false
            }
        }
    }
}

impl std::fmt::Debug for NetworkWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkWorker")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

fn write_frame<S: Write>(stream: &mut S, frame: &[u8]) -> Result<()> {
    stream.write_all(frame)?;
    stream.flush()?;
    Ok(())
}
