use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alexlink_packet::Packet;
use alexlink_transport::{SecureSession, TlsServer};
use tracing::{error, info, warn};

use crate::colour::ColourSlot;
use crate::dispatch::Dispatcher;
use crate::error::{RelayError, Result};
use crate::event::EventSink;
use crate::lifecycle::{HostShutdown, RelayLifecycle, RelayState, ShutdownReason};
use crate::reader::SerialReader;
use crate::sink::{PacketSink, SerialSender};
use crate::worker::{NetworkWorker, SessionEnd, WorkerConfig};

/// Relay timing.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Wait after opening the serial link while the controller reboots.
    pub settle_delay: Duration,
    /// How often an idle session re-checks the lifecycle.
    pub session_read_timeout: Duration,
    /// Pause between `Draining` and `Stopped`.
    pub shutdown_grace: Duration,
    /// Sleep between polls of an idle listener.
    pub accept_poll_interval: Duration,
    pub worker: WorkerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            session_read_timeout: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(1),
            accept_poll_interval: Duration::from_millis(50),
            worker: WorkerConfig::default(),
        }
    }
}

/// A connected network peer the worker can talk to.
pub trait Session: Read + Write + Send {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;
    /// Printable peer identity for logs.
    fn peer(&self) -> String;
    fn close(&mut self);
}

impl Session for SecureSession {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        SecureSession::set_read_timeout(self, timeout)?;
        Ok(())
    }

    fn peer(&self) -> String {
        self.peer_addr().to_string()
    }

    fn close(&mut self) {
        SecureSession::close(self);
    }
}

#[cfg(unix)]
impl Session for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)?;
        Ok(())
    }

    fn peer(&self) -> String {
        "unix".to_string()
    }

    fn close(&mut self) {
        let _ = self.shutdown(std::net::Shutdown::Both);
    }
}

/// Where sessions come from. `Ok(None)` means nothing is pending right now.
pub trait SessionSource {
    type Session: Session;

    fn poll_session(&self) -> Result<Option<Self::Session>>;
}

impl SessionSource for TlsServer {
    type Session = SecureSession;

    fn poll_session(&self) -> Result<Option<SecureSession>> {
        Ok(self.try_accept()?)
    }
}

/// The running relay: serial reader thread, shared serial writer, colour
/// slot, and lifecycle.
pub struct Relay {
    sink: Arc<dyn PacketSink>,
    slot: Arc<ColourSlot>,
    lifecycle: Arc<RelayLifecycle>,
    config: RelayConfig,
    reader: Option<JoinHandle<()>>,
}

impl Relay {
    /// Wait for the controller to settle, start the serial reader, and send
    /// the hello packet.
    pub fn start<R, W>(
        serial_rx: R,
        serial_tx: W,
        events: Box<dyn EventSink>,
        host: Box<dyn HostShutdown>,
        config: RelayConfig,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let lifecycle = Arc::new(RelayLifecycle::new(host));
        let slot = Arc::new(ColourSlot::new());
        let sink: Arc<dyn PacketSink> = Arc::new(SerialSender::new(serial_tx));

        if !config.settle_delay.is_zero() {
            info!(
                settle_ms = config.settle_delay.as_millis() as u64,
                "waiting for controller to settle"
            );
            thread::sleep(config.settle_delay);
        }

        let reader = SerialReader::new(
            serial_rx,
            Dispatcher::new(Arc::clone(&slot)),
            events,
            Arc::clone(&lifecycle),
        )
        .spawn()?;

        let mut relay = Self {
            sink,
            slot,
            lifecycle,
            config,
            reader: Some(reader),
        };

        if let Err(err) = relay.sink.send_packet(&Packet::hello()) {
            error!(error = %err, "could not send hello to controller");
            relay.shutdown();
            return Err(err);
        }
        info!("hello sent to controller");
        Ok(relay)
    }

    /// Serve connections one at a time until the relay drains, then wait the
    /// grace period and stop.
    pub fn serve<S: SessionSource>(&mut self, source: &S) -> Result<()> {
        let worker = NetworkWorker::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.slot),
            Arc::clone(&self.lifecycle),
            self.config.worker.clone(),
        );

        info!("relay accepting connections");
        let outcome = self.accept_loop(source, &worker);

        if self.lifecycle.state() == RelayState::Draining && !self.config.shutdown_grace.is_zero() {
            thread::sleep(self.config.shutdown_grace);
        }
        self.shutdown();
        outcome
    }

    fn accept_loop<S: SessionSource>(&self, source: &S, worker: &NetworkWorker) -> Result<()> {
        while self.lifecycle.is_running() {
            match source.poll_session() {
                Ok(Some(session)) => self.run_session(worker, session)?,
                Ok(None) => thread::sleep(self.config.accept_poll_interval),
                Err(err) => {
                    warn!(error = %err, "connection rejected");
                    thread::sleep(self.config.accept_poll_interval);
                }
            }
        }
        Ok(())
    }

    /// Run one connection on its own `network-worker` thread and wait for it.
    fn run_session<T: Session>(&self, worker: &NetworkWorker, mut session: T) -> Result<()> {
        let read_timeout = self.config.session_read_timeout;
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("network-worker".to_string())
                .spawn_scoped(scope, move || {
                    let peer = session.peer();
                    info!(%peer, "peer connected");
                    if let Err(err) = session.set_read_timeout(Some(read_timeout)) {
                        warn!(%peer, error = %err, "could not set session read timeout");
                    }
                    match worker.serve(&mut session, &peer) {
                        Ok(SessionEnd::PeerClosed) => {}
                        Ok(SessionEnd::Draining) => info!(%peer, "closing session, relay draining"),
                        Err(err) => warn!(%peer, error = %err, "session ended"),
                    }
                    session.close();
                })
                .map_err(|err| RelayError::Thread(format!("network worker: {err}")))?;

            if handle.join().is_err() {
                error!("network worker panicked");
            }
            Ok(())
        })
    }

    /// Stop the relay and wait for the serial reader to exit.
    pub fn shutdown(&mut self) {
        self.lifecycle.begin_draining(ShutdownReason::Signal);
        if self.lifecycle.state() != RelayState::Stopped {
            self.lifecycle.finish();
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                error!("serial reader panicked");
            }
        }
    }

    /// Shared lifecycle, e.g. for a signal handler.
    pub fn lifecycle(&self) -> Arc<RelayLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    pub fn colour_slot(&self) -> Arc<ColourSlot> {
        Arc::clone(&self.slot)
    }

    /// Send a packet through the shared serial writer.
    pub fn send_packet(&self, packet: &Packet) -> Result<()> {
        self.sink.send_packet(packet)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("lifecycle", &self.lifecycle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
