use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use rustls::{ClientConnection, ServerConnection, StreamOwned};

use crate::error::Result;

/// An authenticated, encrypted session with one network peer.
///
/// The TLS handshake has already completed when a session is handed out.
pub struct SecureSession {
    inner: SessionInner,
    peer_addr: SocketAddr,
}

enum SessionInner {
    Server(StreamOwned<ServerConnection, TcpStream>),
    Client(StreamOwned<ClientConnection, TcpStream>),
}

impl SecureSession {
    pub(crate) fn from_server(
        stream: StreamOwned<ServerConnection, TcpStream>,
        peer_addr: SocketAddr,
    ) -> Self {
        Self {
            inner: SessionInner::Server(stream),
            peer_addr,
        }
    }

    pub(crate) fn from_client(
        stream: StreamOwned<ClientConnection, TcpStream>,
        peer_addr: SocketAddr,
    ) -> Self {
        Self {
            inner: SessionInner::Client(stream),
            peer_addr,
        }
    }

    /// Remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Set read timeout on the underlying socket.
    ///
    /// A timed-out read surfaces as `ErrorKind::WouldBlock` or `ErrorKind::TimedOut`
    /// depending on the platform; no session state is lost.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket().set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket().set_write_timeout(timeout).map_err(Into::into)
    }

    /// Send close_notify and shut the socket down.
    pub fn close(&mut self) {
        match &mut self.inner {
            SessionInner::Server(stream) => {
                stream.conn.send_close_notify();
                let _ = stream.flush();
            }
            SessionInner::Client(stream) => {
                stream.conn.send_close_notify();
                let _ = stream.flush();
            }
        }
        let _ = self.socket().shutdown(Shutdown::Both);
    }

    fn socket(&self) -> &TcpStream {
        match &self.inner {
            SessionInner::Server(stream) => stream.get_ref(),
            SessionInner::Client(stream) => stream.get_ref(),
        }
    }
}

impl Read for SecureSession {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SessionInner::Server(stream) => stream.read(buf),
            SessionInner::Client(stream) => stream.read(buf),
        }
    }
}

impl Write for SecureSession {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SessionInner::Server(stream) => stream.write(buf),
            SessionInner::Client(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SessionInner::Server(stream) => stream.flush(),
            SessionInner::Client(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match &self.inner {
            SessionInner::Server(_) => "server",
            SessionInner::Client(_) => "client",
        };
        f.debug_struct("SecureSession")
            .field("side", &side)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
