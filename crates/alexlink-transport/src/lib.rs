//! Byte transports for the alexlink relay.
//!
//! Two links meet in the relay:
//! - the serial link to the embedded controller (8N1 over a tty)
//! - mutual-TLS sessions with the remote operator over TCP
//!
//! This is the lowest layer of alexlink. Everything else builds on the
//! [`SerialLink`] and [`SecureSession`] types provided here.

pub mod error;
pub mod serial;
pub mod session;
pub mod tls;

pub use error::{Result, TransportError};
pub use serial::{SerialConfig, SerialLink};
pub use session::SecureSession;
pub use tls::{check_server_material, connect, TlsClientConfig, TlsServer, TlsServerConfig};
