use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Serial line settings for the controller link.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0`.
    pub path: String,
    /// Line speed. The controller firmware runs at 9600 baud.
    pub baud_rate: u32,
    /// Read timeout. Reads that time out surface as `ErrorKind::TimedOut`.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Serial link to the embedded controller (8 data bits, no parity, 1 stop bit).
///
/// The port is closed when the last handle is dropped.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialLink {
    /// Open and configure the serial port.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|source| TransportError::SerialOpen {
                path: config.path.clone(),
                source,
            })?;

        info!(path = %config.path, baud = config.baud_rate, "opened serial link");

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }

    /// Clone the port handle so reads and writes can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|source| TransportError::SerialOpen {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path, "cloned serial handle");
        Ok(Self {
            port,
            path: self.path.clone(),
        })
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_controller_firmware() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.path, "/dev/ttyACM0");
    }

    #[test]
    fn open_missing_device_reports_path() {
        let config = SerialConfig {
            path: "/dev/alexlink-does-not-exist".to_string(),
            ..SerialConfig::default()
        };
        let err = SerialLink::open(&config).unwrap_err();
        match err {
            TransportError::SerialOpen { path, .. } => {
                assert_eq!(path, "/dev/alexlink-does-not-exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
