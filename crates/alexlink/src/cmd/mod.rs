use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay between the controller and one TLS peer at a time.
    Serve(ServeArgs),
    /// Send one command frame to a running relay and print the replies.
    Send(SendArgs),
    /// Check serial device and TLS material before serving.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial device settings shared by `serve` and `doctor`.
#[derive(Args, Debug, Clone)]
pub struct SerialArgs {
    /// Serial device the controller is attached to.
    #[arg(long, env = "ALEXLINK_SERIAL", default_value = "/dev/ttyACM0")]
    pub serial: String,
    /// Serial baud rate.
    #[arg(long, env = "ALEXLINK_BAUD", default_value_t = 9600)]
    pub baud: u32,
}

/// Server TLS material shared by `serve` and `doctor`.
#[derive(Args, Debug, Clone)]
pub struct ServerTlsArgs {
    /// Address to listen on.
    #[arg(long, env = "ALEXLINK_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,
    /// Server certificate chain (PEM).
    #[arg(long, env = "ALEXLINK_CERT", default_value = "alex.crt")]
    pub cert: PathBuf,
    /// Server private key (PEM).
    #[arg(long, env = "ALEXLINK_KEY", default_value = "alex.key")]
    pub key: PathBuf,
    /// CA bundle that signed the client certificates (PEM).
    #[arg(long, env = "ALEXLINK_CA", default_value = "signing.pem")]
    pub ca: PathBuf,
    /// Name the client certificate must be valid for.
    #[arg(long, env = "ALEXLINK_CLIENT_NAME", default_value = "laptop.epp.com")]
    pub client_name: String,
    /// Accept any client certificate signed by the CA.
    #[arg(long, env = "ALEXLINK_ANY_CLIENT", conflicts_with = "client_name")]
    pub any_client: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub tls: ServerTlsArgs,
    /// Wait after opening the serial port while the controller reboots (e.g. 2s, 0s).
    #[arg(long, env = "ALEXLINK_SETTLE_DELAY", default_value = "2s")]
    pub settle_delay: String,
    /// How long a colour query waits for the sensor (e.g. 5s, 500ms).
    #[arg(long, env = "ALEXLINK_COLOUR_TIMEOUT", default_value = "5s")]
    pub colour_timeout: String,
    /// Pause between a shutdown request and stopping (e.g. 1s).
    #[arg(long, env = "ALEXLINK_SHUTDOWN_GRACE", default_value = "1s")]
    pub shutdown_grace: String,
    /// Host command run when the peer sends `Q`. Empty disables it.
    #[arg(long, env = "ALEXLINK_SHUTDOWN_COMMAND", default_value = "sudo shutdown +1")]
    pub shutdown_command: String,
    /// Only stop the relay on `Q`; leave the host running.
    #[arg(long, env = "ALEXLINK_NO_HOST_SHUTDOWN", conflicts_with = "shutdown_command")]
    pub no_host_shutdown: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command character (w, x, a, d, s, z, g, c, Q).
    pub command: String,
    /// First parameter (distance or angle).
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    pub param1: i32,
    /// Second parameter (speed).
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    pub param2: i32,
    /// Relay address.
    #[arg(long, env = "ALEXLINK_ADDR", default_value = "127.0.0.1:5000")]
    pub addr: String,
    /// Name the relay's certificate must be valid for. Default: host part of --addr.
    #[arg(long, env = "ALEXLINK_SERVER_NAME")]
    pub server_name: Option<String>,
    /// CA bundle that signed the relay certificate (PEM).
    #[arg(long, env = "ALEXLINK_CA", default_value = "signing.pem")]
    pub ca: PathBuf,
    /// Client certificate chain (PEM).
    #[arg(long, env = "ALEXLINK_CLIENT_CERT", default_value = "laptop.crt")]
    pub cert: PathBuf,
    /// Client private key (PEM).
    #[arg(long, env = "ALEXLINK_CLIENT_KEY", default_value = "laptop.key")]
    pub key: PathBuf,
    /// Connect and reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub tls: ServerTlsArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms`, or a bare number of seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let value = parse_delay(input)?;
    if value.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(value)
}

/// Like [`parse_duration`] but allows zero.
pub fn parse_delay(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn parse_delay_allows_zero() {
        assert_eq!(parse_delay("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_delay("0").unwrap(), Duration::ZERO);
    }
}
