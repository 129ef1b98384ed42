use alexlink_relay::{
    HostShutdown, NoHostShutdown, Relay, RelayConfig, ShellShutdown, ShutdownReason, WorkerConfig,
};
use alexlink_transport::{SerialConfig, SerialLink, TlsServer, TlsServerConfig};
use tracing::info;

use crate::cmd::{parse_delay, parse_duration, SerialArgs, ServeArgs, ServerTlsArgs};
use crate::exit::{relay_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{ConsoleSink, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = relay_config(&args)?;

    let server = TlsServer::bind(&server_tls_config(&args.tls))
        .map_err(|err| transport_error("tls setup failed", err))?;

    let serial_config = serial_config(&args.serial);
    let serial =
        SerialLink::open(&serial_config).map_err(|err| transport_error("serial open failed", err))?;
    let serial_rx = serial
        .try_clone()
        .map_err(|err| transport_error("serial open failed", err))?;

    let host: Box<dyn HostShutdown> = match host_shutdown(&args) {
        Some(shell) => Box::new(shell),
        None => Box::new(NoHostShutdown),
    };

    let mut relay = Relay::start(
        serial_rx,
        serial,
        Box::new(ConsoleSink::new(format)),
        host,
        config,
    )
    .map_err(|err| relay_error("relay start failed", err))?;

    let lifecycle = relay.lifecycle();
    ctrlc::set_handler(move || {
        lifecycle.begin_draining(ShutdownReason::Signal);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    info!(
        addr = %server.local_addr(),
        serial = %serial_config.path,
        "relay ready"
    );
    relay
        .serve(&server)
        .map_err(|err| relay_error("relay failed", err))?;

    Ok(SUCCESS)
}

pub(crate) fn serial_config(args: &SerialArgs) -> SerialConfig {
    SerialConfig {
        path: args.serial.clone(),
        baud_rate: args.baud,
        ..SerialConfig::default()
    }
}

pub(crate) fn server_tls_config(args: &ServerTlsArgs) -> TlsServerConfig {
    TlsServerConfig {
        bind_addr: args.bind.clone(),
        cert_path: args.cert.clone(),
        key_path: args.key.clone(),
        ca_path: args.ca.clone(),
        expected_client_name: (!args.any_client).then(|| args.client_name.clone()),
        ..TlsServerConfig::default()
    }
}

fn host_shutdown(args: &ServeArgs) -> Option<ShellShutdown> {
    let command = args.shutdown_command.trim();
    if args.no_host_shutdown || command.is_empty() {
        return None;
    }
    Some(ShellShutdown::new(command))
}

fn relay_config(args: &ServeArgs) -> CliResult<RelayConfig> {
    Ok(RelayConfig {
        settle_delay: parse_delay(&args.settle_delay)?,
        shutdown_grace: parse_delay(&args.shutdown_grace)?,
        worker: WorkerConfig {
            colour_timeout: parse_duration(&args.colour_timeout)?,
        },
        ..RelayConfig::default()
    })
}
