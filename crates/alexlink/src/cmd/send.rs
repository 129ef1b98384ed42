use std::io::{Read, Write};

use alexlink_relay::{NetFrameReader, RelayError, Reply, Request};
use alexlink_transport::{connect, TlsClientConfig};
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    io_error, relay_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_replies, OutputFormat};

/// Frames read past the ack before giving up on a misbehaving relay.
const MAX_REPLIES: usize = 8;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let command = parse_command(&args.command)?;
    let timeout = parse_duration(&args.timeout)?;
    let server_name = match &args.server_name {
        Some(name) => name.clone(),
        None => host_of(&args.addr)?.to_string(),
    };

    let client_config = TlsClientConfig {
        ca_path: args.ca.clone(),
        cert_path: args.cert.clone(),
        key_path: args.key.clone(),
        timeout,
    };
    let mut session = connect(&args.addr, &server_name, &client_config)
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = session.peer_addr().to_string();

    let request = Request::new(command, args.param1, args.param2);
    debug!(%peer, command = %char::from(command), "sending request");
    session
        .write_all(&request.encode())
        .and_then(|()| session.flush())
        .map_err(|err| io_error("send failed", err))?;

    let replies = read_replies(&mut session)?;
    session.close();

    print_replies(&replies, &peer, format);
    Ok(SUCCESS)
}

fn parse_command(input: &str) -> CliResult<u8> {
    match input.as_bytes() {
        [byte] if byte.is_ascii_graphic() => Ok(*byte),
        _ => Err(CliError::new(
            USAGE,
            format!("command must be a single character, got '{input}'"),
        )),
    }
}

/// Host part of `host:port`, without IPv6 brackets.
fn host_of(addr: &str) -> CliResult<&str> {
    let host = addr
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(addr)
        .trim_start_matches('[')
        .trim_end_matches(']');
    if host.is_empty() {
        return Err(CliError::new(USAGE, format!("cannot derive server name from '{addr}'")));
    }
    Ok(host)
}

/// Read frames until the relay's ack. Anything before it (a colour reply)
/// is returned too.
fn read_replies<S: Read>(stream: &mut S) -> CliResult<Vec<Reply>> {
    let mut frames = NetFrameReader::new();
    let mut replies = Vec::new();
    while replies.len() < MAX_REPLIES {
        let frame = match frames.read_frame(stream) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(CliError::new(TIMEOUT, "timed out waiting for relay reply")),
            Err(RelayError::Disconnected(reason)) if !replies.is_empty() => {
                debug!(%reason, "relay closed after partial reply");
                return Ok(replies);
            }
            Err(err) => return Err(relay_error("receive failed", err)),
        };
        let reply = Reply::parse(&frame);
        replies.push(reply);
        if reply == Reply::Ack {
            return Ok(replies);
        }
    }
    Ok(replies)
}
