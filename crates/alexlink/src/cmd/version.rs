use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

fn build_info() -> Vec<(&'static str, String)> {
    let env_or_unknown = |value: Option<&'static str>| value.unwrap_or("unknown").to_string();
    vec![
        ("name", "alexlink".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        ("build_target", env_or_unknown(option_env!("ALEXLINK_BUILD_TARGET"))),
        ("rustc", env_or_unknown(option_env!("RUSTC_VERSION"))),
        ("git_hash", env_or_unknown(option_env!("GIT_HASH"))),
        ("tls", "rustls (ring), mutual auth".to_string()),
        ("packet_bytes", alexlink_packet::PACKET_SIZE.to_string()),
        ("network_frame_bytes", alexlink_relay::REQUEST_FRAME_SIZE.to_string()),
    ]
}

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("alexlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    for (key, value) in build_info() {
        println!("{key}: {value}");
    }
    Ok(SUCCESS)
}
