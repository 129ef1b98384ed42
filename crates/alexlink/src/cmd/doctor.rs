use std::net::ToSocketAddrs;
use std::path::Path;

use alexlink_transport::check_server_material;
use serde::Serialize;

use crate::cmd::serve::server_tls_config;
use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        serial_device_check(&args.serial.serial),
        tls_material_check(&args),
        bind_address_check(&args.tls.bind),
        client_name_check(&args),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.3leaps.dev/alexlink/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("alexlink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<16} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
    }
}

// Presence only: opening the port resets the controller.
fn serial_device_check(path: &str) -> CheckResult {
    let (status, detail) = if Path::new(path).exists() {
        (CheckStatus::Pass, format!("{path} present"))
    } else {
        (CheckStatus::Fail, format!("{path} not found"))
    };
    CheckResult {
        name: "serial_device".to_string(),
        status,
        detail,
    }
}

fn tls_material_check(args: &DoctorArgs) -> CheckResult {
    let config = server_tls_config(&args.tls);
    let (status, detail) = match check_server_material(&config) {
        Ok(()) => (
            CheckStatus::Pass,
            format!(
                "{}, {}, {} loaded",
                config.cert_path.display(),
                config.key_path.display(),
                config.ca_path.display()
            ),
        ),
        Err(err) => (CheckStatus::Fail, err.to_string()),
    };
    CheckResult {
        name: "tls_material".to_string(),
        status,
        detail,
    }
}

fn bind_address_check(bind: &str) -> CheckResult {
    let (status, detail) = match bind.to_socket_addrs() {
        Ok(addrs) if addrs.clone().next().is_some() => (CheckStatus::Pass, format!("{bind} resolves")),
        Ok(_) => (CheckStatus::Fail, format!("{bind} resolves to nothing")),
        Err(err) => (CheckStatus::Fail, format!("{bind}: {err}")),
    };
    CheckResult {
        name: "bind_address".to_string(),
        status,
        detail,
    }
}

fn client_name_check(args: &DoctorArgs) -> CheckResult {
    let (status, detail) = if args.tls.any_client {
        (
            CheckStatus::Warn,
            "any CA-signed client is accepted".to_string(),
        )
    } else {
        (
            CheckStatus::Pass,
            format!("clients must present {}", args.tls.client_name),
        )
    };
    CheckResult {
        name: "client_name".to_string(),
        status,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_serial_device_fails() {
        let check = serial_device_check("/nonexistent/alexlink/ttyACM0");
        assert!(matches!(check.status, CheckStatus::Fail));
    }

    #[test]
    fn bind_address_must_parse() {
        assert!(matches!(
            bind_address_check("127.0.0.1:5000").status,
            CheckStatus::Pass
        ));
        assert!(matches!(
            bind_address_check("not an address").status,
            CheckStatus::Fail
        ));
    }
}
