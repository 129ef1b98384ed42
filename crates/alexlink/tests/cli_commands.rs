#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use alexlink_relay::{ack_frame, colour_frame, Colour, Request, REQUEST_FRAME_SIZE};
use alexlink_transport::{SecureSession, TlsServer, TlsServerConfig};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/alexlink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// CA, relay ("localhost") and laptop certificates written to `dir`.
fn write_pki(dir: &Path) {
    let mut ca_params =
        CertificateParams::new(Vec::<String>::new()).expect("ca params should build");
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "alexlink cli test ca");
    ca_params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let ca_key = KeyPair::generate().expect("ca key should generate");
    let ca = ca_params.self_signed(&ca_key).expect("ca should self-sign");

    let issue = |name: &str, purpose: ExtendedKeyUsagePurpose| {
        let mut params =
            CertificateParams::new(vec![name.to_string()]).expect("params should build");
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![purpose];
        let key = KeyPair::generate().expect("key should generate");
        let cert = params
            .signed_by(&key, &ca, &ca_key)
            .expect("cert should be signed by ca");
        (cert.pem(), key.serialize_pem())
    };

    let (server_cert, server_key) = issue("localhost", ExtendedKeyUsagePurpose::ServerAuth);
    let (client_cert, client_key) = issue("laptop.epp.com", ExtendedKeyUsagePurpose::ClientAuth);

    std::fs::write(dir.join("signing.pem"), ca.pem()).expect("ca should write");
    std::fs::write(dir.join("alex.crt"), server_cert).expect("cert should write");
    std::fs::write(dir.join("alex.key"), server_key).expect("key should write");
    std::fs::write(dir.join("laptop.crt"), client_cert).expect("cert should write");
    std::fs::write(dir.join("laptop.key"), client_key).expect("key should write");
}

fn fake_relay(dir: &Path) -> TlsServer {
    TlsServer::bind(&TlsServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        cert_path: dir.join("alex.crt"),
        key_path: dir.join("alex.key"),
        ca_path: dir.join("signing.pem"),
        ..TlsServerConfig::default()
    })
    .expect("fake relay should bind")
}

fn accept_one(server: &TlsServer) -> SecureSession {
    let start = Instant::now();
    loop {
        if let Some(session) = server.try_accept().expect("accept should succeed") {
            return session;
        }
        assert!(start.elapsed() < Duration::from_secs(10), "no client arrived");
        thread::sleep(Duration::from_millis(10));
    }
}

fn send_command(dir: &Path, addr: &str, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_alexlink"));
    command
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .args(args)
        .arg("--addr")
        .arg(addr)
        .arg("--server-name")
        .arg("localhost")
        .arg("--ca")
        .arg(dir.join("signing.pem"))
        .arg("--cert")
        .arg(dir.join("laptop.crt"))
        .arg("--key")
        .arg(dir.join("laptop.key"));
    command
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("alexlink {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn send_colour_query_prints_colour_then_ack() {
    let dir = unique_temp_dir("send");
    write_pki(&dir);
    let server = fake_relay(&dir);
    let addr = server.local_addr().to_string();

    let relay = thread::spawn(move || {
        let mut session = accept_one(&server);
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        session.read_exact(&mut frame).expect("request should arrive");
        session
            .write_all(&colour_frame(Colour::Green))
            .expect("colour reply");
        session.write_all(&ack_frame()).expect("ack reply");
        session.flush().expect("flush");
        session.close();
        Request::parse(&frame)
    });

    let output = send_command(&dir, &addr, &["c"])
        .output()
        .expect("send should run");
    let request = relay.join().expect("fake relay should finish");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(request, Request::new(b'c', 0, 0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"reply\":\"colour\""));
    assert!(lines[0].contains("\"colour\":\"green\""));
    assert!(lines[1].contains("\"reply\":\"ack\""));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_without_reply_times_out_with_124() {
    let dir = unique_temp_dir("send-timeout");
    write_pki(&dir);
    let server = fake_relay(&dir);
    let addr = server.local_addr().to_string();

    let relay = thread::spawn(move || {
        let mut session = accept_one(&server);
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        let _ = session.read_exact(&mut frame);
        thread::sleep(Duration::from_secs(3));
    });

    let output = send_command(&dir, &addr, &["w", "10", "5"])
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("send should run");
    relay.join().expect("fake relay should finish");

    assert_eq!(output.status.code(), Some(124));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_rejects_multi_character_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("send")
        .arg("go")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn send_with_missing_certificates_returns_60() {
    let dir = unique_temp_dir("send-nocert");
    let output = send_command(&dir, "127.0.0.1:9", &["s"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn serve_with_missing_tls_material_returns_60() {
    let dir = unique_temp_dir("serve-nocert");
    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("serve")
        .arg("--bind")
        .arg("127.0.0.1:0")
        .arg("--cert")
        .arg(dir.join("alex.crt"))
        .arg("--key")
        .arg(dir.join("alex.key"))
        .arg("--ca")
        .arg(dir.join("signing.pem"))
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("tls setup failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn serve_with_missing_serial_device_returns_3() {
    let dir = unique_temp_dir("serve-noserial");
    write_pki(&dir);
    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("serve")
        .arg("--bind")
        .arg("127.0.0.1:0")
        .arg("--cert")
        .arg(dir.join("alex.crt"))
        .arg("--key")
        .arg(dir.join("alex.key"))
        .arg("--ca")
        .arg(dir.join("signing.pem"))
        .arg("--serial")
        .arg(dir.join("ttyACM-missing"))
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("serial open failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn doctor_reports_missing_material() {
    let dir = unique_temp_dir("doctor");
    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .arg("--serial")
        .arg(dir.join("ttyACM-missing"))
        .arg("--cert")
        .arg(dir.join("alex.crt"))
        .output()
        .expect("doctor should run");

    assert_eq!(output.status.code(), Some(30));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("doctor-report.schema.json"));
    assert!(stdout.contains("\"overall\":\"fail\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn doctor_passes_with_valid_material() {
    let dir = unique_temp_dir("doctor-ok");
    write_pki(&dir);
    let serial = dir.join("ttyFAKE");
    std::fs::write(&serial, b"").expect("fake device should write");

    let output = Command::new(env!("CARGO_BIN_EXE_alexlink"))
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .arg("--serial")
        .arg(&serial)
        .arg("--bind")
        .arg("127.0.0.1:5000")
        .arg("--cert")
        .arg(dir.join("alex.crt"))
        .arg("--key")
        .arg(dir.join("alex.key"))
        .arg("--ca")
        .arg(dir.join("signing.pem"))
        .output()
        .expect("doctor should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"overall\":\"pass\""));
    let _ = std::fs::remove_dir_all(&dir);
}
