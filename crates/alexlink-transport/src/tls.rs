use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection, StreamOwned,
};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::session::SecureSession;

/// Server-side TLS settings.
///
/// Clients must present a certificate chaining to `ca_path`; when
/// `expected_client_name` is set, the client's end-entity certificate must
/// also be valid for that name.
#[derive(Debug, Clone)]
pub struct TlsServerConfig {
    /// Address to listen on.
    pub bind_addr: String,
    /// Server certificate chain (PEM).
    pub cert_path: PathBuf,
    /// Server private key (PEM).
    pub key_path: PathBuf,
    /// CA bundle used to verify client certificates (PEM).
    pub ca_path: PathBuf,
    /// Name the client certificate must be valid for.
    pub expected_client_name: Option<String>,
    /// Timeout for each blocking handshake operation.
    pub handshake_timeout: Duration,
}

impl Default for TlsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            cert_path: PathBuf::from("alex.crt"),
            key_path: PathBuf::from("alex.key"),
            ca_path: PathBuf::from("signing.pem"),
            expected_client_name: Some("laptop.epp.com".to_string()),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Client-side TLS settings.
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    /// CA bundle used to verify the server certificate (PEM).
    pub ca_path: PathBuf,
    /// Client certificate chain (PEM).
    pub cert_path: PathBuf,
    /// Client private key (PEM).
    pub key_path: PathBuf,
    /// Read/write timeout applied to the connected socket.
    pub timeout: Duration,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        Self {
            ca_path: PathBuf::from("signing.pem"),
            cert_path: PathBuf::from("laptop.crt"),
            key_path: PathBuf::from("laptop.key"),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Mutual-TLS listener over TCP.
///
/// The listener is non-blocking; [`TlsServer::try_accept`] returns `Ok(None)`
/// when no connection is pending so callers can interleave shutdown checks.
pub struct TlsServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    expected_client_name: ExpectedName,
    handshake_timeout: Duration,
    local_addr: SocketAddr,
}

impl TlsServer {
    /// Load TLS material and bind the listening socket.
    pub fn bind(config: &TlsServerConfig) -> Result<Self> {
        let (server_config, expected_client_name) = server_config(config)?;

        let listener =
            TcpListener::bind(&config.bind_addr).map_err(|source| TransportError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening for tls sessions");

        Ok(Self {
            listener,
            config: Arc::new(server_config),
            expected_client_name,
            handshake_timeout: config.handshake_timeout,
            local_addr,
        })
    }

    /// Accept a pending connection and complete the TLS handshake.
    ///
    /// Returns `Ok(None)` when no connection is pending. Handshake and
    /// authorization failures are returned as errors for that connection only;
    /// the listener stays usable.
    pub fn try_accept(&self) -> Result<Option<SecureSession>> {
        let (tcp, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(err) => return Err(TransportError::Accept(err)),
        };
        debug!(%peer, "accepted tcp connection");
        self.handshake(tcp, peer).map(Some)
    }

    /// Bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn handshake(&self, tcp: TcpStream, peer: SocketAddr) -> Result<SecureSession> {
        let handshake_err = |source| TransportError::Handshake { peer, source };

        tcp.set_nonblocking(false).map_err(handshake_err)?;
        tcp.set_read_timeout(Some(self.handshake_timeout))
            .map_err(handshake_err)?;
        tcp.set_write_timeout(Some(self.handshake_timeout))
            .map_err(handshake_err)?;

        let conn = ServerConnection::new(Arc::clone(&self.config))?;
        let mut stream = StreamOwned::new(conn, tcp);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(handshake_err)?;
        }

        if let Some((name, expected_display)) = &self.expected_client_name {
            if let Err(err) = verify_peer_name(stream.conn.peer_certificates(), name) {
                warn!(%peer, expected = %expected_display, error = %err, "client certificate rejected");
                return Err(TransportError::PeerNotAuthorized {
                    peer,
                    expected: expected_display.clone(),
                });
            }
        }

        stream.sock.set_read_timeout(None).map_err(handshake_err)?;
        stream.sock.set_write_timeout(None).map_err(handshake_err)?;

        info!(%peer, "tls session established");
        Ok(SecureSession::from_server(stream, peer))
    }
}

impl std::fmt::Debug for TlsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsServer")
            .field("local_addr", &self.local_addr)
            .field(
                "expected_client_name",
                &self.expected_client_name.as_ref().map(|(_, name)| name),
            )
            .finish()
    }
}

/// Load and check the server's TLS material without binding.
pub fn check_server_material(config: &TlsServerConfig) -> Result<()> {
    server_config(config).map(|_| ())
}

type ExpectedName = Option<(ServerName<'static>, String)>;

fn server_config(config: &TlsServerConfig) -> Result<(ServerConfig, ExpectedName)> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let roots = load_roots(&config.ca_path)?;
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|err| TransportError::Tls(err.to_string()))?;

    let chain = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;
    let server_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)?;

    let expected_client_name = match &config.expected_client_name {
        Some(name) => {
            let server_name = ServerName::try_from(name.clone()).map_err(|err| {
                TransportError::Tls(format!("invalid expected client name '{name}': {err}"))
            })?;
            Some((server_name, name.clone()))
        }
        None => None,
    };

    Ok((server_config, expected_client_name))
}

/// Connect to a relay as a TLS client, presenting a client certificate.
pub fn connect(addr: &str, server_name: &str, config: &TlsClientConfig) -> Result<SecureSession> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let client_config = client_config(provider, config)?;

    let name = ServerName::try_from(server_name.to_string())
        .map_err(|err| TransportError::Tls(format!("invalid server name '{server_name}': {err}")))?;

    let tcp = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    let peer = tcp.peer_addr()?;
    tcp.set_read_timeout(Some(config.timeout))?;
    tcp.set_write_timeout(Some(config.timeout))?;

    let conn = ClientConnection::new(Arc::new(client_config), name)?;
    let mut stream = StreamOwned::new(conn, tcp);
    while stream.conn.is_handshaking() {
        stream
            .conn
            .complete_io(&mut stream.sock)
            .map_err(|source| TransportError::Handshake { peer, source })?;
    }

    debug!(%peer, "connected tls session");
    Ok(SecureSession::from_client(stream, peer))
}

fn client_config(provider: Arc<CryptoProvider>, config: &TlsClientConfig) -> Result<ClientConfig> {
    let roots = load_roots(&config.ca_path)?;
    let chain = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;
    let client_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)?;
    Ok(client_config)
}

fn verify_peer_name(
    certs: Option<&[CertificateDer<'static>]>,
    expected: &ServerName<'static>,
) -> std::result::Result<(), String> {
    let end_entity = certs
        .and_then(|certs| certs.first())
        .ok_or_else(|| "no client certificate presented".to_string())?;
    let cert = webpki::EndEntityCert::try_from(end_entity).map_err(|err| err.to_string())?;
    cert.verify_is_valid_for_subject_name(expected)
        .map_err(|err| err.to_string())
}

fn load_roots(path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert)?;
    }
    Ok(roots)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|err| pem_error(path, err))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| pem_error(path, err))?;
    if certs.is_empty() {
        return Err(TransportError::Pem {
            path: path.to_path_buf(),
            message: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_file(path).map_err(|err| pem_error(path, err))
}

fn pem_error(path: &Path, err: rustls::pki_types::pem::Error) -> TransportError {
    TransportError::Pem {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::thread;
    use std::time::Instant;

    use rcgen::{
        BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
        KeyUsagePurpose,
    };

    use super::*;

    struct TestPki {
        dir: PathBuf,
    }

    impl TestPki {
        fn generate(tag: &str, client_name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "alexlink-tls-{tag}-{}-{}",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .expect("time should be after epoch")
                    .as_nanos()
            ));
            std::fs::create_dir_all(&dir).expect("temp dir should be creatable");

            let mut ca_params =
                CertificateParams::new(Vec::<String>::new()).expect("ca params should build");
            ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            ca_params
                .distinguished_name
                .push(DnType::CommonName, "alexlink test ca");
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
            let (client_cert, client_key) = issue(client_name, ExtendedKeyUsagePurpose::ClientAuth);

            std::fs::write(dir.join("signing.pem"), ca.pem()).expect("ca should write");
            std::fs::write(dir.join("alex.crt"), server_cert).expect("cert should write");
            std::fs::write(dir.join("alex.key"), server_key).expect("key should write");
            std::fs::write(dir.join("laptop.crt"), client_cert).expect("cert should write");
            std::fs::write(dir.join("laptop.key"), client_key).expect("key should write");

            Self { dir }
        }

        fn server_config(&self) -> TlsServerConfig {
            TlsServerConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                cert_path: self.dir.join("alex.crt"),
                key_path: self.dir.join("alex.key"),
                ca_path: self.dir.join("signing.pem"),
                ..TlsServerConfig::default()
            }
        }

        fn client_config(&self) -> TlsClientConfig {
            TlsClientConfig {
                ca_path: self.dir.join("signing.pem"),
                cert_path: self.dir.join("laptop.crt"),
                key_path: self.dir.join("laptop.key"),
                ..TlsClientConfig::default()
            }
        }
    }

    impl Drop for TestPki {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn accept_within(server: &TlsServer, timeout: Duration) -> Result<SecureSession> {
        let start = Instant::now();
        loop {
            if let Some(session) = server.try_accept()? {
                return Ok(session);
            }
            assert!(start.elapsed() < timeout, "no connection within {timeout:?}");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn mutual_tls_roundtrip() {
        let pki = TestPki::generate("roundtrip", "laptop.epp.com");
        let server = TlsServer::bind(&pki.server_config()).expect("server should bind");
        let addr = server.local_addr().to_string();

        let handle = thread::spawn(move || {
            let mut session =
                accept_within(&server, Duration::from_secs(5)).expect("session should establish");
            let mut buf = [0u8; 5];
            session.read_exact(&mut buf).expect("server should read");
            session.write_all(&buf).expect("server should echo");
            session.flush().expect("server should flush");
            buf
        });

        let mut client =
            connect(&addr, "localhost", &pki.client_config()).expect("client should connect");
        client.write_all(b"hello").expect("client should write");
        client.flush().expect("client should flush");
        let mut echoed = [0u8; 5];
        client.read_exact(&mut echoed).expect("client should read echo");

        assert_eq!(&echoed, b"hello");
        assert_eq!(&handle.join().expect("server thread should finish"), b"hello");
    }

    #[test]
    fn try_accept_without_pending_connection_returns_none() {
        let pki = TestPki::generate("idle", "laptop.epp.com");
        let server = TlsServer::bind(&pki.server_config()).expect("server should bind");
        assert!(server.try_accept().expect("accept should not fail").is_none());
    }

    #[test]
    fn rejects_client_with_unexpected_name() {
        let pki = TestPki::generate("badname", "intruder.epp.com");
        let server = TlsServer::bind(&pki.server_config()).expect("server should bind");
        let addr = server.local_addr().to_string();

        let handle = thread::spawn(move || accept_within(&server, Duration::from_secs(5)));

        let _client = connect(&addr, "localhost", &pki.client_config());
        let result = handle.join().expect("server thread should finish");
        match result {
            Err(TransportError::PeerNotAuthorized { expected, .. }) => {
                assert_eq!(expected, "laptop.epp.com");
            }
            other => panic!("expected PeerNotAuthorized, got {other:?}"),
        }
    }

    #[test]
    fn missing_certificate_file_is_reported() {
        let config = TlsServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ca_path: PathBuf::from("/nonexistent/alexlink/signing.pem"),
            ..TlsServerConfig::default()
        };
        let err = TlsServer::bind(&config).unwrap_err();
        assert!(matches!(err, TransportError::Pem { .. }));
    }

    #[test]
    fn check_server_material_loads_without_binding() {
        let pki = TestPki::generate("check", "laptop.epp.com");
        let config = TlsServerConfig {
            bind_addr: "256.0.0.1:1".to_string(),
            ..pki.server_config()
        };
        check_server_material(&config).expect("material should load");

        let swapped = TlsServerConfig {
            key_path: pki.dir.join("laptop.crt"),
            ..config
        };
        assert!(check_server_material(&swapped).is_err());
    }
}
