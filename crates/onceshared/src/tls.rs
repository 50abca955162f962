//! HTTPS for the API and metrics listeners
//!
//! When `server.tls_cert` and `server.tls_key` are both set, every accepted
//! TCP connection is put through a rustls handshake (TLS 1.2 or 1.3) before
//! axum sees it. Failed or stalled handshakes are dropped without affecting
//! the accept loop for longer than [`HANDSHAKE_TIMEOUT`].

use anyhow::{Context, Result};
use axum::serve::Listener;
use axum::Router;
use rustls::crypto::ring;
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a PEM certificate chain and private key into a rustls server config.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let cert_pem = std::fs::read(cert_path)
        .with_context(|| format!("reading TLS certificate {}", cert_path.display()))?;
    let key_pem = std::fs::read(key_path)
        .with_context(|| format!("reading TLS key {}", key_path.display()))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing certificates in {}", cert_path.display()))?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", cert_path.display());
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .with_context(|| format!("parsing private key in {}", key_path.display()))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", key_path.display()))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .context("selecting TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate or key")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// TCP listener that only yields connections which completed a TLS handshake.
pub struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    pub fn new(tcp: TcpListener, config: Arc<ServerConfig>) -> Self {
        Self {
            tcp,
            acceptor: TlsAcceptor::from(config),
        }
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (stream, addr) = Listener::accept(&mut self.tcp).await;
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, self.acceptor.accept(stream)).await {
                Ok(Ok(tls)) => return (tls, addr),
                Ok(Err(e)) => debug!(%addr, "tls handshake failed: {e}"),
                Err(_) => debug!(%addr, "tls handshake timed out"),
            }
        }
    }

    fn local_addr(&self) -> tokio::io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

/// Serve `app` on `listener` until `cancel` fires, over TLS when configured.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    tls: Option<Arc<ServerConfig>>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    match tls {
        Some(config) => {
            axum::serve(TlsListener::new(listener, config), app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
        }
        None => {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, RootCertStore};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_rustls::TlsConnector;

    struct TestCert {
        _dir: tempfile::TempDir,
        cert_path: std::path::PathBuf,
        key_path: std::path::PathBuf,
        der: rustls::pki_types::CertificateDer<'static>,
    }

    fn self_signed() -> TestCert {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.cert.pem()).unwrap();
        std::fs::write(&key_path, cert.key_pair.serialize_pem()).unwrap();
        TestCert {
            _dir: dir,
            cert_path,
            key_path,
            der: cert.cert.der().clone(),
        }
    }

    /// Everything the peer sends before closing; a missing close_notify is not an error here.
    async fn read_until_closed<S: tokio::io::AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return out,
                Ok(n) => out.extend_from_slice(&buf[..n]),
            }
        }
    }

    #[test]
    fn test_load_tls_config() {
        let cert = self_signed();
        let config = load_tls_config(&cert.cert_path, &cert.key_path).unwrap();
        assert!(config.alpn_protocols.contains(&b"http/1.1".to_vec()));
    }

    #[test]
    fn test_load_tls_config_rejects_bad_files() {
        let cert = self_signed();

        // key and cert swapped
        assert!(load_tls_config(&cert.key_path, &cert.cert_path).is_err());
        assert!(load_tls_config(&cert.cert_path, Path::new("/nonexistent/key.pem")).is_err());

        let empty = cert._dir.path().join("empty.pem");
        std::fs::write(&empty, "").unwrap();
        assert!(load_tls_config(&empty, &cert.key_path).is_err());
    }

    #[tokio::test]
    async fn test_https_round_trip() {
        let cert = self_signed();
        let config = load_tls_config(&cert.cert_path, &cert.key_path).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/healthz", get(|| async { "ok" }));
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, app, Some(config), cancel.clone()));

        let mut roots = RootCertStore::empty();
        roots.add(cert.der.clone()).unwrap();
        let client_config =
            ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_root_certificates(roots)
                .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(client_config));

        let tcp = TcpStream::connect(addr).await.unwrap();
        let domain = ServerName::try_from("localhost").unwrap();
        let mut tls = connector.connect(domain, tcp).await.unwrap();
        tls.write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let response = read_until_closed(&mut tls).await;
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("ok"), "{response}");

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_plain_client_does_not_stall_listener() {
        let cert = self_signed();
        let config = load_tls_config(&cert.cert_path, &cert.key_path).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/healthz", get(|| async { "ok" }));
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, app, Some(config), cancel.clone()));

        let mut plain = TcpStream::connect(addr).await.unwrap();
        plain
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        // The server drops the connection after the failed handshake.
        let buf = read_until_closed(&mut plain).await;
        assert!(!String::from_utf8_lossy(&buf).contains("200"));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
