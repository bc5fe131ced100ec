//! Minimal HTTPS server for `secure.test` and `www.secure.test`.
//!
//! Its leaf certificate is signed by a private CA (see
//! `tests/fixtures/tls/regenerate.sh`), so a verifying client rejects it
//! unless [`test_ca`] is added as a trusted root.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

pub const SECURE_HOST: &str = "secure.test";

const CA_DER: &[u8] = include_bytes!("../fixtures/tls/ca.der");
const SERVER_DER: &[u8] = include_bytes!("../fixtures/tls/server.der");
const SERVER_KEY_DER: &[u8] = include_bytes!("../fixtures/tls/server.key.der");

/// Root certificate that signed the server's leaf
pub fn test_ca() -> reqwest::Certificate {
    reqwest::Certificate::from_der(CA_DER).expect("parse test CA")
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub host: String,
    pub path: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

type Routes = Arc<Mutex<HashMap<(String, String), Route>>>;
type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct TlsServer {
    addr: SocketAddr,
    routes: Routes,
    requests: Requests,
    task: JoinHandle<()>,
}

impl TlsServer {
    pub async fn start() -> Self {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(
                vec![CertificateDer::from(SERVER_DER.to_vec())],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(SERVER_KEY_DER.to_vec())),
            )
            .expect("server certificate");
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind tls listener");
        let addr = listener.local_addr().expect("listener address");
        let routes: Routes = Arc::default();
        let requests: Requests = Arc::default();

        let task = {
            let routes = routes.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    let routes = routes.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        // Clients that reject the certificate abort the handshake
                        if let Ok(mut tls) = acceptor.accept(stream).await {
                            let _ = serve(&mut tls, &routes, &requests).await;
                        }
                    });
                }
            })
        };

        Self {
            addr,
            routes,
            requests,
            task,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Answer `GET path` for `host` with 200 and the given body
    pub fn mount_bytes(&self, host: &str, path: &str, content_type: &str, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(
            (host.to_string(), path.to_string()),
            Route {
                status: 200,
                content_type: content_type.to_string(),
                body,
            },
        );
    }

    /// Requests that completed a handshake, in arrival order
    pub fn received(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<S>(stream: &mut S, routes: &Routes, requests: &Requests) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let mut host = String::new();
    let mut user_agent = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "host" => host = value.trim().split(':').next().unwrap_or_default().to_string(),
                "user-agent" => user_agent = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let route = routes.lock().unwrap().get(&(host.clone(), path.clone())).cloned();
    requests.lock().unwrap().push(RecordedRequest { host, path, user_agent });

    let route = route.unwrap_or(Route {
        status: 404,
        content_type: "text/plain".to_string(),
        body: b"not found".to_vec(),
    });
    let reason = if route.status == 200 { "OK" } else { "Not Found" };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.content_type,
        route.body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&route.body).await?;
    stream.shutdown().await
}
