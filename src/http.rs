//! Thin HTTP layer: single GET requests with typed failure reasons and an
//! optional one-shot retry without certificate verification.

use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect, Certificate, Client};
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

/// Identification sent by the unverified fallback favicon probe
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// URL after redirects
    pub url: String,
}

impl FetchedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// HTTP 200 with a content type naming an image
    pub fn is_image(&self) -> bool {
        self.is_ok() && self.content_type.to_ascii_lowercase().contains("image")
    }

    /// Body decoded with the charset named in the content type (UTF-8 when
    /// absent or unknown). A byte-order mark overrides the declared charset.
    pub fn text(&self) -> String {
        let encoding = declared_charset(&self.content_type)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let (text, _, _) = encoding.decode(&self.body);
        text.into_owned()
    }
}

fn declared_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then_some(value.trim().trim_matches('"'))
    })
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Timeout for {url}")]
    Timeout { url: String },

    #[error("Connection error for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("SSL error for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Download error for {url}: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    pub fn is_tls(&self) -> bool {
        matches!(self, FetchError::Tls { .. })
    }
}

/// Certificate handling for a single logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify certificates; a TLS failure is final
    Verify,
    /// Verify first; on a TLS failure retry exactly once without verification
    RetryUnverified,
    /// Never verify
    Unverified,
}

impl TlsPolicy {
    fn attempts(self) -> &'static [bool] {
        match self {
            TlsPolicy::Verify => &[true],
            TlsPolicy::RetryUnverified => &[true, false],
            TlsPolicy::Unverified => &[false],
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    verified: Client,
    unverified: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> reqwest::Result<Self> {
        Self::with_overrides(config, &[])
    }

    /// Build a fetcher whose DNS lookups for the given hosts are pinned to
    /// fixed socket addresses (the port is used when the URL has none).
    pub fn with_overrides(config: &HttpConfig, overrides: &[(String, SocketAddr)]) -> reqwest::Result<Self> {
        Self::with_trusted_roots(config, overrides, &[])
    }

    /// Like [`HttpFetcher::with_overrides`], additionally trusting the given
    /// root certificates when verifying.
    pub fn with_trusted_roots(
        config: &HttpConfig,
        overrides: &[(String, SocketAddr)],
        roots: &[Certificate],
    ) -> reqwest::Result<Self> {
        Ok(Self {
            verified: build_client(config, overrides, roots, true)?,
            unverified: build_client(config, overrides, &[], false)?,
        })
    }

    /// GET `url` under the given certificate policy
    pub async fn get(&self, url: &str, policy: TlsPolicy) -> Result<FetchedResponse, FetchError> {
        self.get_with_agent(url, policy, None).await
    }

    /// GET `url` with an explicit User-Agent header
    pub async fn get_with_agent(
        &self,
        url: &str,
        policy: TlsPolicy,
        user_agent: Option<&str>,
    ) -> Result<FetchedResponse, FetchError> {
        let attempts = policy.attempts();
        let mut last_error = None;

        for (index, &verify) in attempts.iter().enumerate() {
            match self.send_once(url, verify, user_agent).await {
                Err(e) if e.is_tls() && index + 1 < attempts.len() => {
                    debug!("TLS failure for {}, retrying without certificate verification: {}", url, e);
                    last_error = Some(e);
                }
                result => return result,
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Request {
            url: url.to_string(),
            message: "no request attempted".to_string(),
        }))
    }

    async fn send_once(
        &self,
        url: &str,
        verify: bool,
        user_agent: Option<&str>,
    ) -> Result<FetchedResponse, FetchError> {
        let client = if verify { &self.verified } else { &self.unverified };
        let mut request = client.get(url);
        if let Some(agent) = user_agent {
            request = request.header(USER_AGENT, agent);
        }

        debug!("GET {} (verify certificates: {})", url, verify);
        let response = request.send().await.map_err(|e| classify_error(url, &e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let final_url = response.url().to_string();
        let body = response.bytes().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: error_chain(&e),
        })?;

        Ok(FetchedResponse {
            status,
            content_type,
            body: body.to_vec(),
            url: final_url,
        })
    }
}

fn build_client(
    config: &HttpConfig,
    overrides: &[(String, SocketAddr)],
    roots: &[Certificate],
    verify: bool,
) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .user_agent(config.user_agent.clone())
        .redirect(redirect::Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(!verify)
        .pool_idle_timeout(Duration::from_secs(30));

    for (host, addr) in overrides {
        builder = builder.resolve(host, *addr);
    }
    for root in roots {
        builder = builder.add_root_certificate(root.clone());
    }

    builder.build()
}

/// Map a reqwest error onto the failure taxonomy. Only certificate
/// validation failures count as TLS errors; other handshake failures (such
/// as a plain-HTTP server on the port) are connection errors.
fn classify_error(url: &str, error: &reqwest::Error) -> FetchError {
    let message = error_chain(error);
    let url = url.to_string();

    if error.is_timeout() {
        FetchError::Timeout { url }
    } else if error.source().map(error_chain).is_some_and(|causes| looks_like_tls(&causes)) {
        FetchError::Tls { url, message }
    } else if error.is_connect() {
        FetchError::Connect { url, message }
    } else {
        FetchError::Request { url, message }
    }
}

/// Flatten an error and its sources into one line
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

fn looks_like_tls(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["certificate", "unknownissuer", "notvalidforname", "self signed", "self-signed"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_policy_attempts() {
        assert_eq!(TlsPolicy::Verify.attempts(), &[true]);
        assert_eq!(TlsPolicy::RetryUnverified.attempts(), &[true, false]);
        assert_eq!(TlsPolicy::Unverified.attempts(), &[false]);
    }

    #[test]
    fn test_looks_like_tls() {
        assert!(looks_like_tls("error sending request: invalid peer certificate: UnknownIssuer"));
        assert!(looks_like_tls("invalid peer certificate: NotValidForName"));
        assert!(looks_like_tls("self-signed certificate in certificate chain"));
        // A plain-HTTP server answering a TLS handshake is not a certificate failure
        assert!(!looks_like_tls("received corrupt message of type InvalidContentType"));
        assert!(!looks_like_tls("tls handshake eof"));
        assert!(!looks_like_tls("tcp connect error: Connection refused (os error 111)"));
        assert!(!looks_like_tls("dns error: failed to lookup address information"));
    }

    #[test]
    fn test_response_predicates() {
        let response = FetchedResponse {
            status: 200,
            content_type: "Image/PNG".to_string(),
            body: vec![],
            url: "https://a.com/logo.png".to_string(),
        };
        assert!(response.is_image());

        let html = FetchedResponse {
            content_type: "text/html".to_string(),
            ..response.clone()
        };
        assert!(html.is_ok());
        assert!(!html.is_image());

        let missing = FetchedResponse { status: 404, ..response };
        assert!(!missing.is_image());
    }

    #[test]
    fn test_text_uses_declared_charset() {
        let latin1 = FetchedResponse {
            status: 200,
            content_type: "text/html; charset=\"windows-1252\"".to_string(),
            body: b"<title>caf\xe9</title>".to_vec(),
            url: "https://a.com/".to_string(),
        };
        assert_eq!(latin1.text(), "<title>café</title>");

        let undeclared = FetchedResponse {
            content_type: "text/html".to_string(),
            body: "<title>café</title>".as_bytes().to_vec(),
            ..latin1.clone()
        };
        assert_eq!(undeclared.text(), "<title>café</title>");

        let unknown = FetchedResponse {
            content_type: "text/html; CHARSET=no-such-charset".to_string(),
            ..undeclared
        };
        assert_eq!(unknown.text(), "<title>café</title>");
        assert_eq!(declared_charset("text/html; Charset=ISO-8859-1"), Some("ISO-8859-1"));
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Tls {
            url: "https://a.com".to_string(),
            message: "bad cert".to_string(),
        };
        assert_eq!(err.to_string(), "SSL error for https://a.com: bad cert");
        assert!(err.is_tls());
    }
}
