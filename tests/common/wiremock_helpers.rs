use std::net::{SocketAddr, TcpListener};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// DNS overrides sending `host` and `www.host` to `addr`
pub fn overrides_for(hosts: &[&str], addr: SocketAddr) -> Vec<(String, SocketAddr)> {
    hosts
        .iter()
        .flat_map(|host| [host.to_string(), format!("www.{}", host)])
        .map(|host| (host, addr))
        .collect()
}

/// Serve `html` at `/` for requests carrying the given Host header
pub async fn mount_homepage(server: &MockServer, host: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("host", host))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serve raw bytes with a content type at `url_path`
pub async fn mount_bytes(server: &MockServer, url_path: &str, content_type: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, content_type),
        )
        .mount(server)
        .await;
}

/// Answer `url_path` with a bare status code
pub async fn mount_status(server: &MockServer, url_path: &str, host: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .and(header("host", host))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// A listener that accepts TCP connections into its backlog but never
/// answers, so every request against it runs into the client timeout.
/// Keep the returned listener alive for the duration of the test.
pub fn silent_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind silent listener");
    let addr = listener.local_addr().expect("listener address");
    (listener, addr)
}
