use url::Url;

/// Normalize a raw input domain for probing: trimmed and lowercased.
/// A full URL is reduced to its network location.
pub fn normalize_domain(domain: &str) -> String {
    let cleaned = domain.trim().to_lowercase();
    if cleaned.contains("://") {
        if let Some(netloc) = network_location(&cleaned) {
            return netloc;
        }
    }
    cleaned
}

/// Extract the hostname (host[:port]) from a domain or URL.
///
/// Bare domains are treated as `https://` URLs before parsing. If the value
/// cannot be parsed the trimmed input is returned unchanged.
pub fn extract_hostname(domain_or_url: &str) -> String {
    let trimmed = domain_or_url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    network_location(&candidate).unwrap_or_else(|| trimmed.to_string())
}

fn network_location(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Strip a single leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Host variants tried by the reachability probe: the domain itself, then
/// the `www.` form unless the domain already carries it.
pub fn probe_host_variants(domain: &str) -> Vec<String> {
    let mut variants = vec![domain.to_string()];
    if !domain.starts_with("www.") {
        variants.push(format!("www.{}", domain));
    }
    variants
}

/// Human-readable domain for a hash-store key. Keys written with `_` in
/// place of dots are restored.
pub fn display_domain(key: &str) -> String {
    key.replace('_', ".")
}
