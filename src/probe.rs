//! Reachability probing: find a scheme/host combination that serves the
//! domain's homepage.

use crate::domain_utils::{normalize_domain, probe_host_variants};
use crate::http::{FetchedResponse, HttpFetcher, TlsPolicy};
use crate::logger::DiagnosticLog;

/// Scheme priority; every host variant is tried under a scheme before the
/// next scheme is considered.
pub const SCHEMES: [&str; 2] = ["https", "http"];

/// A homepage that answered with a non-error status
#[derive(Debug, Clone)]
pub struct ProbedSite {
    /// `scheme://host` that was requested
    pub base_url: String,
    pub response: FetchedResponse,
}

/// Candidate base URLs in probe order
pub fn candidate_urls(domain: &str) -> Vec<String> {
    let domain = normalize_domain(domain);
    let hosts = probe_host_variants(&domain);
    SCHEMES
        .iter()
        .flat_map(|scheme| hosts.iter().map(move |host| format!("{}://{}", scheme, host)))
        .collect()
}

/// Probe `domain` and return the first base URL answering with status < 400.
///
/// Request failures and error statuses are logged and the next candidate is
/// tried. A TLS failure is retried once without certificate verification.
/// Returns `None` when every candidate fails.
pub async fn probe_site(fetcher: &HttpFetcher, domain: &str, log: &mut DiagnosticLog) -> Option<ProbedSite> {
    let normalized = normalize_domain(domain);

    for url in candidate_urls(&normalized) {
        log.push(format!("[DEBUG] Trying {}", url));

        match fetcher.get(&url, TlsPolicy::RetryUnverified).await {
            Err(e) => {
                log.push(format!("⚠️ {}", e));
            }
            Ok(response) if response.status < 400 => {
                return Some(ProbedSite {
                    base_url: url,
                    response,
                });
            }
            Ok(response) => {
                log.push(format!(
                    "[HTTP ERROR] {} - {} (status {})",
                    normalized, url, response.status
                ));
            }
        }
    }

    None
}
