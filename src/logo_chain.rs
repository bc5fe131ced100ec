//! Logo resolution chain
//!
//! Ordered fallback strategies for locating a domain's logo image:
//! 1. Icon `<link>` or logo `<img>` referenced by the homepage
//! 2. Third-party logo API keyed by hostname
//! 3. `/favicon.ico` over HTTPS on the bare host, then `www.`
//! 4. `/favicon.ico` on `www.`, then bare, without certificate checks
//! 5. Third-party favicon API keyed by hostname
//!
//! The first strategy that yields a valid image wins and its hash is
//! registered in the [`HashStore`].

use scraper::{Html, Selector};
use std::fmt;
use tracing::debug;
use url::Url;

use crate::config::ServicesConfig;
use crate::domain_utils::{extract_hostname, strip_www};
use crate::hash_store::{HashStore, PerceptualHash};
use crate::http::{FetchedResponse, HttpFetcher, TlsPolicy, BROWSER_USER_AGENT};
use crate::image_check::validate_image_blocking;
use crate::logger::DiagnosticLog;
use crate::probe::ProbedSite;

/// The strategy that produced a logo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoSource {
    EmbeddedReference,
    LogoApi,
    DirectFavicon,
    FallbackFavicon,
    FaviconApi,
}

impl LogoSource {
    /// Strategies in evaluation order
    pub const CHAIN: [LogoSource; 5] = [
        LogoSource::EmbeddedReference,
        LogoSource::LogoApi,
        LogoSource::DirectFavicon,
        LogoSource::FallbackFavicon,
        LogoSource::FaviconApi,
    ];
}

impl fmt::Display for LogoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoSource::EmbeddedReference => write!(f, "embedded reference"),
            LogoSource::LogoApi => write!(f, "logo API"),
            LogoSource::DirectFavicon => write!(f, "direct favicon"),
            LogoSource::FallbackFavicon => write!(f, "fallback favicon"),
            LogoSource::FaviconApi => write!(f, "favicon API"),
        }
    }
}

/// A logo image that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLogo {
    pub source: LogoSource,
    pub url: String,
    pub hash: PerceptualHash,
}

/// Why a strategy did not produce a logo
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub source: LogoSource,
    pub reason: String,
}

impl StrategyFailure {
    fn new(source: LogoSource, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

pub type StrategyResult = Result<ResolvedLogo, StrategyFailure>;

/// Everything the chain knows about one domain
#[derive(Debug, Clone, Copy)]
pub struct SiteContext<'a> {
    /// Raw input domain
    pub domain: &'a str,
    /// Hash-store key for the domain
    pub hostname: &'a str,
    /// Homepage found by the reachability probe, if any
    pub homepage: Option<&'a ProbedSite>,
}

#[derive(Debug, Clone)]
pub struct LogoChain {
    fetcher: HttpFetcher,
    services: ServicesConfig,
}

impl LogoChain {
    pub fn new(fetcher: HttpFetcher, services: ServicesConfig) -> Self {
        Self { fetcher, services }
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    /// Run the strategies in order, stopping at the first success. On
    /// success the hash is registered under `site.hostname`.
    pub async fn resolve(&self, site: &SiteContext<'_>, store: &HashStore, log: &mut DiagnosticLog) -> Option<ResolvedLogo> {
        for source in LogoSource::CHAIN {
            match self.run_strategy(source, site, log).await {
                Ok(logo) => {
                    store.insert(site.hostname, logo.hash.clone());
                    return Some(logo);
                }
                Err(failure) => {
                    debug!("{} strategy failed for {}: {}", failure.source, site.hostname, failure.reason);
                    log.push(format!("❌ {} failed: {}", failure.source, failure.reason));
                }
            }
        }
        None
    }

    pub async fn run_strategy(&self, source: LogoSource, site: &SiteContext<'_>, log: &mut DiagnosticLog) -> StrategyResult {
        match source {
            LogoSource::EmbeddedReference => self.embedded_reference(site, log).await,
            LogoSource::LogoApi => {
                let url = self.services.logo_api_for(site.hostname);
                self.lookup_service(source, &url, site, log).await
            }
            LogoSource::DirectFavicon => self.direct_favicon(site, log).await,
            LogoSource::FallbackFavicon => self.fallback_favicon(site, log).await,
            LogoSource::FaviconApi => {
                let url = self.services.favicon_api_for(site.hostname);
                self.lookup_service(source, &url, site, log).await
            }
        }
    }

    async fn embedded_reference(&self, site: &SiteContext<'_>, log: &mut DiagnosticLog) -> StrategyResult {
        let source = LogoSource::EmbeddedReference;
        let homepage = site
            .homepage
            .ok_or_else(|| StrategyFailure::new(source, "homepage unavailable"))?;

        let logo_url = find_logo_url(&homepage.response.text(), &homepage.base_url)
            .ok_or_else(|| StrategyFailure::new(source, "no icon link or logo image in homepage"))?;
        log.push(format!("[DEBUG] Found logo reference: {}", logo_url));

        let response = self
            .fetcher
            .get(&logo_url, TlsPolicy::Verify)
            .await
            .map_err(|e| StrategyFailure::new(source, e.to_string()))?;
        if !response.is_ok() {
            return Err(StrategyFailure::new(
                source,
                format!("{} returned status {}", logo_url, response.status),
            ));
        }

        let logo = self.accept_image(source, response, site).await?;
        log.push(format!("✅ Saved logo for {}", site.hostname));
        Ok(logo)
    }

    /// Single-request lookup against a third-party service
    async fn lookup_service(&self, source: LogoSource, url: &str, site: &SiteContext<'_>, log: &mut DiagnosticLog) -> StrategyResult {
        let response = self
            .fetcher
            .get(url, TlsPolicy::Verify)
            .await
            .map_err(|e| StrategyFailure::new(source, e.to_string()))?;
        if !response.is_image() {
            return Err(StrategyFailure::new(
                source,
                format!("{} (status {}, content type '{}')", url, response.status, response.content_type),
            ));
        }

        let logo = self.accept_image(source, response, site).await?;
        log.push(format!("✅ Logo retrieved via {}: {}", source, url));
        Ok(logo)
    }

    async fn direct_favicon(&self, site: &SiteContext<'_>, log: &mut DiagnosticLog) -> StrategyResult {
        let base = strip_www(site.hostname);
        let urls = favicon_urls(base, &["", "www."]);
        self.probe_favicons(LogoSource::DirectFavicon, &urls, TlsPolicy::Verify, None, site, log)
            .await
    }

    async fn fallback_favicon(&self, site: &SiteContext<'_>, log: &mut DiagnosticLog) -> StrategyResult {
        let host = extract_hostname(site.domain).to_lowercase();
        let urls = favicon_urls(strip_www(&host), &["www.", ""]);
        self.probe_favicons(
            LogoSource::FallbackFavicon,
            &urls,
            TlsPolicy::Unverified,
            Some(BROWSER_USER_AGENT),
            site,
            log,
        )
        .await
    }

    /// Try each favicon URL in turn; request failures are logged and the
    /// next URL is tried.
    async fn probe_favicons(
        &self,
        source: LogoSource,
        urls: &[String],
        policy: TlsPolicy,
        user_agent: Option<&str>,
        site: &SiteContext<'_>,
        log: &mut DiagnosticLog,
    ) -> StrategyResult {
        for url in urls {
            log.push(format!("[DEBUG] Trying {}: {}", source, url));

            let response = match self.fetcher.get_with_agent(url, policy, user_agent).await {
                Ok(response) => response,
                Err(e) => {
                    log.push(format!("⚠️ {}", e));
                    continue;
                }
            };

            if !response.is_image() {
                log.push(format!(
                    "[HTTP ERROR] {} (status {}, content type '{}')",
                    url, response.status, response.content_type
                ));
                continue;
            }

            match self.accept_image(source, response, site).await {
                Ok(logo) => {
                    log.push(format!("✅ Saved favicon for {} from {}", site.hostname, url));
                    return Ok(logo);
                }
                Err(failure) => log.push(failure.reason),
            }
        }

        Err(StrategyFailure::new(
            source,
            format!("no favicon at {}", urls.join(", ")),
        ))
    }

    /// Validate a response body as an image and wrap it as a resolved logo
    async fn accept_image(&self, source: LogoSource, response: FetchedResponse, site: &SiteContext<'_>) -> StrategyResult {
        let url = response.url.clone();
        validate_image_blocking(response.body, response.content_type, response.url)
            .await
            .map(|hash| ResolvedLogo { source, url, hash })
            .map_err(|e| StrategyFailure::new(source, format!("{} - {}", site.hostname, e)))
    }
}

/// `https://{prefix}{host}/favicon.ico` for each prefix, in order
pub fn favicon_urls(host: &str, prefixes: &[&str]) -> Vec<String> {
    prefixes
        .iter()
        .map(|prefix| format!("https://{}{}/favicon.ico", prefix, host))
        .collect()
}

/// Find the logo URL a homepage points at.
///
/// The first `<link>` whose `rel` mentions "icon" wins when it has an
/// `href`. Otherwise the first `<img>` (document order) whose `src`, `alt`
/// or `class` mentions "logo" is used. References are resolved against
/// `base_url`.
pub fn find_logo_url(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let link_selector = Selector::parse("link[rel]").ok()?;
    let icon_link = document.select(&link_selector).find(|link| {
        link.value()
            .attr("rel")
            .is_some_and(|rel| rel.to_lowercase().contains("icon"))
    });
    if let Some(href) = icon_link.and_then(|link| non_empty_attr(link.value().attr("href"))) {
        return resolve_reference(base.as_ref(), href);
    }

    let img_selector = Selector::parse("img").ok()?;
    for img in document.select(&img_selector) {
        let element = img.value();
        let mentions_logo = ["src", "alt", "class"].iter().any(|attr| {
            element
                .attr(attr)
                .is_some_and(|value| value.to_lowercase().contains("logo"))
        });
        if !mentions_logo {
            continue;
        }
        if let Some(src) = non_empty_attr(element.attr("src")) {
            return resolve_reference(base.as_ref(), src);
        }
    }

    None
}

fn non_empty_attr(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn resolve_reference(base: Option<&Url>, reference: &str) -> Option<String> {
    match base {
        Some(base) => base.join(reference).ok().map(String::from),
        None => Url::parse(reference).ok().map(String::from),
    }
}
