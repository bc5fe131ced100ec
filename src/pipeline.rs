//! Fetch phase: probe each domain, run the logo chain and collect outcomes
//! from a bounded pool of concurrent tasks.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain_utils::extract_hostname;
use crate::hash_store::HashStore;
use crate::http::HttpFetcher;
use crate::logger::{DiagnosticLog, RunLogger};
use crate::logo_chain::{LogoChain, LogoSource, SiteContext};
use crate::probe::probe_site;

/// Result of processing one input domain
#[derive(Debug, Clone)]
pub struct SiteOutcome {
    pub domain: String,
    /// Hash-store key (network location of the probed base URL, else of
    /// the raw domain)
    pub hostname: String,
    pub resolved: Option<LogoSource>,
    pub log: DiagnosticLog,
}

impl SiteOutcome {
    pub fn succeeded(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Aggregate of a completed fetch phase
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub total: usize,
    pub succeeded: usize,
    /// Hostnames for which every strategy failed, sorted and deduplicated
    pub failed: Vec<String>,
    /// Diagnostic lines of all domains, in completion order
    pub log_lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LogoPipeline {
    chain: LogoChain,
}

impl LogoPipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_overrides(config, &[])
    }

    /// Pipeline whose HTTP client resolves the given hosts to fixed addresses
    pub fn with_overrides(config: &AppConfig, overrides: &[(String, SocketAddr)]) -> Result<Self> {
        let fetcher = HttpFetcher::with_overrides(&config.http, overrides).context("Failed to build HTTP client")?;
        Ok(Self {
            chain: LogoChain::new(fetcher, config.services.clone()),
        })
    }

    /// Probe one domain and walk the logo chain for it
    pub async fn process_site(&self, domain: &str, store: &HashStore) -> SiteOutcome {
        let mut log = DiagnosticLog::new();
        log.push(format!("🔎 Fetching {}...", domain));

        let homepage = probe_site(self.chain.fetcher(), domain, &mut log).await;
        let hostname = match &homepage {
            Some(site) => extract_hostname(&site.base_url),
            None => extract_hostname(domain),
        };
        if homepage.is_none() {
            log.push(format!("❌ Failed to connect to {}", hostname));
            log.push("⚠️ Proceeding with fallback methods...");
        }
        debug!(
            "{} -> {} (homepage {})",
            domain,
            hostname,
            homepage.as_ref().map_or("unreachable", |site| site.base_url.as_str())
        );

        let site = SiteContext {
            domain,
            hostname: &hostname,
            homepage: homepage.as_ref(),
        };
        let resolved = self.chain.resolve(&site, store, &mut log).await;
        if resolved.is_none() {
            log.push(format!("❌ All logo strategies failed for {}", hostname));
        }

        SiteOutcome {
            domain: domain.to_string(),
            hostname,
            resolved: resolved.map(|logo| logo.source),
            log,
        }
    }

    /// Process every domain with at most `workers` in flight. Outcomes are
    /// consumed in completion order.
    pub async fn run(&self, domains: &[String], workers: usize, store: &HashStore, logger: &RunLogger) -> FetchReport {
        info!("Fetching logos for {} domains with {} workers", domains.len(), workers);

        let mut outcomes = stream::iter(domains.iter())
            .map(|domain| self.process_site(domain, store))
            .buffer_unordered(workers.max(1));

        let mut report = FetchReport {
            total: domains.len(),
            ..FetchReport::default()
        };
        let mut failed = BTreeSet::new();

        while let Some(outcome) = outcomes.next().await {
            logger.record_site(outcome.succeeded());
            match outcome.resolved {
                Some(source) => {
                    report.succeeded += 1;
                    logger.debug(&format!("{} resolved via {}", outcome.hostname, source));
                }
                None => {
                    logger.warn(&format!("No logo found for {}", outcome.hostname));
                    failed.insert(outcome.hostname);
                }
            }
            report.log_lines.extend(outcome.log.into_lines());
        }

        report.failed = failed.into_iter().collect();
        report
    }
}
