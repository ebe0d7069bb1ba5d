use super::{CollectOutcome, EvidenceCollector};
use crate::config::FingerprintConfig;
use crate::errors::{FingerprintError, ProbeFailure};
use crate::model::{CollectorKind, EvidenceFragment, HostDescriptor, HttpSample};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Requests a few pages from plausible web ports and scans them for indicators.
///
/// Stops as soon as enough distinct indicators have been seen.
pub struct HttpCollector {
    client: Client,
    ports: Vec<u16>,
    paths: Vec<String>,
    max_requests: usize,
    body_limit: usize,
    sufficient: usize,
    indicators: Vec<Regex>,
    title: Regex,
}

impl HttpCollector {
    pub fn new(config: &FingerprintConfig, indicators: Vec<Regex>) -> Result<Self, FingerprintError> {
        // Appliances mostly serve self-signed certificates
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::limited(3))
            .no_proxy()
            .user_agent(concat!("netprint/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let title = Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
            .map_err(|e| FingerprintError::Other(e.to_string()))?;

        let paths = if config.http_paths.is_empty() {
            vec!["/".to_string()]
        } else {
            config.http_paths.clone()
        };

        Ok(Self {
            client,
            ports: config.http_ports.clone(),
            paths,
            max_requests: config.http_max_requests.max(1),
            body_limit: config.http_body_limit,
            sufficient: config.http_sufficient_indicators.max(1),
            indicators,
            title,
        })
    }

    /// (port, path) pairs to request, capped at the per-host request budget.
    pub fn targets(&self, host: &HostDescriptor) -> Vec<(u16, String)> {
        host.known_open_ports
            .iter()
            .filter(|p| self.ports.contains(*p))
            .flat_map(|&port| self.paths.iter().map(move |path| (port, path.clone())))
            .take(self.max_requests)
            .collect()
    }

    async fn fetch(
        &self,
        ip: IpAddr,
        port: u16,
        path: &str,
        deadline: Instant,
    ) -> (u16, Result<HttpSample, ProbeFailure>) {
        let scheme = if matches!(port, 443 | 8443) { "https" } else { "http" };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let url = format!("{}://{}{}", scheme, SocketAddr::new(ip, port), path);
        let remaining = deadline.saturating_duration_since(Instant::now());

        (port, self.sample(&url, remaining).await)
    }

    async fn sample(&self, url: &str, limit: Duration) -> Result<HttpSample, ProbeFailure> {
        let mut response = self
            .client
            .get(url)
            .timeout(limit)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let server = response
            .headers()
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            body.extend_from_slice(&chunk);
            if body.len() >= self.body_limit {
                body.truncate(self.body_limit);
                break;
            }
        }
        let text = String::from_utf8_lossy(&body);

        Ok(HttpSample {
            status,
            server,
            title: self.extract_title(&text),
            indicators: self.scan_indicators(&text),
        })
    }

    fn extract_title(&self, html: &str) -> Option<String> {
        self.title
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
    }

    fn scan_indicators(&self, body: &str) -> BTreeSet<String> {
        self.indicators
            .iter()
            .filter(|re| re.is_match(body))
            .map(|re| re.as_str().to_string())
            .collect()
    }
}

fn classify(err: reqwest::Error) -> ProbeFailure {
    if err.is_timeout() {
        ProbeFailure::Timeout
    } else if err.is_connect() {
        ProbeFailure::Refused
    } else if err.is_body() || err.is_decode() {
        ProbeFailure::Malformed(err.to_string())
    } else {
        ProbeFailure::NoResponse
    }
}

fn merge_sample(into: &mut HttpSample, sample: HttpSample) {
    if into.status == 0 {
        into.status = sample.status;
    }
    if into.server.is_none() {
        into.server = sample.server;
    }
    if into.title.is_none() {
        into.title = sample.title;
    }
    into.indicators.extend(sample.indicators);
}

#[async_trait]
impl EvidenceCollector for HttpCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Http
    }

    fn name(&self) -> &'static str {
        "HTTP banner and indicator scan"
    }

    fn applies_to(&self, host: &HostDescriptor) -> bool {
        host.known_open_ports.iter().any(|p| self.ports.contains(p))
    }

    async fn collect(&self, host: &HostDescriptor, timeout: Duration) -> CollectOutcome {
        let deadline = Instant::now() + timeout;
        let targets = self.targets(host);
        if targets.is_empty() {
            return CollectOutcome::failed(CollectorKind::Http, ProbeFailure::NoResponse);
        }

        let mut pending: FuturesUnordered<_> = targets
            .iter()
            .map(|(port, path)| self.fetch(host.ip, *port, path, deadline))
            .collect();

        let mut samples: BTreeMap<u16, HttpSample> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut last_failure = None;
        let mut deadline_hit = false;

        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((port, Ok(sample)))) => {
                    seen.extend(sample.indicators.iter().cloned());
                    merge_sample(samples.entry(port).or_default(), sample);
                    if seen.len() >= self.sufficient {
                        debug!(ip = %host.ip, indicators = seen.len(), "enough HTTP evidence");
                        break;
                    }
                }
                Ok(Some((_, Err(failure)))) => last_failure = Some(failure),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }
        // Dropping the set cancels any request still in flight
        drop(pending);

        let failure = if deadline_hit {
            Some(ProbeFailure::Timeout)
        } else if samples.is_empty() {
            Some(last_failure.unwrap_or(ProbeFailure::NoResponse))
        } else {
            None
        };

        CollectOutcome {
            kind: CollectorKind::Http,
            fragment: EvidenceFragment {
                http_responses: samples,
                ..Default::default()
            },
            failure,
        }
    }
}
