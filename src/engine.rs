use crate::aggregate::aggregate;
use crate::cache::{evidence_hash, identification_event, ResultCache};
use crate::collect::{
    CollectOutcome, EvidenceCollector, HttpCollector, MdnsCollector, PortCollector, SnmpCollector,
};
use crate::config::{FingerprintConfig, MdnsBackend};
use crate::db::oui::{normalize_mac, oui_prefix, MacVendorDatabase};
use crate::errors::{FingerprintError, ProbeFailure};
use crate::model::{
    BatchReport, BatchState, BatchSummary, CachedIdentification, CollectorFailure, CollectorKind,
    EvidenceFragment, HostDescriptor, HostReport, HostState,
};
use crate::net::mdns::{AvahiBrowseCommand, MdnsQuery, MdnsSdBrowser};
use crate::net::snmp::SnmpGetCommand;
use crate::score::MatchScorer;
use crate::signature::store::SignatureStore;
use futures::pin_mut;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Collector set used when the caller does not supply one
pub fn default_collectors(
    config: &FingerprintConfig,
    store: &SignatureStore,
) -> Result<Vec<Box<dyn EvidenceCollector>>, FingerprintError> {
    let mdns_query: Arc<dyn MdnsQuery> = match config.mdns_backend {
        MdnsBackend::Avahi => Arc::new(AvahiBrowseCommand::default()),
        MdnsBackend::Native => Arc::new(MdnsSdBrowser),
    };

    let mut collectors: Vec<Box<dyn EvidenceCollector>> = Vec::new();

    // Cheap and always applicable
    collectors.push(Box::new(PortCollector::new(config)));

    collectors.push(Box::new(HttpCollector::new(
        config,
        store.http_indicators().to_vec(),
    )?));

    // Capability-backed collectors, run selectively
    collectors.push(Box::new(SnmpCollector::new(
        config,
        Arc::new(SnmpGetCommand::default()),
    )));
    collectors.push(Box::new(MdnsCollector::new(
        config,
        mdns_query,
        store.mdns_services(),
    )));

    Ok(collectors)
}

/// Batch fingerprinting engine: plans collectors per host, bounds
/// concurrency, scores the gathered evidence and keeps the result cache.
pub struct FingerprintEngine {
    config: Arc<FingerprintConfig>,
    store: Arc<SignatureStore>,
    scorer: MatchScorer,
    cache: Arc<ResultCache>,
    vendor_db: Arc<MacVendorDatabase>,
    collectors: Arc<Vec<Box<dyn EvidenceCollector>>>,
}

impl FingerprintEngine {
    /// Validate the configuration, load signatures and set up the default collectors.
    pub fn new(config: FingerprintConfig) -> Result<Self, FingerprintError> {
        config.validate()?;
        let store = SignatureStore::load(&config)?;
        let collectors = default_collectors(&config, &store)?;
        Self::with_collectors(config, store, collectors)
    }

    /// Engine over an explicit signature store and collector set.
    pub fn with_collectors(
        config: FingerprintConfig,
        store: SignatureStore,
        collectors: Vec<Box<dyn EvidenceCollector>>,
    ) -> Result<Self, FingerprintError> {
        config.validate()?;
        if store.is_empty() {
            return Err(FingerprintError::SignatureLoad(
                "signature store is empty".to_string(),
            ));
        }

        let vendor_db = MacVendorDatabase::new(config.oui_database_path.clone());
        info!(
            signatures = store.len(),
            skipped_signatures = store.skipped().len(),
            collectors = collectors.len(),
            "fingerprint engine ready"
        );

        Ok(Self {
            scorer: MatchScorer::from_config(&config),
            config: Arc::new(config),
            store: Arc::new(store),
            cache: Arc::new(ResultCache::new()),
            vendor_db: Arc::new(vendor_db),
            collectors: Arc::new(collectors),
        })
    }

    /// Set the maximum number of hosts fingerprinted at once
    pub fn set_concurrency(&mut self, jobs: usize) {
        Arc::make_mut(&mut self.config).max_concurrency = jobs.max(1);
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    /// Shared handle to the identification cache, for the dashboard side.
    pub fn cache(&self) -> Arc<ResultCache> {
        self.cache.clone()
    }

    /// Collectors that would run against `host`, in registration order.
    pub fn plan(&self, host: &HostDescriptor) -> Vec<CollectorKind> {
        self.collectors
            .iter()
            .filter(|c| c.applies_to(host))
            .map(|c| c.kind())
            .collect()
    }

    /// Fingerprint a single host outside of any batch.
    pub async fn fingerprint_host(&self, host: HostDescriptor) -> HostReport {
        self.worker().run(host).await
    }

    /// Fingerprint a batch of hosts, at most `max_concurrency` at a time.
    ///
    /// Never fails: per-host problems end up in the host's report.
    pub async fn run_batch(&self, hosts: Vec<HostDescriptor>) -> BatchReport {
        let started = Instant::now();
        let total = hosts.len();
        let mut state = BatchState::Pending;
        debug!(hosts = total, ?state, "batch accepted");

        state = BatchState::Running;
        debug!(?state, max_concurrency = self.config.max_concurrency, "batch started");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, HostReport)>(total.max(1));

        for (index, host) in hosts.into_iter().enumerate() {
            let worker = self.worker();
            let semaphore = semaphore.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let report = worker.run(host).await;
                let _ = tx.send((index, report)).await;
            });
        }

        // Close the sender channel
        drop(tx);

        let mut indexed = Vec::with_capacity(total);
        while let Some(entry) = rx.recv().await {
            indexed.push(entry);
        }
        if indexed.len() < total {
            warn!(
                missing = total - indexed.len(),
                "some host tasks ended without a report"
            );
        }
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<HostReport> = indexed.into_iter().map(|(_, r)| r).collect();

        state = BatchState::Completed;
        let summary = summarize(&reports, started.elapsed());
        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            identified = summary.identified,
            timed_out = summary.timed_out,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch completed"
        );

        BatchReport {
            state,
            hosts: reports,
            summary,
        }
    }

    fn worker(&self) -> HostWorker {
        HostWorker {
            config: self.config.clone(),
            store: self.store.clone(),
            scorer: self.scorer,
            cache: self.cache.clone(),
            vendor_db: self.vendor_db.clone(),
            collectors: self.collectors.clone(),
        }
    }
}

fn summarize(reports: &[HostReport], elapsed: std::time::Duration) -> BatchSummary {
    BatchSummary {
        scanned: reports.iter().filter(|r| r.state == HostState::Done).count(),
        skipped: reports.iter().filter(|r| r.state == HostState::Skipped).count(),
        identified: reports
            .iter()
            .filter(|r| r.identification.is_identified())
            .count(),
        timed_out: reports.iter().filter(|r| r.timed_out).count(),
        elapsed,
    }
}

/// Host lifecycle tracker
struct HostScan {
    mac: String,
    state: HostState,
}

impl HostScan {
    fn new(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            state: HostState::Queued,
        }
    }

    fn advance(&mut self, next: HostState) {
        if !self.state.can_transition_to(next) {
            warn!(mac = %self.mac, from = ?self.state, to = ?next, "unexpected host state transition");
        }
        debug!(mac = %self.mac, from = ?self.state, to = ?next, "host state");
        self.state = next;
    }
}

/// Everything one host task needs, detached from the engine's lifetime
struct HostWorker {
    config: Arc<FingerprintConfig>,
    store: Arc<SignatureStore>,
    scorer: MatchScorer,
    cache: Arc<ResultCache>,
    vendor_db: Arc<MacVendorDatabase>,
    collectors: Arc<Vec<Box<dyn EvidenceCollector>>>,
}

impl HostWorker {
    async fn run(self, host: HostDescriptor) -> HostReport {
        let started = Instant::now();
        let normalized = normalize_mac(&host.mac);
        let mac = normalized
            .clone()
            .unwrap_or_else(|| host.mac.trim().to_uppercase());
        let hash = evidence_hash(&host);
        let mut scan = HostScan::new(&mac);

        if let Some(cached) =
            self.cache
                .fresh(&mac, &hash, self.config.rescan_interval(), SystemTime::now())
        {
            scan.advance(HostState::Skipped);
            return HostReport {
                mac,
                ip: host.ip,
                hostname: host.hostname,
                state: scan.state,
                identification: cached,
                best_match: None,
                collectors_run: Vec::new(),
                failures: Vec::new(),
                timed_out: false,
                elapsed: started.elapsed(),
                event: None,
            };
        }

        scan.advance(HostState::Probing);
        let seed = EvidenceFragment {
            vendor_oui: normalized.as_deref().and_then(oui_prefix),
            ..Default::default()
        };
        let (mut fragments, failures, collectors_run, timed_out) = self.probe(&host).await;
        fragments.insert(0, seed);

        scan.advance(HostState::Scoring);
        let evidence = aggregate(&mac, fragments);
        let outcome = self.scorer.identify(&self.store, &evidence);
        drop(evidence);

        let accepted = outcome
            .accepted()
            .and_then(|m| self.store.get(&m.signature_id).map(|sig| (m, sig)));
        let identification = CachedIdentification {
            mac: mac.clone(),
            ip: host.ip,
            device_type: accepted.map(|(_, sig)| sig.device_type),
            manufacturer: accepted.map(|(_, sig)| sig.manufacturer.clone()),
            model: accepted.map(|(_, sig)| sig.model.clone()),
            signature_id: accepted.map(|(m, _)| m.signature_id.clone()),
            vendor: self.vendor_db.lookup_vendor(&mac),
            // Unidentified hosts keep their best sub-threshold score
            confidence: outcome.best.as_ref().map_or(0.0, |m| m.confidence),
            timestamp: SystemTime::now(),
            evidence_hash: hash,
        };

        let previous = self.cache.insert(identification.clone());
        let event = identification_event(previous.as_ref(), &identification);
        if let Some(ref event) = event {
            info!(mac = %mac, ?event, "identification changed");
        }
        scan.advance(HostState::Done);

        HostReport {
            mac,
            ip: host.ip,
            hostname: host.hostname,
            state: scan.state,
            identification,
            best_match: outcome.best,
            collectors_run,
            failures,
            timed_out,
            elapsed: started.elapsed(),
            event,
        }
    }

    /// Run every applicable collector under the per-host limits.
    ///
    /// Collectors still running at the host deadline are dropped and
    /// recorded as timed out.
    async fn probe(
        &self,
        host: &HostDescriptor,
    ) -> (
        Vec<EvidenceFragment>,
        Vec<CollectorFailure>,
        Vec<CollectorKind>,
        bool,
    ) {
        let planned: Vec<&dyn EvidenceCollector> = self
            .collectors
            .iter()
            .filter(|c| {
                let applies = c.applies_to(host);
                if !applies {
                    debug!(ip = %host.ip, collector = c.name(), "collector not applicable");
                }
                applies
            })
            .map(|c| c.as_ref())
            .collect();
        let collectors_run: Vec<CollectorKind> = planned.iter().map(|c| c.kind()).collect();

        let collector_timeout = self.config.per_collector_timeout();
        let deadline = Instant::now() + self.config.per_host_timeout();

        // Built up front so the stream holds no closure over borrowed collectors
        let pending: Vec<_> = planned
            .iter()
            .map(|&collector| async move {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let budget = collector_timeout.min(remaining);
                match timeout(budget, collector.collect(host, budget)).await {
                    Ok(outcome) => (outcome, false),
                    // Cut off by the host deadline rather than its own limit
                    Err(_) => (
                        CollectOutcome::failed(collector.kind(), ProbeFailure::Timeout),
                        remaining <= collector_timeout,
                    ),
                }
            })
            .collect();
        let runs = stream::iter(pending).buffer_unordered(self.config.per_host_concurrency.max(1));
        pin_mut!(runs);

        let mut fragments = Vec::with_capacity(planned.len());
        let mut failures = Vec::new();
        let mut finished: Vec<CollectorKind> = Vec::with_capacity(planned.len());
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, runs.next()).await {
                Ok(Some((outcome, host_deadline))) => {
                    timed_out |= host_deadline;
                    finished.push(outcome.kind);
                    if let Some(failure) = outcome.failure {
                        debug!(ip = %host.ip, collector = %outcome.kind, %failure, "soft probe failure");
                        failures.push(CollectorFailure {
                            collector: outcome.kind,
                            failure,
                        });
                    }
                    fragments.push(outcome.fragment);
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if timed_out {
            for kind in collectors_run.iter().filter(|k| !finished.contains(*k)) {
                failures.push(CollectorFailure {
                    collector: *kind,
                    failure: ProbeFailure::Timeout,
                });
            }
            debug!(
                ip = %host.ip,
                finished = finished.len(),
                planned = collectors_run.len(),
                "host deadline reached, continuing with partial evidence"
            );
        }

        (fragments, failures, collectors_run, timed_out)
    }
}
