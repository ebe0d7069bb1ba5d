use super::{CollectOutcome, EvidenceCollector};
use crate::config::FingerprintConfig;
use crate::model::{CollectorKind, DeviceType, EvidenceFragment, HostDescriptor};
use crate::net::mdns::MdnsQuery;
use crate::signature::normalize_service;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Browses DNS-SD service types advertised by the host
pub struct MdnsCollector {
    query: Arc<dyn MdnsQuery>,
    services: Vec<String>,
    trigger_ports: Vec<u16>,
    hint_types: Vec<DeviceType>,
}

impl MdnsCollector {
    /// `extra_services` are the service types signatures look for; they are
    /// browsed together with the configured ones.
    pub fn new(
        config: &FingerprintConfig,
        query: Arc<dyn MdnsQuery>,
        extra_services: &[String],
    ) -> Self {
        let mut services: Vec<String> = Vec::new();
        for service in config.mdns_services.iter().chain(extra_services) {
            let service = normalize_service(service);
            if !services.contains(&service) {
                services.push(service);
            }
        }

        Self {
            query,
            services,
            trigger_ports: config.mdns_trigger_ports.clone(),
            hint_types: config.mdns_hint_types.clone(),
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }
}

#[async_trait]
impl EvidenceCollector for MdnsCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Mdns
    }

    fn name(&self) -> &'static str {
        "mDNS-SD service browse"
    }

    fn applies_to(&self, host: &HostDescriptor) -> bool {
        let port_open = self
            .trigger_ports
            .iter()
            .any(|p| host.known_open_ports.contains(p));
        let hinted = host
            .device_type_hint
            .map_or(false, |hint| self.hint_types.contains(&hint));
        port_open || hinted
    }

    async fn collect(&self, host: &HostDescriptor, timeout: Duration) -> CollectOutcome {
        match self.query.browse(host.ip, &self.services, timeout).await {
            Ok(mut records) => {
                for record in records.iter_mut() {
                    record.service_type = normalize_service(&record.service_type);
                }
                records.sort();
                records.dedup();
                debug!(ip = %host.ip, records = records.len(), "mDNS records collected");
                CollectOutcome::ok(
                    CollectorKind::Mdns,
                    EvidenceFragment {
                        mdns_records: records,
                        ..Default::default()
                    },
                )
            }
            Err(failure) => {
                debug!(ip = %host.ip, %failure, "mDNS browse failed");
                CollectOutcome::failed(CollectorKind::Mdns, failure)
            }
        }
    }
}
