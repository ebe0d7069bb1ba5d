use super::{CollectOutcome, EvidenceCollector};
use crate::config::FingerprintConfig;
use crate::model::{CollectorKind, DeviceType, EvidenceFragment, HostDescriptor};
use crate::net::snmp::{SnmpQuery, SnmpRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reads system OIDs through an SNMP capability.
/// Only worth running against hosts that answer SNMP or look like network gear.
pub struct SnmpCollector {
    query: Arc<dyn SnmpQuery>,
    request: SnmpRequest,
    trigger_ports: Vec<u16>,
    hint_types: Vec<DeviceType>,
}

impl SnmpCollector {
    pub fn new(config: &FingerprintConfig, query: Arc<dyn SnmpQuery>) -> Self {
        Self {
            query,
            request: SnmpRequest {
                community: config.snmp_community.clone(),
                oids: config.snmp_oids.clone(),
            },
            trigger_ports: config.snmp_trigger_ports.clone(),
            hint_types: config.snmp_hint_types.clone(),
        }
    }
}

#[async_trait]
impl EvidenceCollector for SnmpCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Snmp
    }

    fn name(&self) -> &'static str {
        "SNMP system group query"
    }

    fn applies_to(&self, host: &HostDescriptor) -> bool {
        let port_open = self
            .trigger_ports
            .iter()
            .any(|p| host.known_open_ports.contains(p));
        let hinted = host
            .device_type_hint
            .map_or(false, |hint| self.hint_types.contains(&hint) || hint.is_network_gear());
        port_open || hinted
    }

    async fn collect(&self, host: &HostDescriptor, timeout: Duration) -> CollectOutcome {
        match self.query.get(host.ip, &self.request, timeout).await {
            Ok(values) => {
                debug!(ip = %host.ip, values = values.len(), "SNMP values collected");
                let values = values
                    .into_iter()
                    .map(|(oid, value)| (oid.trim_start_matches('.').to_string(), value))
                    .collect();
                CollectOutcome::ok(
                    CollectorKind::Snmp,
                    EvidenceFragment {
                        snmp_values: values,
                        ..Default::default()
                    },
                )
            }
            Err(failure) => {
                debug!(ip = %host.ip, %failure, "SNMP query failed");
                CollectOutcome::failed(CollectorKind::Snmp, failure)
            }
        }
    }
}
