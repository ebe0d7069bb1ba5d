use crate::errors::ProbeFailure;
use crate::model::{CollectorKind, EvidenceFragment, HostDescriptor};
use async_trait::async_trait;
use std::time::Duration;

pub mod http;
pub mod mdns;
pub mod port;
pub mod snmp;

pub use http::HttpCollector;
pub use mdns::MdnsCollector;
pub use port::PortCollector;
pub use snmp::SnmpCollector;

/// What a collector hands back: evidence, and why it is thin if it is
#[derive(Debug, Clone, PartialEq)]
pub struct CollectOutcome {
    pub kind: CollectorKind,
    pub fragment: EvidenceFragment,
    pub failure: Option<ProbeFailure>,
}

impl CollectOutcome {
    pub fn ok(kind: CollectorKind, fragment: EvidenceFragment) -> Self {
        Self {
            kind,
            fragment,
            failure: None,
        }
    }

    pub fn failed(kind: CollectorKind, failure: ProbeFailure) -> Self {
        Self {
            kind,
            fragment: EvidenceFragment::default(),
            failure: Some(failure),
        }
    }
}

/// One category of evidence gathered from one host.
///
/// `collect` never errors: non-response yields an empty fragment plus a
/// [`ProbeFailure`].
#[async_trait]
pub trait EvidenceCollector: Send + Sync {
    fn kind(&self) -> CollectorKind;

    fn name(&self) -> &'static str;

    /// Whether running against `host` can produce anything.
    fn applies_to(&self, host: &HostDescriptor) -> bool;

    async fn collect(&self, host: &HostDescriptor, timeout: Duration) -> CollectOutcome;
}
