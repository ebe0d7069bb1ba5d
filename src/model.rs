use crate::errors::ProbeFailure;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// Classification of device types a signature can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Unknown,
    Computer,
    Phone,
    Tablet,
    Router,
    Switch,
    AccessPoint,
    Printer,
    #[serde(rename = "smart_tv")]
    SmartTV,
    MediaPlayer,
    Speaker,
    Camera,
    Nas,
    #[serde(rename = "iot_device")]
    IoTDevice,
    GameConsole,
    Server,
}

impl DeviceType {
    /// Routers, switches and access points usually answer SNMP.
    pub fn is_network_gear(&self) -> bool {
        matches!(
            self,
            DeviceType::Router | DeviceType::Switch | DeviceType::AccessPoint
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceType::Unknown => "Unknown",
            DeviceType::Computer => "Computer",
            DeviceType::Phone => "Phone",
            DeviceType::Tablet => "Tablet",
            DeviceType::Router => "Router",
            DeviceType::Switch => "Switch",
            DeviceType::AccessPoint => "Access Point",
            DeviceType::Printer => "Printer",
            DeviceType::SmartTV => "Smart TV",
            DeviceType::MediaPlayer => "Media Player",
            DeviceType::Speaker => "Speaker",
            DeviceType::Camera => "Camera",
            DeviceType::Nas => "NAS",
            DeviceType::IoTDevice => "IoT Device",
            DeviceType::GameConsole => "Game Console",
            DeviceType::Server => "Server",
        }
    }
}

/// A host handed over by the discovery sweep. Never modified by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub mac: String,
    pub ip: IpAddr,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub known_open_ports: BTreeSet<u16>,
    #[serde(default)]
    pub device_type_hint: Option<DeviceType>,
}

impl HostDescriptor {
    pub fn new(mac: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            mac: mac.into(),
            ip,
            hostname: None,
            known_open_ports: BTreeSet::new(),
            device_type_hint: None,
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.known_open_ports.extend(ports);
        self
    }

    pub fn with_hint(mut self, hint: DeviceType) -> Self {
        self.device_type_hint = Some(hint);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Tcp
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Responsive port, optionally with the banner it sent back
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub protocol: Protocol,
    pub banner: Option<String>,
}

impl Port {
    pub fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
            banner: None,
        }
    }

    pub fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Udp,
            banner: None,
        }
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }
}

/// What one HTTP endpoint told us
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSample {
    pub status: u16,
    pub server: Option<String>,
    pub title: Option<String>,
    /// Source text of every indicator pattern found in the body.
    pub indicators: BTreeSet<String>,
}

/// A DNS-SD service instance advertised by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service type without the domain, e.g. `_googlecast._tcp`.
    pub service_type: String,
    pub instance: String,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub txt: BTreeMap<String, String>,
}

/// Partial evidence produced by one collector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceFragment {
    pub open_ports: BTreeSet<Port>,
    pub http_responses: BTreeMap<u16, HttpSample>,
    pub snmp_values: BTreeMap<String, String>,
    pub mdns_records: Vec<ServiceRecord>,
    pub vendor_oui: Option<String>,
}

impl EvidenceFragment {
    pub fn is_empty(&self) -> bool {
        self.open_ports.is_empty()
            && self.http_responses.is_empty()
            && self.snmp_values.is_empty()
            && self.mdns_records.is_empty()
            && self.vendor_oui.is_none()
    }
}

/// Everything gathered about one host during one scan pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEvidence {
    pub mac: String,
    pub open_ports: BTreeSet<Port>,
    pub http_responses: BTreeMap<u16, HttpSample>,
    pub snmp_values: BTreeMap<String, String>,
    pub mdns_records: Vec<ServiceRecord>,
    pub vendor_oui: Option<String>,
}

impl HostEvidence {
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open_ports.is_empty()
            && self.http_responses.is_empty()
            && self.snmp_values.is_empty()
            && self.mdns_records.is_empty()
            && self.vendor_oui.is_none()
    }

    pub fn has_port(&self, number: u16, protocol: Protocol) -> bool {
        self.open_ports
            .iter()
            .any(|p| p.number == number && p.protocol == protocol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    Port,
    Http,
    Snmp,
    Mdns,
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectorKind::Port => "port",
            CollectorKind::Http => "http",
            CollectorKind::Snmp => "snmp",
            CollectorKind::Mdns => "mdns",
        };
        f.write_str(name)
    }
}

/// Score of one signature against one host's evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub signature_id: String,
    pub confidence: f64,
    pub matched_rule_ids: BTreeSet<String>,
}

/// Latest identification of a host, as handed to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedIdentification {
    pub mac: String,
    pub ip: IpAddr,
    pub device_type: Option<DeviceType>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub signature_id: Option<String>,
    /// Registered owner of the MAC prefix, independent of any signature.
    pub vendor: Option<String>,
    /// Accepted confidence, or the best sub-threshold score when unidentified.
    pub confidence: f64,
    pub timestamp: SystemTime,
    pub evidence_hash: String,
}

impl CachedIdentification {
    pub fn is_identified(&self) -> bool {
        self.signature_id.is_some()
    }

    /// Device class label, "unknown device type" when nothing matched.
    pub fn display_type(&self) -> String {
        match self.device_type {
            Some(t) if self.is_identified() => t.display_name().to_string(),
            _ => "unknown device type".to_string(),
        }
    }
}

/// Per-host scan lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    Queued,
    Probing,
    Scoring,
    Done,
    /// Fresh cache entry with unchanged inputs, nothing probed.
    Skipped,
}

impl HostState {
    pub fn can_transition_to(&self, next: HostState) -> bool {
        matches!(
            (self, next),
            (HostState::Queued, HostState::Probing)
                | (HostState::Queued, HostState::Skipped)
                | (HostState::Probing, HostState::Scoring)
                | (HostState::Scoring, HostState::Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HostState::Done | HostState::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Running,
    Completed,
}

/// Notable change in a host's identification, for the alerting side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IdentificationEvent {
    Identified {
        mac: String,
        signature_id: String,
    },
    Changed {
        mac: String,
        from: String,
        to: String,
    },
    Lost {
        mac: String,
        previous: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorFailure {
    pub collector: CollectorKind,
    pub failure: ProbeFailure,
}

/// Outcome of fingerprinting one host within a batch
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub mac: String,
    pub ip: IpAddr,
    pub hostname: Option<String>,
    pub state: HostState,
    pub identification: CachedIdentification,
    /// Best candidate even when below the acceptance threshold.
    pub best_match: Option<MatchResult>,
    pub collectors_run: Vec<CollectorKind>,
    pub failures: Vec<CollectorFailure>,
    pub timed_out: bool,
    pub elapsed: Duration,
    pub event: Option<IdentificationEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub scanned: usize,
    pub skipped: usize,
    pub identified: usize,
    pub timed_out: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub state: BatchState,
    pub hosts: Vec<HostReport>,
    pub summary: BatchSummary,
}
