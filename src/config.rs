use crate::errors::FingerprintError;
use crate::model::DeviceType;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which implementation answers mDNS queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MdnsBackend {
    /// Shell out to `avahi-browse`.
    Avahi,
    /// In-process multicast browsing.
    Native,
}

/// Configuration settings for the fingerprinting engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Hosts fingerprinted at the same time
    pub max_concurrency: usize,

    /// Collectors running at the same time against one host
    pub per_host_concurrency: usize,

    /// Upper bound for a single collector invocation
    pub per_collector_timeout_ms: u64,

    /// Upper bound for all probing of one host
    pub per_host_timeout_ms: u64,

    /// Minimum confidence for a match to count as an identification
    pub confidence_threshold: f64,

    /// Confidence at which the scorer stops looking at further signatures
    pub early_exit_confidence: f64,

    /// A fresh, unchanged host is not probed again within this interval
    pub rescan_interval_secs: u64,

    /// TCP ports the port collector tries on every host
    pub candidate_ports: Vec<u16>,

    /// UDP ports probed with a protocol-specific payload
    pub udp_candidate_ports: Vec<u16>,

    /// Ports probed at the same time against one host
    pub port_scan_concurrency: usize,

    pub tcp_connect_timeout_ms: u64,

    pub banner_read_timeout_ms: u64,

    /// Ports considered plausible HTTP/HTTPS endpoints
    pub http_ports: Vec<u16>,

    pub http_paths: Vec<String>,

    /// Hard cap on requests sent to one host
    pub http_max_requests: usize,

    /// Bytes of each response body scanned for indicators
    pub http_body_limit: usize,

    /// Matched indicators after which no further requests are issued
    pub http_sufficient_indicators: usize,

    pub snmp_community: String,

    pub snmp_oids: Vec<String>,

    pub snmp_trigger_ports: Vec<u16>,

    pub snmp_hint_types: Vec<DeviceType>,

    pub mdns_trigger_ports: Vec<u16>,

    pub mdns_hint_types: Vec<DeviceType>,

    /// Service types always browsed, in addition to those named by signatures
    pub mdns_services: Vec<String>,

    pub mdns_backend: MdnsBackend,

    /// Signature definitions replacing the built-in set
    pub signatures_path: Option<PathBuf>,

    /// Wireshark `manuf` file used for vendor names
    pub oui_database_path: Option<PathBuf>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            per_host_concurrency: 4,
            per_collector_timeout_ms: 1500,
            per_host_timeout_ms: 4000,
            confidence_threshold: 0.5,
            early_exit_confidence: 0.9,
            rescan_interval_secs: 3600,
            candidate_ports: vec![
                21,    // FTP
                22,    // SSH
                23,    // Telnet
                53,    // DNS
                80,    // HTTP
                139,   // NetBIOS
                443,   // HTTPS
                445,   // SMB
                515,   // LPD
                554,   // RTSP
                631,   // IPP
                1400,  // Sonos
                5000,  // UPnP / Synology
                7000,  // AirPlay
                3389,  // RDP
                8008,  // Chromecast
                8009,  // Cast control
                8060,  // Roku ECP
                8080,  // HTTP-Proxy
                8443,  // HTTPS-Alt
                9100,  // JetDirect
                62078, // iPhone sync
            ],
            udp_candidate_ports: vec![
                161, // SNMP
            ],
            port_scan_concurrency: 32,
            tcp_connect_timeout_ms: 300,
            banner_read_timeout_ms: 400,
            http_ports: vec![80, 443, 5000, 8000, 8008, 8080, 8443],
            http_paths: vec!["/".to_string()],
            http_max_requests: 4,
            http_body_limit: 16 * 1024,
            http_sufficient_indicators: 1,
            snmp_community: "public".to_string(),
            snmp_oids: vec![
                "1.3.6.1.2.1.1.1.0".to_string(), // sysDescr
                "1.3.6.1.2.1.1.2.0".to_string(), // sysObjectID
                "1.3.6.1.2.1.1.5.0".to_string(), // sysName
            ],
            snmp_trigger_ports: vec![161],
            snmp_hint_types: vec![
                DeviceType::Router,
                DeviceType::Switch,
                DeviceType::AccessPoint,
                DeviceType::Printer,
                DeviceType::Nas,
            ],
            mdns_trigger_ports: vec![631, 1400, 5353, 7000, 8008, 8009, 62078],
            mdns_hint_types: vec![
                DeviceType::Phone,
                DeviceType::Tablet,
                DeviceType::Printer,
                DeviceType::SmartTV,
                DeviceType::MediaPlayer,
                DeviceType::Speaker,
            ],
            mdns_services: vec![
                "_airplay._tcp".to_string(),
                "_googlecast._tcp".to_string(),
                "_ipp._tcp".to_string(),
            ],
            mdns_backend: MdnsBackend::Avahi,
            signatures_path: None,
            oui_database_path: None,
        }
    }
}

impl FingerprintConfig {
    /// Load a JSON configuration file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, FingerprintError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FingerprintError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| FingerprintError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `NETPRINT_*` environment overrides on top of the current values.
    pub fn apply_env(mut self) -> Self {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed("NETPRINT_MAX_CONCURRENCY") {
            self.max_concurrency = v;
        }
        if let Some(v) = parsed("NETPRINT_PER_HOST_CONCURRENCY") {
            self.per_host_concurrency = v;
        }
        if let Some(v) = parsed("NETPRINT_COLLECTOR_TIMEOUT_MS") {
            self.per_collector_timeout_ms = v;
        }
        if let Some(v) = parsed("NETPRINT_HOST_TIMEOUT_MS") {
            self.per_host_timeout_ms = v;
        }
        if let Some(v) = parsed("NETPRINT_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = v;
        }
        if let Some(v) = parsed("NETPRINT_RESCAN_INTERVAL_SECS") {
            self.rescan_interval_secs = v;
        }
        if let Ok(path) = env::var("NETPRINT_SIGNATURES") {
            self.signatures_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit(self.confidence_threshold) {
            return Err(FingerprintError::Config(format!(
                "confidence_threshold must be in (0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !in_unit(self.early_exit_confidence)
            || self.early_exit_confidence < self.confidence_threshold
        {
            return Err(FingerprintError::Config(format!(
                "early_exit_confidence must be in [confidence_threshold, 1], got {}",
                self.early_exit_confidence
            )));
        }
        if self.max_concurrency == 0
            || self.per_host_concurrency == 0
            || self.port_scan_concurrency == 0
        {
            return Err(FingerprintError::Config(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.http_max_requests == 0 {
            return Err(FingerprintError::Config(
                "http_max_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn per_collector_timeout(&self) -> Duration {
        Duration::from_millis(self.per_collector_timeout_ms)
    }

    pub fn per_host_timeout(&self) -> Duration {
        Duration::from_millis(self.per_host_timeout_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }

    pub fn tcp_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_connect_timeout_ms)
    }

    pub fn banner_read_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_read_timeout_ms)
    }
}
