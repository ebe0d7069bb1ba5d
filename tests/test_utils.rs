use async_trait::async_trait;
use netprint::collect::{CollectOutcome, EvidenceCollector};
use netprint::config::FingerprintConfig;
use netprint::errors::ProbeFailure;
use netprint::model::{CollectorKind, EvidenceFragment, HostDescriptor, ServiceRecord};
use netprint::net::mdns::MdnsQuery;
use netprint::net::snmp::{SnmpQuery, SnmpRequest};
use netprint::signature::store::SignatureStore;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Small signature set exercising every rule category
#[allow(dead_code)]
pub const TEST_SIGNATURES: &str = r#"[
  {"id":"acme-router","device_type":"router","manufacturer":"Acme","model":"AR-1","rules":[
    {"id":"acme-oui","category":"mac_oui","prefixes":["AA:BB:CC"],"weight":0.4},
    {"id":"acme-http","category":"http_pattern","pattern":"acme-router","weight":0.6}]},
  {"id":"generic-printer","device_type":"printer","manufacturer":"Generic","model":"P-100","rules":[
    {"id":"printer-jetdirect","category":"port","port":9100,"weight":0.6},
    {"id":"printer-sysdescr","category":"snmp_oid","oid":"1.3.6.1.2.1.1.1.0","pattern":"(?i)printer","weight":0.4}]},
  {"id":"cast-stick","device_type":"media_player","manufacturer":"Cast","model":"Stick","rules":[
    {"id":"cast-port","category":"port","port":8009,"weight":0.3},
    {"id":"cast-mdns","category":"mdns_service","service":"_googlecast._tcp","txt_key":"md","txt_pattern":"(?i)stick","weight":0.7}]},
  {"id":"ssh-box","device_type":"computer","manufacturer":"Generic","model":"Linux Box","rules":[
    {"id":"ssh","category":"port","port":22,"weight":0.5},
    {"id":"web","category":"port","port":80,"weight":0.5}]}
]"#;

#[allow(dead_code)]
pub fn test_store() -> SignatureStore {
    SignatureStore::from_json(TEST_SIGNATURES).unwrap()
}

/// Create a test host with the given MAC and IP
#[allow(dead_code)]
pub fn create_test_host(mac: &str, ip: &str) -> HostDescriptor {
    HostDescriptor::new(mac, ip.parse::<IpAddr>().unwrap())
}

/// Configuration with short timeouts suitable for tests
#[allow(dead_code)]
pub fn fast_config() -> FingerprintConfig {
    FingerprintConfig {
        per_collector_timeout_ms: 500,
        per_host_timeout_ms: 1000,
        tcp_connect_timeout_ms: 200,
        banner_read_timeout_ms: 200,
        ..Default::default()
    }
}

/// Collector returning a fixed fragment after an optional delay, counting calls
#[allow(dead_code)]
pub struct FakeCollector {
    pub kind: CollectorKind,
    pub delay: Duration,
    pub fragment: EvidenceFragment,
    pub failure: Option<ProbeFailure>,
    pub applies: bool,
    pub calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeCollector {
    pub fn new(kind: CollectorKind, fragment: EvidenceFragment) -> Self {
        Self {
            kind,
            delay: Duration::ZERO,
            fragment,
            failure: None,
            applies: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sleeping(kind: CollectorKind, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(kind, EvidenceFragment::default())
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn boxed(self) -> Box<dyn EvidenceCollector> {
        Box::new(self)
    }
}

#[async_trait]
impl EvidenceCollector for FakeCollector {
    fn kind(&self) -> CollectorKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "fake collector"
    }

    fn applies_to(&self, _host: &HostDescriptor) -> bool {
        self.applies
    }

    async fn collect(&self, _host: &HostDescriptor, _timeout: Duration) -> CollectOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        CollectOutcome {
            kind: self.kind,
            fragment: self.fragment.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// SNMP capability answering from a fixed table
#[allow(dead_code)]
pub struct FakeSnmp {
    pub answer: Result<BTreeMap<String, String>, ProbeFailure>,
    pub requests: Mutex<Vec<SnmpRequest>>,
}

#[allow(dead_code)]
impl FakeSnmp {
    pub fn answering(pairs: &[(&str, &str)]) -> Self {
        Self {
            answer: Ok(pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: ProbeFailure) -> Self {
        Self {
            answer: Err(failure),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SnmpQuery for FakeSnmp {
    async fn get(
        &self,
        _target: IpAddr,
        request: &SnmpRequest,
        _timeout: Duration,
    ) -> Result<BTreeMap<String, String>, ProbeFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}

/// mDNS capability answering from a fixed record list
#[allow(dead_code)]
pub struct FakeMdns {
    pub records: Vec<ServiceRecord>,
    pub browsed: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeMdns {
    pub fn new(records: Vec<ServiceRecord>) -> Self {
        Self {
            records,
            browsed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MdnsQuery for FakeMdns {
    async fn browse(
        &self,
        _target: IpAddr,
        services: &[String],
        _timeout: Duration,
    ) -> Result<Vec<ServiceRecord>, ProbeFailure> {
        self.browsed.lock().unwrap().extend(services.iter().cloned());
        Ok(self.records.clone())
    }
}

/// A service record with one TXT entry
#[allow(dead_code)]
pub fn create_test_record(service_type: &str, txt_key: &str, txt_value: &str) -> ServiceRecord {
    ServiceRecord {
        service_type: service_type.to_string(),
        instance: "Test Instance".to_string(),
        hostname: Some("test.local".to_string()),
        port: Some(8009),
        txt: [(txt_key.to_string(), txt_value.to_string())]
            .into_iter()
            .collect(),
    }
}
