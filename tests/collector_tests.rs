mod test_utils;

use netprint::collect::{HttpCollector, MdnsCollector, PortCollector, SnmpCollector};
use netprint::errors::ProbeFailure;
use netprint::model::{CollectorKind, DeviceType, Port, Protocol};
use netprint::{EvidenceCollector, FingerprintConfig};
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use test_utils::*;

fn local_config() -> FingerprintConfig {
    FingerprintConfig {
        candidate_ports: Vec::new(),
        udp_candidate_ports: Vec::new(),
        ..fast_config()
    }
}

/// Accept connections forever, greeting each with `banner`
async fn spawn_banner_server(banner: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(banner.as_bytes()).await;
        }
    });
    port
}

/// Minimal HTTP server; `/slow` answers only after five seconds
async fn spawn_http_server(body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                if request.starts_with("GET /slow") {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nServer: AcmeHTTPd/1.0\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

#[tokio::test]
async fn test_port_collector_grabs_banner() {
    let port = spawn_banner_server("SSH-2.0-OpenSSH_9.6\r\n").await;
    let collector = PortCollector::new(&local_config());
    let host = create_test_host("02:00:00:00:00:50", "127.0.0.1").with_ports([port]);

    let outcome = collector.collect(&host, Duration::from_secs(2)).await;

    assert_eq!(outcome.kind, CollectorKind::Port);
    assert!(outcome.failure.is_none());
    let open: Vec<&Port> = outcome.fragment.open_ports.iter().collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].number, port);
    assert_eq!(open[0].protocol, Protocol::Tcp);
    assert_eq!(open[0].banner.as_deref(), Some("SSH-2.0-OpenSSH_9.6"));
}

#[tokio::test]
async fn test_port_collector_reports_refused_ports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let collector = PortCollector::new(&local_config());
    let host = create_test_host("02:00:00:00:00:51", "127.0.0.1").with_ports([port]);
    let outcome = collector.collect(&host, Duration::from_secs(2)).await;

    assert!(outcome.fragment.is_empty());
    assert_eq!(outcome.failure, Some(ProbeFailure::Refused));
}

#[tokio::test]
async fn test_http_collector_extracts_server_title_and_indicators() {
    let port =
        spawn_http_server("<html><head><title>Acme Router</title></head><body>acme-router admin</body></html>").await;
    let config = FingerprintConfig {
        http_ports: vec![port],
        ..local_config()
    };
    let collector = HttpCollector::new(&config, vec![Regex::new("acme-router").unwrap()]).unwrap();
    let host = create_test_host("02:00:00:00:00:52", "127.0.0.1").with_ports([port]);

    assert!(collector.applies_to(&host));
    let outcome = collector.collect(&host, Duration::from_secs(5)).await;

    assert!(outcome.failure.is_none(), "{:?}", outcome.failure);
    let sample = &outcome.fragment.http_responses[&port];
    assert_eq!(sample.status, 200);
    assert_eq!(sample.server.as_deref(), Some("AcmeHTTPd/1.0"));
    assert_eq!(sample.title.as_deref(), Some("Acme Router"));
    assert!(sample.indicators.contains("acme-router"));
}

#[tokio::test]
async fn test_http_collector_stops_once_evidence_is_sufficient() {
    let port = spawn_http_server("<title>Acme</title>acme-router").await;
    let config = FingerprintConfig {
        http_ports: vec![port],
        http_paths: vec!["/".to_string(), "/slow".to_string()],
        http_sufficient_indicators: 1,
        ..local_config()
    };
    let collector = HttpCollector::new(&config, vec![Regex::new("acme-router").unwrap()]).unwrap();
    let host = create_test_host("02:00:00:00:00:53", "127.0.0.1").with_ports([port]);

    let started = Instant::now();
    let outcome = collector.collect(&host, Duration::from_secs(10)).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.failure.is_none());
    assert!(outcome.fragment.http_responses[&port]
        .indicators
        .contains("acme-router"));
}

#[tokio::test]
async fn test_http_collector_times_out_quietly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // Accept and never answer
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let config = FingerprintConfig {
        http_ports: vec![port],
        ..local_config()
    };
    let collector = HttpCollector::new(&config, Vec::new()).unwrap();
    let host = create_test_host("02:00:00:00:00:54", "127.0.0.1").with_ports([port]);

    let outcome = collector.collect(&host, Duration::from_millis(300)).await;
    assert!(outcome.fragment.is_empty());
    assert_eq!(outcome.failure, Some(ProbeFailure::Timeout));
}

#[tokio::test]
async fn test_snmp_collector_normalizes_oids() {
    let snmp = Arc::new(FakeSnmp::answering(&[(
        ".1.3.6.1.2.1.1.1.0",
        "HP ETHERNET MULTI-ENVIRONMENT",
    )]));
    let collector = SnmpCollector::new(&FingerprintConfig::default(), snmp.clone());
    let host = create_test_host("02:00:00:00:00:55", "10.0.0.55").with_ports([161]);

    assert!(collector.applies_to(&host));
    let outcome = collector.collect(&host, Duration::from_secs(1)).await;

    assert!(outcome.failure.is_none());
    assert_eq!(
        outcome.fragment.snmp_values["1.3.6.1.2.1.1.1.0"],
        "HP ETHERNET MULTI-ENVIRONMENT"
    );
    let requests = snmp.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].community, "public");
    assert!(requests[0].oids.contains(&"1.3.6.1.2.1.1.1.0".to_string()));
}

#[tokio::test]
async fn test_snmp_collector_failure_is_soft() {
    let snmp = Arc::new(FakeSnmp::failing(ProbeFailure::ToolUnavailable(
        "snmpget".to_string(),
    )));
    let collector = SnmpCollector::new(&FingerprintConfig::default(), snmp);
    let host = create_test_host("02:00:00:00:00:56", "10.0.0.56").with_hint(DeviceType::Switch);

    let outcome = collector.collect(&host, Duration::from_secs(1)).await;
    assert!(outcome.fragment.is_empty());
    assert_eq!(
        outcome.failure,
        Some(ProbeFailure::ToolUnavailable("snmpget".to_string()))
    );
}

#[tokio::test]
async fn test_snmp_collector_applicability() {
    let collector = SnmpCollector::new(
        &FingerprintConfig::default(),
        Arc::new(FakeSnmp::answering(&[])),
    );
    let base = create_test_host("02:00:00:00:00:57", "10.0.0.57");

    assert!(!collector.applies_to(&base.clone().with_ports([22, 80])));
    assert!(collector.applies_to(&base.clone().with_ports([161])));
    assert!(collector.applies_to(&base.clone().with_hint(DeviceType::AccessPoint)));
    assert!(!collector.applies_to(&base.with_hint(DeviceType::Phone)));
}

#[tokio::test]
async fn test_mdns_collector_browses_configured_and_signature_services() {
    let mdns = Arc::new(FakeMdns::new(vec![
        create_test_record("_googlecast._tcp.local.", "md", "Chromecast"),
        create_test_record("_googlecast._tcp", "md", "Chromecast"),
    ]));
    let extra = vec!["_amzn-wplay._tcp".to_string(), "_ipp._tcp.local.".to_string()];
    let collector = MdnsCollector::new(&FingerprintConfig::default(), mdns.clone(), &extra);

    // Configured services first, duplicates dropped
    assert_eq!(
        collector.services(),
        &[
            "_airplay._tcp".to_string(),
            "_googlecast._tcp".to_string(),
            "_ipp._tcp".to_string(),
            "_amzn-wplay._tcp".to_string(),
        ]
    );

    let host = create_test_host("02:00:00:00:00:58", "10.0.0.58").with_ports([8009]);
    assert!(collector.applies_to(&host));
    let outcome = collector.collect(&host, Duration::from_secs(1)).await;

    assert!(outcome.failure.is_none());
    // Both spellings collapse into one record
    assert_eq!(outcome.fragment.mdns_records.len(), 1);
    assert_eq!(outcome.fragment.mdns_records[0].service_type, "_googlecast._tcp");
    assert_eq!(mdns.browsed.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_mdns_collector_applicability() {
    let collector = MdnsCollector::new(
        &FingerprintConfig::default(),
        Arc::new(FakeMdns::new(Vec::new())),
        &[],
    );
    let base = create_test_host("02:00:00:00:00:59", "10.0.0.59");

    assert!(!collector.applies_to(&base.clone().with_ports([22])));
    assert!(collector.applies_to(&base.clone().with_ports([631])));
    assert!(collector.applies_to(&base.clone().with_hint(DeviceType::SmartTV)));
    assert!(!collector.applies_to(&base.with_hint(DeviceType::Router)));
}
