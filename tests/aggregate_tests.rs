mod test_utils;

use netprint::aggregate::{aggregate, merge_fragment};
use netprint::model::{EvidenceFragment, HostEvidence, HttpSample, Port};
use test_utils::*;

fn fragments() -> Vec<EvidenceFragment> {
    vec![
        EvidenceFragment {
            vendor_oui: Some("AABBCC".to_string()),
            ..Default::default()
        },
        EvidenceFragment {
            open_ports: [Port::tcp(22).with_banner("SSH-2.0-dropbear"), Port::tcp(80)]
                .into_iter()
                .collect(),
            ..Default::default()
        },
        EvidenceFragment {
            http_responses: [(
                80,
                HttpSample {
                    status: 200,
                    server: Some("lighttpd".to_string()),
                    title: Some("Acme Router".to_string()),
                    indicators: ["acme-router".to_string()].into_iter().collect(),
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        },
        EvidenceFragment {
            snmp_values: [(
                "1.3.6.1.2.1.1.1.0".to_string(),
                "Acme AR-1".to_string(),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        },
        EvidenceFragment {
            mdns_records: vec![
                create_test_record("_http._tcp", "path", "/"),
                create_test_record("_airplay._tcp", "model", "AR-1"),
            ],
            ..Default::default()
        },
    ]
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut all = Vec::new();
    for rest in permutations(n - 1) {
        for slot in 0..=rest.len() {
            let mut order = rest.clone();
            order.insert(slot, n - 1);
            all.push(order);
        }
    }
    all
}

#[test]
fn test_aggregation_is_order_independent() {
    let parts = fragments();
    let reference = aggregate("AA:BB:CC:00:00:01", parts.clone());

    for order in permutations(parts.len()) {
        let shuffled: Vec<EvidenceFragment> = order.iter().map(|&i| parts[i].clone()).collect();
        assert_eq!(
            aggregate("AA:BB:CC:00:00:01", shuffled),
            reference,
            "order {:?}",
            order
        );
    }
}

#[test]
fn test_aggregation_keeps_every_category() {
    let evidence = aggregate("AA:BB:CC:00:00:01", fragments());

    assert_eq!(evidence.mac, "AA:BB:CC:00:00:01");
    assert_eq!(evidence.vendor_oui.as_deref(), Some("AABBCC"));
    assert_eq!(evidence.open_ports.len(), 2);
    assert_eq!(
        evidence.http_responses[&80].server.as_deref(),
        Some("lighttpd")
    );
    assert_eq!(evidence.snmp_values["1.3.6.1.2.1.1.1.0"], "Acme AR-1");
    // Records come out sorted regardless of arrival order
    let services: Vec<&str> = evidence
        .mdns_records
        .iter()
        .map(|r| r.service_type.as_str())
        .collect();
    assert_eq!(services, vec!["_airplay._tcp", "_http._tcp"]);
}

#[test]
fn test_empty_fragments_change_nothing() {
    let mut evidence = aggregate("AA:BB:CC:00:00:01", fragments());
    let before = evidence.clone();

    merge_fragment(&mut evidence, EvidenceFragment::default());
    assert_eq!(evidence, before);

    let nothing = aggregate("02:00:00:00:00:01", Vec::new());
    assert_eq!(nothing, HostEvidence::new("02:00:00:00:00:01"));
    assert!(nothing.is_empty());
}

#[test]
fn test_duplicate_records_are_merged() {
    let record = create_test_record("_googlecast._tcp", "md", "Chromecast");
    let one = EvidenceFragment {
        mdns_records: vec![record.clone()],
        ..Default::default()
    };

    let evidence = aggregate("AA:BB:CC:00:00:01", vec![one.clone(), one]);
    assert_eq!(evidence.mdns_records, vec![record]);
}
