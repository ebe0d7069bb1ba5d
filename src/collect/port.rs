use super::{CollectOutcome, EvidenceCollector};
use crate::config::FingerprintConfig;
use crate::errors::ProbeFailure;
use crate::model::{CollectorKind, EvidenceFragment, HostDescriptor, Port};
use crate::net::tcp::{probe_tcp, probe_udp, udp_payload};
use async_trait::async_trait;
use futures::pin_mut;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Bounded TCP connect scan with banner grabbing, plus payload-driven UDP probes
pub struct PortCollector {
    tcp_ports: Vec<u16>,
    udp_ports: Vec<u16>,
    concurrency: usize,
    connect_timeout: Duration,
    banner_timeout: Duration,
    snmp_community: String,
}

impl PortCollector {
    pub fn new(config: &FingerprintConfig) -> Self {
        Self {
            tcp_ports: config.candidate_ports.clone(),
            udp_ports: config.udp_candidate_ports.clone(),
            concurrency: config.port_scan_concurrency.max(1),
            connect_timeout: config.tcp_connect_timeout(),
            banner_timeout: config.banner_read_timeout(),
            snmp_community: config.snmp_community.clone(),
        }
    }

    /// Candidate ports plus whatever discovery already saw open.
    fn tcp_targets(&self, host: &HostDescriptor) -> BTreeSet<u16> {
        self.tcp_ports
            .iter()
            .chain(host.known_open_ports.iter())
            .copied()
            .filter(|&p| p != 0)
            .collect()
    }

    async fn scan_tcp(&self, ip: IpAddr, ports: BTreeSet<u16>, deadline: Instant) -> PortSweep {
        let mut sweep = PortSweep::default();
        let probes = stream::iter(ports)
            .map(|port| async move {
                (
                    port,
                    probe_tcp(ip, port, self.connect_timeout, self.banner_timeout).await,
                )
            })
            .buffer_unordered(self.concurrency);
        pin_mut!(probes);

        loop {
            match timeout_at(deadline, probes.next()).await {
                Ok(Some((port, Ok(banner)))) => {
                    let mut open = Port::tcp(port);
                    open.banner = banner;
                    sweep.open.insert(open);
                }
                Ok(Some((_, Err(failure)))) => sweep.note(failure),
                Ok(None) => break,
                Err(_) => {
                    sweep.deadline_hit = true;
                    break;
                }
            }
        }
        sweep
    }

    async fn scan_udp(&self, ip: IpAddr, deadline: Instant) -> PortSweep {
        let mut sweep = PortSweep::default();
        let probes = self.udp_ports.iter().filter_map(|&port| {
            let payload = udp_payload(port, &self.snmp_community)?;
            Some(async move { (port, probe_udp(ip, port, &payload, self.banner_timeout).await) })
        });

        match timeout_at(deadline, futures::future::join_all(probes)).await {
            Ok(results) => {
                for (port, result) in results {
                    match result {
                        Ok(reply) => {
                            let mut open = Port::udp(port);
                            open.banner = printable_banner(&reply, &self.snmp_community);
                            sweep.open.insert(open);
                        }
                        Err(failure) => sweep.note(failure),
                    }
                }
            }
            Err(_) => sweep.deadline_hit = true,
        }
        sweep
    }
}

#[derive(Default)]
struct PortSweep {
    open: BTreeSet<Port>,
    refused: usize,
    unreachable: usize,
    silent: usize,
    deadline_hit: bool,
}

impl PortSweep {
    fn note(&mut self, failure: ProbeFailure) {
        match failure {
            ProbeFailure::Refused => self.refused += 1,
            ProbeFailure::Unreachable => self.unreachable += 1,
            _ => self.silent += 1,
        }
    }

    fn merge(&mut self, other: PortSweep) {
        self.open.extend(other.open);
        self.refused += other.refused;
        self.unreachable += other.unreachable;
        self.silent += other.silent;
        self.deadline_hit |= other.deadline_hit;
    }

    /// Soft failure describing the sweep, if it needs one.
    fn failure(&self) -> Option<ProbeFailure> {
        if self.deadline_hit {
            return Some(ProbeFailure::Timeout);
        }
        if !self.open.is_empty() {
            return None;
        }
        if self.unreachable > 0 && self.refused == 0 {
            Some(ProbeFailure::Unreachable)
        } else if self.refused > 0 && self.silent == 0 {
            Some(ProbeFailure::Refused)
        } else {
            Some(ProbeFailure::NoResponse)
        }
    }
}

/// Longest printable run in a binary reply, skipping the echoed community.
fn printable_banner(reply: &[u8], community: &str) -> Option<String> {
    let mut text = String::from_utf8_lossy(reply).into_owned();
    if !community.is_empty() {
        text = text.replace(community, " ");
    }
    text.split(|c: char| !(c.is_ascii_graphic() || c == ' '))
        .map(str::trim)
        .filter(|run| run.len() > 5)
        .max_by_key(|run| run.len())
        .map(str::to_string)
}

#[async_trait]
impl EvidenceCollector for PortCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Port
    }

    fn name(&self) -> &'static str {
        "bounded port scan with banner grabbing"
    }

    fn applies_to(&self, _host: &HostDescriptor) -> bool {
        true
    }

    async fn collect(&self, host: &HostDescriptor, timeout: Duration) -> CollectOutcome {
        let deadline = Instant::now() + timeout;
        let targets = self.tcp_targets(host);

        let (mut sweep, udp) = tokio::join!(
            self.scan_tcp(host.ip, targets, deadline),
            self.scan_udp(host.ip, deadline)
        );
        sweep.merge(udp);

        debug!(
            ip = %host.ip,
            open = sweep.open.len(),
            refused = sweep.refused,
            deadline_hit = sweep.deadline_hit,
            "port sweep finished"
        );

        let failure = sweep.failure();
        CollectOutcome {
            kind: CollectorKind::Port,
            fragment: EvidenceFragment {
                open_ports: sweep.open,
                ..Default::default()
            },
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_failure_classification() {
        let mut sweep = PortSweep::default();
        sweep.note(ProbeFailure::Refused);
        assert_eq!(sweep.failure(), Some(ProbeFailure::Refused));

        sweep.note(ProbeFailure::Timeout);
        assert_eq!(sweep.failure(), Some(ProbeFailure::NoResponse));

        sweep.open.insert(Port::tcp(22));
        assert_eq!(sweep.failure(), None);

        sweep.deadline_hit = true;
        assert_eq!(sweep.failure(), Some(ProbeFailure::Timeout));
    }

    #[test]
    fn snmp_reply_banner() {
        let mut reply = vec![0x30, 0x3a, 0x02, 0x01, 0x01, 0x04, 0x06];
        reply.extend_from_slice(b"public");
        reply.extend_from_slice(&[0xa2, 0x2d, 0x04, 0x1a]);
        reply.extend_from_slice(b"Linux router 4.14.90 mips");
        assert_eq!(
            printable_banner(&reply, "public").as_deref(),
            Some("Linux router 4.14.90 mips")
        );
    }
}
