use crate::db::oui::normalize_mac;
use crate::model::{CachedIdentification, HostDescriptor, IdentificationEvent};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime};

/// Digest of the scan inputs that decide whether a host needs probing again.
pub fn evidence_hash(host: &HostDescriptor) -> String {
    let mac = cache_key(&host.mac);
    let ports = host
        .known_open_ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let hint = host
        .device_type_hint
        .map(|h| format!("{:?}", h))
        .unwrap_or_default();

    let input = format!("{}|{}|{}|{}", mac, host.ip, ports, hint);
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn cache_key(mac: &str) -> String {
    normalize_mac(mac).unwrap_or_else(|| mac.trim().to_uppercase())
}

/// Last identification per MAC address.
///
/// Written once per completed host scan; every entry replaces the previous
/// one wholesale.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<String, CachedIdentification>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mac: &str) -> Option<CachedIdentification> {
        self.entries
            .get(&cache_key(mac))
            .map(|entry| entry.value().clone())
    }

    /// Store a new identification and return the one it replaced.
    pub fn insert(&self, identification: CachedIdentification) -> Option<CachedIdentification> {
        self.entries
            .insert(cache_key(&identification.mac), identification)
    }

    pub fn remove(&self, mac: &str) -> Option<CachedIdentification> {
        self.entries.remove(&cache_key(mac)).map(|(_, v)| v)
    }

    /// Entry for `mac` if it is younger than `interval` and was computed
    /// from the same inputs.
    pub fn fresh(
        &self,
        mac: &str,
        hash: &str,
        interval: Duration,
        now: SystemTime,
    ) -> Option<CachedIdentification> {
        let entry = self.entries.get(&cache_key(mac))?;
        let age = now.duration_since(entry.timestamp).unwrap_or_default();
        if age < interval && entry.evidence_hash == hash {
            Some(entry.value().clone())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every entry, ordered by MAC.
    pub fn snapshot(&self) -> Vec<CachedIdentification> {
        let mut all: Vec<CachedIdentification> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.mac.cmp(&b.mac));
        all
    }

    /// Drop entries older than `max_age`; returns how many were removed.
    pub fn evict_older_than(&self, max_age: Duration, now: SystemTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            now.duration_since(entry.timestamp)
                .map_or(true, |age| age <= max_age)
        });
        before.saturating_sub(self.entries.len())
    }
}

/// Change worth alerting on between two identifications of the same host.
pub fn identification_event(
    previous: Option<&CachedIdentification>,
    current: &CachedIdentification,
) -> Option<IdentificationEvent> {
    let before = previous.and_then(|p| p.signature_id.clone());
    let after = current.signature_id.clone();

    match (before, after) {
        (None, Some(signature_id)) => Some(IdentificationEvent::Identified {
            mac: current.mac.clone(),
            signature_id,
        }),
        (Some(from), Some(to)) if from != to => Some(IdentificationEvent::Changed {
            mac: current.mac.clone(),
            from,
            to,
        }),
        (Some(previous), None) => Some(IdentificationEvent::Lost {
            mac: current.mac.clone(),
            previous,
        }),
        _ => None,
    }
}
