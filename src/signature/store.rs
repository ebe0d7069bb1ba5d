use super::{normalize_service, RuleMatcher, Signature, SignatureDefinition};
use crate::config::FingerprintConfig;
use crate::constants::BUILTIN_SIGNATURES;
use crate::errors::FingerprintError;
use crate::model::{HostEvidence, Protocol};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Tolerance for comparing accumulated weights against thresholds.
pub(crate) const WEIGHT_EPSILON: f64 = 1e-9;

/// A signature that was dropped while loading definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSignature {
    pub id: String,
    pub reason: String,
}

/// Immutable, indexed collection of signatures.
///
/// Built once at startup and shared read-only across every concurrent scan.
#[derive(Debug)]
pub struct SignatureStore {
    signatures: Vec<Signature>,
    by_id: HashMap<String, usize>,
    by_oui: HashMap<String, Vec<usize>>,
    by_port: HashMap<(u16, Protocol), Vec<usize>>,
    http_indicators: Vec<Regex>,
    mdns_services: Vec<String>,
    skipped: Vec<SkippedSignature>,
}

impl SignatureStore {
    /// Load the signature set named by the configuration, or the built-in set.
    pub fn load(config: &FingerprintConfig) -> Result<Self, FingerprintError> {
        match config.signatures_path {
            Some(ref path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self, FingerprintError> {
        Self::from_json(BUILTIN_SIGNATURES)
    }

    pub fn from_file(path: &Path) -> Result<Self, FingerprintError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FingerprintError::SignatureLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let store = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            signatures = store.len(),
            skipped = store.skipped().len(),
            "loaded signature definitions"
        );
        Ok(store)
    }

    /// Parse and compile definitions. Unparsable input or a set without a
    /// single usable signature is an error; individual malformed signatures
    /// are skipped.
    pub fn from_json(raw: &str) -> Result<Self, FingerprintError> {
        let definitions: Vec<SignatureDefinition> = serde_json::from_str(raw)?;
        let mut signatures = Vec::with_capacity(definitions.len());
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for def in definitions {
            let id = def.id.clone();
            if !seen.insert(id.clone()) {
                warn!(signature = %id, "duplicate signature id, keeping the first");
                skipped.push(SkippedSignature {
                    id,
                    reason: "duplicate id".to_string(),
                });
                continue;
            }
            match Signature::compile(def) {
                Ok(sig) => signatures.push(sig),
                Err(e) => {
                    warn!(signature = %id, error = %e, "skipping malformed signature");
                    skipped.push(SkippedSignature {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if signatures.is_empty() {
            return Err(FingerprintError::SignatureLoad(
                "no usable signature definitions".to_string(),
            ));
        }

        let mut store = Self::from_signatures(signatures);
        store.skipped = skipped;
        Ok(store)
    }

    /// Index already-built signatures. Evaluation order is the given order.
    pub fn from_signatures(signatures: Vec<Signature>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_oui: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_port: HashMap<(u16, Protocol), Vec<usize>> = HashMap::new();
        let mut http_indicators: Vec<Regex> = Vec::new();
        let mut mdns_services: Vec<String> = Vec::new();

        for (index, sig) in signatures.iter().enumerate() {
            by_id.entry(sig.id.clone()).or_insert(index);
            for rule in sig.rules() {
                match rule.matcher {
                    RuleMatcher::MacOui(ref r) => {
                        for prefix in &r.prefixes {
                            let slots = by_oui.entry(prefix.clone()).or_default();
                            if slots.last() != Some(&index) {
                                slots.push(index);
                            }
                        }
                    }
                    RuleMatcher::Port(ref r) => {
                        let slots = by_port.entry((r.port, r.protocol)).or_default();
                        if slots.last() != Some(&index) {
                            slots.push(index);
                        }
                    }
                    RuleMatcher::HttpPattern(ref r) => {
                        if !http_indicators
                            .iter()
                            .any(|known| known.as_str() == r.pattern.as_str())
                        {
                            http_indicators.push(r.pattern.clone());
                        }
                    }
                    RuleMatcher::MdnsService(ref r) => {
                        let service = normalize_service(&r.service);
                        if !mdns_services.contains(&service) {
                            mdns_services.push(service);
                        }
                    }
                    RuleMatcher::SnmpOid(_) => {}
                }
            }
        }

        Self {
            signatures,
            by_id,
            by_oui,
            by_port,
            http_indicators,
            mdns_services,
            skipped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Signature> {
        self.by_id.get(id).map(|&i| &self.signatures[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    /// Signatures with a `mac_oui` rule for this six-digit OUI.
    pub fn by_oui(&self, oui: &str) -> Vec<&Signature> {
        self.by_oui
            .get(&oui.to_ascii_uppercase())
            .map(|slots| slots.iter().map(|&i| &self.signatures[i]).collect())
            .unwrap_or_default()
    }

    /// Distinct HTTP patterns across all signatures, scanned for in bodies.
    pub fn http_indicators(&self) -> &[Regex] {
        &self.http_indicators
    }

    /// Service types named by any `mdns_service` rule.
    pub fn mdns_services(&self) -> &[String] {
        &self.mdns_services
    }

    pub fn skipped(&self) -> &[SkippedSignature] {
        &self.skipped
    }

    /// Signatures worth scoring against `evidence`, in evaluation order.
    ///
    /// Order: OUI hits, then open-port hits, then remaining signatures that
    /// could still reach `threshold` without any cheap rule matching. Without
    /// an OUI or open port the whole set is returned in load order.
    pub fn candidates(&self, evidence: &HostEvidence, threshold: f64) -> Vec<&Signature> {
        if evidence.vendor_oui.is_none() && evidence.open_ports.is_empty() {
            return self.signatures.iter().collect();
        }

        let mut taken = vec![false; self.signatures.len()];
        let mut order = Vec::new();

        let mut oui_hits: Vec<usize> = evidence
            .vendor_oui
            .as_deref()
            .and_then(|oui| self.by_oui.get(oui))
            .cloned()
            .unwrap_or_default();
        oui_hits.sort_unstable();

        let mut port_hits: Vec<usize> = evidence
            .open_ports
            .iter()
            .filter_map(|p| self.by_port.get(&(p.number, p.protocol)))
            .flatten()
            .copied()
            .collect();
        port_hits.sort_unstable();

        for index in oui_hits.into_iter().chain(port_hits) {
            if !taken[index] {
                taken[index] = true;
                order.push(index);
            }
        }

        for (index, sig) in self.signatures.iter().enumerate() {
            if !taken[index] && sig.expensive_share() + WEIGHT_EPSILON >= threshold {
                order.push(index);
            }
        }

        order.into_iter().map(|i| &self.signatures[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Port;

    const DEFS: &str = r#"[
      {"id":"a","device_type":"router","manufacturer":"A","model":"A1","rules":[
        {"category":"mac_oui","prefixes":["AA:AA:AA"],"weight":0.5},
        {"category":"http_pattern","pattern":"alpha","weight":0.5}]},
      {"id":"b","device_type":"printer","manufacturer":"B","model":"B1","rules":[
        {"category":"port","port":9100,"weight":0.8},
        {"category":"http_pattern","pattern":"beta","weight":0.2}]},
      {"id":"c","device_type":"speaker","manufacturer":"C","model":"C1","rules":[
        {"category":"mdns_service","service":"_c._tcp","weight":1.0}]}
    ]"#;

    #[test]
    fn narrows_by_oui_and_port() {
        let store = SignatureStore::from_json(DEFS).unwrap();
        let mut evidence = HostEvidence::new("AA:AA:AA:00:00:01");
        evidence.vendor_oui = Some("AAAAAA".to_string());
        evidence.open_ports.insert(Port::tcp(9100));

        let ids: Vec<&str> = store
            .candidates(&evidence, 0.5)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        evidence.open_ports.clear();
        let ids: Vec<&str> = store
            .candidates(&evidence, 0.5)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        // "b" cannot reach 0.5 from its http rule alone
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn no_hint_returns_everything() {
        let store = SignatureStore::from_json(DEFS).unwrap();
        let evidence = HostEvidence::new("00:00:00:00:00:00");
        assert_eq!(store.candidates(&evidence, 0.5).len(), 3);
    }

    #[test]
    fn collects_indicators_and_services() {
        let store = SignatureStore::from_json(DEFS).unwrap();
        let patterns: Vec<&str> = store.http_indicators().iter().map(|r| r.as_str()).collect();
        assert_eq!(patterns, vec!["alpha", "beta"]);
        assert_eq!(store.mdns_services(), &["_c._tcp".to_string()]);
        assert_eq!(store.by_oui("aaaaaa").len(), 1);
    }

    #[test]
    fn malformed_and_duplicate_signatures_are_skipped() {
        let store = SignatureStore::from_json(
            r#"[
              {"id":"ok","device_type":"router","manufacturer":"A","model":"A","rules":[
                {"category":"port","port":80,"weight":1.0}]},
              {"id":"ok","device_type":"router","manufacturer":"A","model":"A","rules":[
                {"category":"port","port":81,"weight":1.0}]},
              {"id":"bad","device_type":"router","manufacturer":"A","model":"A","rules":[
                {"category":"http_pattern","pattern":"[","weight":1.0}]}
            ]"#,
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped().len(), 2);
    }

    #[test]
    fn unusable_definitions_fail_to_load() {
        assert!(SignatureStore::from_json("not json").is_err());
        assert!(matches!(
            SignatureStore::from_json("[]"),
            Err(FingerprintError::SignatureLoad(_))
        ));
    }

    #[test]
    fn builtin_set_loads_cleanly() {
        let store = SignatureStore::builtin().unwrap();
        assert!(store.len() >= 10);
        assert!(store.skipped().is_empty());
    }
}
