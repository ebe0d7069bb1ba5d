use crate::db::oui::oui_prefix;
use crate::errors::FingerprintError;
use crate::model::{DeviceType, HostEvidence, Protocol};
use regex::Regex;
use serde::Deserialize;

pub mod store;

/// Rule categories in evaluation order, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleCategory {
    MacOui,
    Port,
    SnmpOid,
    MdnsService,
    HttpPattern,
}

impl RuleCategory {
    /// Categories answered from data the scheduler already holds.
    pub fn is_cheap(&self) -> bool {
        matches!(self, RuleCategory::MacOui | RuleCategory::Port)
    }
}

/// Matches when the host's OUI equals one of the prefixes
#[derive(Debug, Clone)]
pub struct MacOuiRule {
    /// Six uppercase hex digits each.
    pub prefixes: Vec<String>,
}

/// Matches when the port answered during the scan
#[derive(Debug, Clone)]
pub struct PortRule {
    pub port: u16,
    pub protocol: Protocol,
}

/// Matches a body indicator, `Server` header or page title
#[derive(Debug, Clone)]
pub struct HttpPatternRule {
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct SnmpOidRule {
    pub oid: String,
    pub pattern: Regex,
}

/// Matches an advertised service type, optionally constrained by a TXT value
#[derive(Debug, Clone)]
pub struct MdnsServiceRule {
    pub service: String,
    pub txt_key: Option<String>,
    pub txt_pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub enum RuleMatcher {
    MacOui(MacOuiRule),
    Port(PortRule),
    HttpPattern(HttpPatternRule),
    SnmpOid(SnmpOidRule),
    MdnsService(MdnsServiceRule),
}

impl RuleMatcher {
    pub fn category(&self) -> RuleCategory {
        match self {
            RuleMatcher::MacOui(_) => RuleCategory::MacOui,
            RuleMatcher::Port(_) => RuleCategory::Port,
            RuleMatcher::HttpPattern(_) => RuleCategory::HttpPattern,
            RuleMatcher::SnmpOid(_) => RuleCategory::SnmpOid,
            RuleMatcher::MdnsService(_) => RuleCategory::MdnsService,
        }
    }

    pub fn matches(&self, evidence: &HostEvidence) -> bool {
        match self {
            RuleMatcher::MacOui(rule) => evidence
                .vendor_oui
                .as_deref()
                .map_or(false, |oui| rule.prefixes.iter().any(|p| p == oui)),
            RuleMatcher::Port(rule) => evidence.has_port(rule.port, rule.protocol),
            RuleMatcher::HttpPattern(rule) => evidence.http_responses.values().any(|sample| {
                sample.indicators.contains(rule.pattern.as_str())
                    || sample
                        .server
                        .as_deref()
                        .map_or(false, |s| rule.pattern.is_match(s))
                    || sample
                        .title
                        .as_deref()
                        .map_or(false, |t| rule.pattern.is_match(t))
            }),
            RuleMatcher::SnmpOid(rule) => evidence
                .snmp_values
                .get(&rule.oid)
                .map_or(false, |value| rule.pattern.is_match(value)),
            RuleMatcher::MdnsService(rule) => evidence.mdns_records.iter().any(|record| {
                if !record.service_type.eq_ignore_ascii_case(&rule.service) {
                    return false;
                }
                let Some(ref pattern) = rule.txt_pattern else {
                    return true;
                };
                match rule.txt_key {
                    Some(ref key) => record
                        .txt
                        .get(key)
                        .map_or(false, |value| pattern.is_match(value)),
                    None => {
                        pattern.is_match(&record.instance)
                            || record.txt.values().any(|value| pattern.is_match(value))
                    }
                }
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub weight: f64,
    pub matcher: RuleMatcher,
}

impl Rule {
    pub fn new(id: impl Into<String>, weight: f64, matcher: RuleMatcher) -> Self {
        Self {
            id: id.into(),
            weight,
            matcher,
        }
    }

    pub fn category(&self) -> RuleCategory {
        self.matcher.category()
    }
}

/// A device identity and the weighted rules recognizing it
#[derive(Debug, Clone)]
pub struct Signature {
    pub id: String,
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub model: String,
    rules: Vec<Rule>,
    total_weight: f64,
    defect: Option<String>,
}

impl Signature {
    /// Build a signature; rules are reordered cheap-first, keeping declaration
    /// order within a category.
    pub fn new(
        id: impl Into<String>,
        device_type: DeviceType,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        mut rules: Vec<Rule>,
    ) -> Self {
        rules.sort_by_key(|r| r.category());
        let total_weight = rules.iter().map(|r| r.weight).sum();
        let defect = find_defect(&rules);
        Self {
            id: id.into(),
            device_type,
            manufacturer: manufacturer.into(),
            model: model.into(),
            rules,
            total_weight,
            defect,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Why this signature cannot be scored, if it cannot.
    pub fn defect(&self) -> Option<&str> {
        self.defect.as_deref()
    }

    /// Weight reachable from expensive categories alone, relative to the total.
    pub fn expensive_share(&self) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let expensive: f64 = self
            .rules
            .iter()
            .filter(|r| !r.category().is_cheap())
            .map(|r| r.weight)
            .sum();
        expensive / self.total_weight
    }

    /// Compile a parsed definition, rejecting rules that cannot be evaluated.
    pub fn compile(def: SignatureDefinition) -> Result<Self, FingerprintError> {
        let malformed = |reason: String| FingerprintError::MalformedRule {
            signature: def.id.clone(),
            reason,
        };

        let mut rules = Vec::with_capacity(def.rules.len());
        for (index, rule_def) in def.rules.iter().enumerate() {
            let (id, weight, matcher) = match rule_def {
                RuleDefinition::MacOui {
                    id,
                    prefixes,
                    weight,
                } => {
                    let mut normalized = Vec::with_capacity(prefixes.len());
                    for prefix in prefixes {
                        match oui_prefix(prefix) {
                            Some(p) if prefix.chars().filter(|c| c.is_ascii_hexdigit()).count() == 6 => {
                                normalized.push(p)
                            }
                            _ => return Err(malformed(format!("invalid OUI prefix {:?}", prefix))),
                        }
                    }
                    if normalized.is_empty() {
                        return Err(malformed("mac_oui rule without prefixes".to_string()));
                    }
                    (
                        id,
                        *weight,
                        RuleMatcher::MacOui(MacOuiRule {
                            prefixes: normalized,
                        }),
                    )
                }
                RuleDefinition::Port {
                    id,
                    port,
                    protocol,
                    weight,
                } => (
                    id,
                    *weight,
                    RuleMatcher::Port(PortRule {
                        port: *port,
                        protocol: *protocol,
                    }),
                ),
                RuleDefinition::HttpPattern {
                    id,
                    pattern,
                    weight,
                } => (
                    id,
                    *weight,
                    RuleMatcher::HttpPattern(HttpPatternRule {
                        pattern: compile_pattern(pattern).map_err(malformed)?,
                    }),
                ),
                RuleDefinition::SnmpOid {
                    id,
                    oid,
                    pattern,
                    weight,
                } => (
                    id,
                    *weight,
                    RuleMatcher::SnmpOid(SnmpOidRule {
                        oid: oid.trim_start_matches('.').to_string(),
                        pattern: compile_pattern(pattern).map_err(malformed)?,
                    }),
                ),
                RuleDefinition::MdnsService {
                    id,
                    service,
                    txt_key,
                    txt_pattern,
                    weight,
                } => {
                    let txt_pattern = match txt_pattern {
                        Some(p) => Some(compile_pattern(p).map_err(malformed)?),
                        None => None,
                    };
                    (
                        id,
                        *weight,
                        RuleMatcher::MdnsService(MdnsServiceRule {
                            service: normalize_service(service),
                            txt_key: txt_key.clone(),
                            txt_pattern,
                        }),
                    )
                }
            };

            let id = id
                .clone()
                .unwrap_or_else(|| format!("{}/{}", def.id, index));
            rules.push(Rule::new(id, weight, matcher));
        }

        let signature = Signature::new(
            def.id.clone(),
            def.device_type,
            def.manufacturer.clone(),
            def.model.clone(),
            rules,
        );
        if let Some(reason) = signature.defect() {
            return Err(malformed(reason.to_string()));
        }
        Ok(signature)
    }
}

fn find_defect(rules: &[Rule]) -> Option<String> {
    if rules.is_empty() {
        return Some("signature has no rules".to_string());
    }
    rules
        .iter()
        .find(|r| !(r.weight.is_finite() && r.weight > 0.0 && r.weight <= 1.0))
        .map(|r| format!("rule {} has weight {} outside (0, 1]", r.id, r.weight))
}

fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }
    Regex::new(pattern).map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))
}

/// `_ipp._tcp.local.` and `_ipp._tcp` name the same service type.
pub fn normalize_service(service: &str) -> String {
    service
        .trim_end_matches('.')
        .trim_end_matches(".local")
        .to_ascii_lowercase()
}

/// Signature as written in a definition file
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureDefinition {
    pub id: String,
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub model: String,
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuleDefinition {
    MacOui {
        #[serde(default)]
        id: Option<String>,
        prefixes: Vec<String>,
        weight: f64,
    },
    Port {
        #[serde(default)]
        id: Option<String>,
        port: u16,
        #[serde(default)]
        protocol: Protocol,
        weight: f64,
    },
    HttpPattern {
        #[serde(default)]
        id: Option<String>,
        pattern: String,
        weight: f64,
    },
    SnmpOid {
        #[serde(default)]
        id: Option<String>,
        oid: String,
        pattern: String,
        weight: f64,
    },
    MdnsService {
        #[serde(default)]
        id: Option<String>,
        service: String,
        #[serde(default)]
        txt_key: Option<String>,
        #[serde(default)]
        txt_pattern: Option<String>,
        weight: f64,
    },
}
