//! netprint - device fingerprinting for a home-network monitor
//!
//! Given hosts found by a discovery sweep, this library:
//! - gathers port, HTTP, SNMP and mDNS evidence with bounded concurrency
//! - scores the evidence against weighted device signatures
//! - caches identifications and skips unchanged hosts
//! - looks up MAC address vendors

pub mod aggregate;
pub mod cache;
pub mod collect;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod errors;
pub mod model;
pub mod net;
pub mod score;
pub mod signature;
pub mod table;

// Re-export commonly used types for convenience
pub use cache::ResultCache;
pub use collect::{CollectOutcome, EvidenceCollector};
pub use config::{FingerprintConfig, MdnsBackend};
pub use db::oui::MacVendorDatabase;
pub use engine::FingerprintEngine;
pub use errors::{FingerprintError, ProbeFailure};
pub use model::{
    BatchReport, CachedIdentification, DeviceType, HostDescriptor, HostEvidence, HostReport,
    MatchResult,
};
pub use score::MatchScorer;
pub use signature::store::SignatureStore;
