use serde::Serialize;
use std::io;
use thiserror::Error;

/// Errors that abort engine construction or a caller-level operation.
///
/// Per-host and per-collector problems never surface as this type; they are
/// recorded as [`ProbeFailure`] and the host degrades to reduced evidence.
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Signature Load Error: {0}")]
    SignatureLoad(String),

    #[error("Signature Parse Error: {0}")]
    SignatureParse(#[from] serde_json::Error),

    #[error("Malformed rule in signature {signature}: {reason}")]
    MalformedRule { signature: String, reason: String },

    #[error("OUI Database Error: {0}")]
    OuiDatabaseError(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("HTTP Client Error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Error: {0}")]
    Other(String),
}

/// Soft failure of a single evidence collector.
///
/// Recorded next to an empty fragment, never propagated as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    #[error("timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("host unreachable")]
    Unreachable,

    #[error("no response")]
    NoResponse,

    #[error("tool not available: {0}")]
    ToolUnavailable(String),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProbeFailure {
    /// Classify an I/O error from a connect or read into a soft failure.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ProbeFailure::Refused,
            io::ErrorKind::TimedOut => ProbeFailure::Timeout,
            io::ErrorKind::NotFound => ProbeFailure::ToolUnavailable(err.to_string()),
            io::ErrorKind::AddrNotAvailable | io::ErrorKind::NotConnected => {
                ProbeFailure::Unreachable
            }
            _ => ProbeFailure::NoResponse,
        }
    }
}
