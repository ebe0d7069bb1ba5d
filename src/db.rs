use crate::constants::BUILTIN_OUI;
use crate::errors::FingerprintError;
use ::oui::OuiDatabase;
use dashmap::DashMap;
use eui48::MacAddress;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing::warn;

/// OUI (Organizationally Unique Identifier) database for MAC address vendor lookup
pub mod oui {
    use super::*;

    /// Normalize a MAC address to `XX:XX:XX:XX:XX:XX`.
    /// Accepts `:`, `-` and `.` separators or a bare 12-digit hex string.
    pub fn normalize_mac(mac: &str) -> Option<String> {
        let hex: String = mac
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let mut buf = String::with_capacity(17);
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            if i > 0 {
                buf.push(':');
            }
            buf.push_str(&String::from_utf8_lossy(chunk));
        }
        Some(buf.to_uppercase())
    }

    /// First three octets of a MAC (or of an OUI string) as six uppercase hex digits.
    pub fn oui_prefix(mac: &str) -> Option<String> {
        let hex: String = mac
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if hex.len() < 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(hex[..6].to_uppercase())
    }

    /// MAC address vendor database with a concurrent lookup cache.
    /// The underlying OUI table is parsed on first lookup.
    pub struct MacVendorDatabase {
        source: Option<PathBuf>,
        db: OnceCell<OuiDatabase>,
        vendor_cache: DashMap<String, Option<String>>,
    }

    impl MacVendorDatabase {
        /// Vendor database reading `source` (Wireshark manuf layout), or the
        /// built-in table when `source` is `None` or unreadable.
        pub fn new(source: Option<PathBuf>) -> Self {
            Self {
                source,
                db: OnceCell::new(),
                vendor_cache: DashMap::new(),
            }
        }

        fn database(&self) -> Result<&OuiDatabase, FingerprintError> {
            self.db.get_or_try_init(|| {
                if let Some(ref path) = self.source {
                    match path.to_str().map(|p| OuiDatabase::new_from_file(p)) {
                        Some(Ok(db)) => return Ok(db),
                        _ => warn!(
                            path = %path.display(),
                            "failed to load OUI file, using built-in table"
                        ),
                    }
                }
                OuiDatabase::new_from_str(BUILTIN_OUI)
                    .map_err(|e| FingerprintError::OuiDatabaseError(format!("{:?}", e)))
            })
        }

        /// Look up the registered vendor of a MAC address.
        pub fn lookup_vendor(&self, mac: &str) -> Option<String> {
            let clean_mac = normalize_mac(mac)?;
            let key = oui_prefix(&clean_mac)?;

            if let Some(hit) = self.vendor_cache.get(&key) {
                return hit.value().clone();
            }

            let db = match self.database() {
                Ok(db) => db,
                Err(e) => {
                    warn!(error = %e, "OUI database unavailable");
                    return None;
                }
            };

            let vendor = MacAddress::parse_str(&clean_mac)
                .ok()
                .and_then(|addr| db.query_by_mac(&addr).ok().flatten())
                .map(|entry| entry.name_long.clone().unwrap_or(entry.name_short.clone()));

            self.vendor_cache.insert(key, vendor.clone());
            vendor
        }
    }

}
