use crate::model::{EvidenceFragment, HostEvidence};

/// Fold one collector's fragment into the host's evidence.
///
/// Sets are unioned and maps extended. Each category has a single producer,
/// so overwriting on a key conflict loses nothing. Nothing is inferred
/// across categories.
pub fn merge_fragment(evidence: &mut HostEvidence, fragment: EvidenceFragment) {
    evidence.open_ports.extend(fragment.open_ports);
    evidence.http_responses.extend(fragment.http_responses);
    evidence.snmp_values.extend(fragment.snmp_values);

    if !fragment.mdns_records.is_empty() {
        evidence.mdns_records.extend(fragment.mdns_records);
        evidence.mdns_records.sort();
        evidence.mdns_records.dedup();
    }

    if fragment.vendor_oui.is_some() {
        evidence.vendor_oui = fragment.vendor_oui;
    }
}

/// Build a host's evidence from all fragments gathered for it.
pub fn aggregate<I>(mac: &str, fragments: I) -> HostEvidence
where
    I: IntoIterator<Item = EvidenceFragment>,
{
    let mut evidence = HostEvidence::new(mac);
    for fragment in fragments {
        merge_fragment(&mut evidence, fragment);
    }
    evidence
}
