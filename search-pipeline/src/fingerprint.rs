use sha2::{Digest, Sha256};

use crate::{Pagination, SearchFilters};

/// Lowercase, collapse internal whitespace, strip leading and trailing
/// punctuation. Applied identically to queries and index keys.
pub fn normalize_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string()
}

/// Stable hash of the canonical request: normalized query, sorted
/// filters, pagination window, and the live-evidence flag. Equal
/// requests always map to the same cache key.
pub fn fingerprint(
    normalized_query: &str,
    filters: &SearchFilters,
    pagination: &Pagination,
    want_live_evidence: bool,
) -> String {
    let mut phases: Vec<&str> = filters
        .phase_in
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|phase| phase.as_str())
        .collect();
    phases.sort_unstable();

    let canonical = format!(
        "q={normalized_query}|oncology={}|min_confidence={}|phases={}|offset={}|limit={}|live={}",
        filters.oncology_only,
        filters
            .min_confidence
            .map_or_else(|| "none".to_string(), |c| format!("{c:.4}")),
        phases.join(","),
        pagination.offset,
        pagination.limit,
        want_live_evidence,
    );

    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
