//! Cache key computation (spec §4.11): `hash(analysisType ||
//! sorted(fileFingerprints) || normalized(query))`.

use reasoning_core::model::AnalysisType;
use sha2::{Digest, Sha256};

/// Normalize a query string for fingerprinting: trim and lowercase, so
/// cosmetic differences (casing, leading/trailing whitespace) don't
/// produce cache misses.
fn normalize_query(query: &str) -> String {
    query.trim().to_ascii_lowercase()
}

/// Compute the cache key for a request. `file_fingerprints` should be one
/// entry per file in `context.focus.files`, typically `"path:content_hash"`
/// or similar — this function only sorts and hashes whatever it is given.
pub fn fingerprint(analysis_type: AnalysisType, file_fingerprints: &[String], query: &str) -> String {
    let mut sorted = file_fingerprints.to_vec();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(analysis_type.as_str().as_bytes());
    hasher.update(b"|");
    for fp in &sorted {
        hasher.update(fp.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"|");
    hasher.update(normalize_query(query).as_bytes());

    format!("{:x}", hasher.finalize())
}
