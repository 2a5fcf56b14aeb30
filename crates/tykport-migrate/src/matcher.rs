//! Duplicate detection against the Tyk API listing.

use crate::client::TykApiDefinition;
use crate::types::{ApiRecord, MatchPolicy};

/// Whether `existing` has the same identity as `record` under `policy`.
///
/// Comparison is exact string equality; paths and URLs are not normalized,
/// so `/orders` and `/orders/` are different listen paths.
pub fn matches(existing: &TykApiDefinition, record: &ApiRecord, policy: MatchPolicy) -> bool {
    let base = existing.name == record.name && existing.proxy.listen_path == record.listen_path;
    match policy {
        MatchPolicy::NameListenPath => base,
        MatchPolicy::NameListenPathTarget => base && existing.proxy.target_url == record.target_url,
    }
}

/// Whether any definition in `listing` duplicates `record`.
pub fn is_duplicate(listing: &[TykApiDefinition], record: &ApiRecord, policy: MatchPolicy) -> bool {
    listing.iter().any(|api| matches(api, record, policy))
}
