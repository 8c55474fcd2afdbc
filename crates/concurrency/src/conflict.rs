//! Write-write conflict detection (spec §4.2).
//!
//! A committing transaction with visibility upper bound `V` and proposed
//! change set `C` conflicts iff some transaction committed after `V` with a
//! change set intersecting `C`. Only fully-committed versions are
//! consulted — `committingChangeSets` never participates, which is what
//! keeps `canCommit` advisory rather than a lock.

use std::collections::BTreeMap;
use std::ops::Bound;
use txn_core::{ChangeId, TxId};

/// Returns the id of the first committed transaction found that conflicts
/// with `proposed`, or `None` if there is no conflict.
///
/// Iterates `committed` from just after `visibility_upper_bound` onward, so
/// cost is proportional to the number of commits since the caller started
/// rather than to the whole retained history.
pub fn find_conflict(
    committed: &BTreeMap<TxId, Vec<ChangeId>>,
    visibility_upper_bound: TxId,
    proposed: &[ChangeId],
) -> Option<TxId> {
    committed
        .range((Bound::Excluded(visibility_upper_bound), Bound::Unbounded))
        .find(|(_, change_set)| change_set.iter().any(|c| proposed.contains(c)))
        .map(|(&id, _)| id)
}
