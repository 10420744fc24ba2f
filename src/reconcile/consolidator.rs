//! Merge clusters that one submission has connected.
//!
//! When the related set holds more than one primary, the most senior one
//! (earliest `created_at`, then lowest id) survives. Every other primary is
//! demoted under it and its secondaries are re-pointed directly at the
//! survivor, so links never chain. Because the survivor is always the oldest
//! primary across all merged clusters, the outcome does not depend on which
//! side of the bridge a request arrived from.

use crate::db::{now_utc, ContactUpdate};
use crate::error::IdentifyError;
use crate::store::ContactStore;

use super::Cluster;

/// What a merge changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidation {
    pub survivor_id: i64,
    /// Former primaries, in the order they were demoted.
    pub demoted_ids: Vec<i64>,
    /// Secondaries re-pointed from a demoted primary to the survivor.
    pub repointed: usize,
}

/// Collapse every primary in `cluster` into the most senior one.
///
/// Returns `None` when the cluster already has at most one primary.
pub fn consolidate<S: ContactStore + ?Sized>(
    store: &S,
    cluster: &mut Cluster,
) -> Result<Option<Consolidation>, IdentifyError> {
    let primaries: Vec<i64> = cluster.primaries().iter().map(|c| c.id).collect();
    let (survivor_id, demoted) = match primaries.split_first() {
        Some((first, rest)) if !rest.is_empty() => (*first, rest.to_vec()),
        _ => return Ok(None),
    };

    let now = now_utc();
    let mut repointed = 0;
    for &demoted_id in &demoted {
        store.update_one(demoted_id, &ContactUpdate::demote_to(survivor_id, now))?;
        let moved = store.update_many_by_linked_id(demoted_id, survivor_id, now)?;
        cluster.demote(demoted_id, survivor_id, now);
        repointed += moved;
        log::info!(
            "Demoted primary {} under {} and re-pointed {} secondaries",
            demoted_id,
            survivor_id,
            moved
        );
    }

    Ok(Some(Consolidation {
        survivor_id,
        demoted_ids: demoted,
        repointed,
    }))
}
