//! Project a cluster into the caller-facing identity view.

use std::collections::{BTreeSet, HashSet};

use crate::db::DbContact;
use crate::error::IdentifyError;
use crate::types::IdentityView;

use super::Cluster;

/// Build the identity view for `cluster`.
///
/// The primary is the single root of the cluster's adjacency map and the
/// secondaries are the ids linked under it. Fails with `Consistency` when the
/// map has no root or several, the root is not a live primary, or some record
/// is not linked under the root; any of these means the stored graph was
/// already broken before this request.
pub fn format_identity(cluster: &Cluster) -> Result<IdentityView, IdentifyError> {
    let (primary, linked) = match sole_root(cluster) {
        Some(found) => found,
        None => {
            log::error!(
                "No single primary for related set (roots {:?}): {:?}",
                cluster.roots().collect::<Vec<_>>(),
                cluster.contacts()
            );
            return Err(IdentifyError::Consistency {
                contact_ids: cluster.contacts().iter().map(|c| c.id).collect(),
            });
        }
    };

    let contacts = cluster.contacts();
    let emails = primary_first(
        primary.email.as_deref(),
        contacts.iter().filter_map(|c| c.email.as_deref()),
    );
    let phone_numbers = primary_first(
        primary.phone_number.as_deref(),
        contacts.iter().filter_map(|c| c.phone_number.as_deref()),
    );
    // Seniority order comes from the record list
    let secondary_contact_ids = contacts
        .iter()
        .filter(|c| linked.contains(&c.id))
        .map(|c| c.id)
        .collect();

    Ok(IdentityView {
        primary_contact_id: primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids,
    })
}

fn sole_root(cluster: &Cluster) -> Option<(&DbContact, &BTreeSet<i64>)> {
    if cluster.root_count() != 1 {
        return None;
    }
    let root = cluster.roots().next()?;
    let primary = cluster.get(root).filter(|c| c.is_primary())?;
    let linked = cluster.secondaries_of(root)?;
    (linked.len() + 1 == cluster.len()).then_some((primary, linked))
}

/// Unique non-empty values in first-seen order, with `first` leading.
fn primary_first<'a>(first: Option<&'a str>, rest: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(rest)
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .map(str::to_string)
        .collect()
}
