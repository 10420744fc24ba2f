//! Related-contact discovery.
//!
//! Two reads: contacts matching the submitted email or phone, then every
//! member of the clusters those contacts belong to.

use std::collections::BTreeSet;

use crate::error::IdentifyError;
use crate::store::ContactStore;

use super::Cluster;

/// Collect every live contact connected to `email` or `phone_number`.
pub fn find_related<S: ContactStore + ?Sized>(
    store: &S,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<Cluster, IdentifyError> {
    if email.is_none() && phone_number.is_none() {
        return Err(IdentifyError::Validation);
    }

    let direct = store.find_by_email_or_phone(email, phone_number)?;
    if direct.is_empty() {
        return Ok(Cluster::default());
    }

    // A primary names its own cluster; a secondary names it through linked_id
    let primary_ids: Vec<i64> = direct
        .iter()
        .filter_map(|c| if c.is_primary() { Some(c.id) } else { c.linked_id })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut related = store.find_by_ids_or_linked_ids(&primary_ids)?;

    for contact in direct {
        if !related.iter().any(|r| r.id == contact.id) {
            log::warn!(
                "Contact {} matched directly but is not reachable from its primary",
                contact.id
            );
            related.push(contact);
        }
    }

    log::debug!(
        "Found {} related contacts across {} cluster(s)",
        related.len(),
        primary_ids.len()
    );
    Ok(Cluster::new(related))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::{DbError, NewContact};
    use crate::store::test_doubles::FailingStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn ids(cluster: &Cluster) -> Vec<i64> {
        cluster.contacts().iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_requires_an_identifier() {
        let db = test_db();
        assert!(matches!(
            find_related(&db, None, None),
            Err(IdentifyError::Validation)
        ));
    }

    #[test]
    fn test_no_match_is_empty_and_skips_second_read() {
        let db = test_db();
        // Second read would fail; an empty first read must not reach it
        let store = FailingStore::new(&db, 1);
        let cluster = find_related(&store, Some("new@x.io"), None).expect("empty result");
        assert!(cluster.is_empty());
        assert_eq!(store.calls.get(), 1);
    }

    #[test]
    fn test_expands_to_siblings_not_matching_input() {
        let db = test_db();
        let p = db
            .insert_contact_at(&NewContact::primary(Some("lorraine@hillvalley.edu"), Some("123456")), t(0))
            .unwrap();
        let s1 = db
            .insert_contact_at(&NewContact::secondary(Some("mcfly@hillvalley.edu"), Some("123456"), p.id), t(1))
            .unwrap();
        let s2 = db
            .insert_contact_at(&NewContact::secondary(Some("george@hillvalley.edu"), Some("999"), p.id), t(2))
            .unwrap();
        db.insert_contact_at(&NewContact::primary(Some("biff@hillvalley.edu"), Some("000")), t(3))
            .unwrap();

        // Matches only s1 by email; s2 and p come in through the primary
        let cluster = find_related(&db, Some("mcfly@hillvalley.edu"), None).unwrap();
        assert_eq!(ids(&cluster), vec![p.id, s1.id, s2.id]);
    }

    #[test]
    fn test_collects_both_clusters_when_input_bridges_them() {
        let db = test_db();
        let a = db
            .insert_contact_at(&NewContact::primary(Some("george@hillvalley.edu"), Some("919191")), t(0))
            .unwrap();
        let a1 = db
            .insert_contact_at(&NewContact::secondary(Some("g2@hillvalley.edu"), Some("919191"), a.id), t(1))
            .unwrap();
        let b = db
            .insert_contact_at(&NewContact::primary(Some("biffsucks@hillvalley.edu"), Some("717171")), t(2))
            .unwrap();

        let cluster =
            find_related(&db, Some("george@hillvalley.edu"), Some("717171")).unwrap();
        assert_eq!(ids(&cluster), vec![a.id, a1.id, b.id]);
        assert_eq!(cluster.primaries().len(), 2);
    }

    #[test]
    fn test_keeps_unlinked_secondary_that_matched_directly() {
        let db = test_db();
        let orphan = db
            .insert_contact_at(
                &NewContact {
                    linked_id: None,
                    ..NewContact::secondary(Some("orphan@x.io"), None, 0)
                },
                t(0),
            )
            .unwrap();
        let cluster = find_related(&db, Some("orphan@x.io"), None).unwrap();
        assert_eq!(ids(&cluster), vec![orphan.id]);
    }

    #[test]
    fn test_store_failure_propagates() {
        let db = test_db();
        let store = FailingStore::new(&db, 0);
        let result = find_related(&store, Some("a@x.io"), None);
        assert!(matches!(result, Err(IdentifyError::Store(DbError::Sqlite(_)))));
    }
}
