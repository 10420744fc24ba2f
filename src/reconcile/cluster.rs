//! In-memory view of the contacts touched by one identify request.
//!
//! Holds the records in seniority order (new records appended) plus an
//! adjacency map from each primary id to the ids linked under it. Every
//! mutation the pipeline makes in the store is mirrored here, so the formatter
//! reads post-merge state without going back to the store.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::db::{DbContact, LinkPrecedence};

#[derive(Debug, Clone, Default)]
pub struct Cluster {
    contacts: Vec<DbContact>,
    links: BTreeMap<i64, BTreeSet<i64>>,
}

impl Cluster {
    /// Build from store rows. Rows are ordered by seniority and de-duplicated by id.
    pub fn new(mut contacts: Vec<DbContact>) -> Self {
        contacts.sort_by_key(DbContact::seniority);
        let mut seen = HashSet::new();
        contacts.retain(|c| seen.insert(c.id));

        let mut cluster = Self {
            contacts,
            links: BTreeMap::new(),
        };
        cluster.rebuild_links();
        cluster
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn contacts(&self) -> &[DbContact] {
        &self.contacts
    }

    pub fn get(&self, id: i64) -> Option<&DbContact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Primaries, most senior first.
    pub fn primaries(&self) -> Vec<&DbContact> {
        let mut primaries: Vec<&DbContact> =
            self.contacts.iter().filter(|c| c.is_primary()).collect();
        primaries.sort_by_key(|c| c.seniority());
        primaries
    }

    /// The primary new secondaries attach to: the first flagged primary, or
    /// the first record if none is flagged.
    pub fn designated_primary(&self) -> Option<&DbContact> {
        self.contacts
            .iter()
            .find(|c| c.is_primary())
            .or_else(|| self.contacts.first())
    }

    pub fn contains_email(&self, email: &str) -> bool {
        self.contacts
            .iter()
            .any(|c| c.email.as_deref() == Some(email))
    }

    pub fn contains_phone(&self, phone_number: &str) -> bool {
        self.contacts
            .iter()
            .any(|c| c.phone_number.as_deref() == Some(phone_number))
    }

    /// Ids linked under `primary_id`.
    pub fn secondaries_of(&self, primary_id: i64) -> Option<&BTreeSet<i64>> {
        self.links.get(&primary_id)
    }

    /// Primary ids the adjacency map is rooted at, ascending.
    pub fn roots(&self) -> impl Iterator<Item = i64> + '_ {
        self.links.keys().copied()
    }

    /// Number of distinct primaries the adjacency map knows about.
    pub fn root_count(&self) -> usize {
        self.links.len()
    }

    /// Append a freshly created record.
    pub fn push(&mut self, contact: DbContact) {
        self.link(&contact);
        self.contacts.push(contact);
    }

    /// Mirror a demotion: `demoted_id` becomes a secondary of `survivor_id`
    /// and everything linked to it moves to `survivor_id`.
    pub fn demote(&mut self, demoted_id: i64, survivor_id: i64, at: DateTime<Utc>) {
        for contact in &mut self.contacts {
            if contact.id == demoted_id {
                contact.linked_id = Some(survivor_id);
                contact.link_precedence = LinkPrecedence::Secondary;
                contact.updated_at = at;
            } else if contact.linked_id == Some(demoted_id) {
                contact.linked_id = Some(survivor_id);
                contact.updated_at = at;
            }
        }

        let moved = self.links.remove(&demoted_id).unwrap_or_default();
        let children = self.links.entry(survivor_id).or_default();
        children.insert(demoted_id);
        children.extend(moved);
    }

    pub fn into_contacts(self) -> Vec<DbContact> {
        self.contacts
    }

    fn rebuild_links(&mut self) {
        self.links.clear();
        let contacts = std::mem::take(&mut self.contacts);
        for contact in &contacts {
            self.link(contact);
        }
        self.contacts = contacts;
    }

    fn link(&mut self, contact: &DbContact) {
        match (contact.link_precedence, contact.linked_id) {
            (LinkPrecedence::Primary, _) => {
                self.links.entry(contact.id).or_default();
            }
            (LinkPrecedence::Secondary, Some(primary_id)) => {
                self.links.entry(primary_id).or_default().insert(contact.id);
            }
            (LinkPrecedence::Secondary, None) => {
                log::warn!("Secondary contact {} has no linked primary", contact.id);
            }
        }
    }
}
