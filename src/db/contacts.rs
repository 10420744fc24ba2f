use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Type, OptionalExtension};

use super::*;

const CONTACT_COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at, deleted_at";

impl ContactDb {
    // =========================================================================
    // Contacts
    // =========================================================================

    /// Live contacts whose email or phone number equals the given value.
    /// Each filter applies only when its value is present; with neither
    /// present nothing matches.
    pub fn query_contacts_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<DbContact>, DbError> {
        if email.is_none() && phone_number.is_none() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL
               AND ((?1 IS NOT NULL AND email = ?1)
                 OR (?2 IS NOT NULL AND phone_number = ?2))
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![email, phone_number], Self::map_contact_row)?;
        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }

    /// Live contacts that either are one of `ids` or link to one of them.
    pub fn query_contacts_in_clusters(&self, ids: &[i64]) -> Result<Vec<DbContact>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL
               AND (id IN ({placeholders}) OR linked_id IN ({placeholders}))
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), Self::map_contact_row)?;
        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }

    /// Insert a contact stamped with the current time.
    pub fn insert_contact(&self, contact: &NewContact) -> Result<DbContact, DbError> {
        self.insert_contact_at(contact, now_utc())
    }

    /// Insert a contact with an explicit creation time. `created_at` and
    /// `updated_at` both take `at`.
    pub fn insert_contact_at(
        &self,
        contact: &NewContact,
        at: DateTime<Utc>,
    ) -> Result<DbContact, DbError> {
        let stamp = format_timestamp(&at);
        self.conn.execute(
            "INSERT INTO contacts (email, phone_number, linked_id, link_precedence, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                contact.email,
                contact.phone_number,
                contact.linked_id,
                contact.link_precedence.as_str(),
                stamp,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_contact(id)?
            .ok_or_else(|| DbError::InvalidRow(format!("contact {id} vanished after insert")))
    }

    /// Apply a partial update to one contact. Returns false if no live row matched.
    pub fn update_contact(&self, id: i64, update: &ContactUpdate) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE contacts
             SET linked_id = COALESCE(?1, linked_id),
                 link_precedence = COALESCE(?2, link_precedence),
                 updated_at = ?3
             WHERE id = ?4 AND deleted_at IS NULL",
            params![
                update.linked_id,
                update.link_precedence.map(|p| p.as_str()),
                format_timestamp(&update.updated_at),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Point every live contact linked to `old_linked_id` at `new_linked_id`.
    /// Returns the number of rows re-pointed.
    pub fn relink_contacts(
        &self,
        old_linked_id: i64,
        new_linked_id: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE contacts SET linked_id = ?1, updated_at = ?2
             WHERE linked_id = ?3 AND deleted_at IS NULL",
            params![new_linked_id, format_timestamp(&updated_at), old_linked_id],
        )?;
        Ok(changed)
    }

    /// Look up a live contact by id.
    pub fn get_contact(&self, id: i64) -> Result<Option<DbContact>, DbError> {
        let sql =
            format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1 AND deleted_at IS NULL");
        let contact = self
            .conn
            .query_row(&sql, params![id], Self::map_contact_row)
            .optional()?;
        Ok(contact)
    }

    /// All live contacts, oldest first.
    pub fn list_contacts(&self) -> Result<Vec<DbContact>, DbError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_contact_row)?;
        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }

    /// Scan every live contact for link-structure problems.
    ///
    /// An empty result means each secondary points directly at a live primary,
    /// no primary carries a link, and every group of records connected by a
    /// shared email, phone number or link has at most one primary.
    pub fn check_invariants(&self) -> Result<Vec<InvariantViolation>, DbError> {
        let contacts = self.list_contacts()?;
        let by_id: HashMap<i64, &DbContact> = contacts.iter().map(|c| (c.id, c)).collect();

        let mut violations = Vec::new();
        for contact in &contacts {
            match (contact.link_precedence, contact.linked_id) {
                (LinkPrecedence::Primary, Some(linked_id)) => {
                    violations.push(InvariantViolation::PrimaryWithLink {
                        contact_id: contact.id,
                        linked_id,
                    });
                }
                (LinkPrecedence::Primary, None) => {}
                (LinkPrecedence::Secondary, None) => {
                    violations.push(InvariantViolation::DanglingLink {
                        contact_id: contact.id,
                        linked_id: None,
                    });
                }
                (LinkPrecedence::Secondary, Some(linked_id)) => match by_id.get(&linked_id) {
                    None => violations.push(InvariantViolation::DanglingLink {
                        contact_id: contact.id,
                        linked_id: Some(linked_id),
                    }),
                    Some(target) if !target.is_primary() => {
                        violations.push(InvariantViolation::ChainedLink {
                            contact_id: contact.id,
                            linked_id,
                        });
                    }
                    Some(_) => {}
                },
            }
        }

        for contact_ids in primaries_per_component(&contacts) {
            if contact_ids.len() > 1 {
                violations.push(InvariantViolation::MultiplePrimaries { contact_ids });
            }
        }
        Ok(violations)
    }

    fn map_contact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbContact> {
        let precedence: String = row.get(4)?;
        let link_precedence = LinkPrecedence::parse(&precedence).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown link precedence '{precedence}'").into(),
            )
        })?;
        let deleted_at = row
            .get::<_, Option<String>>(7)?
            .map(|s| Self::timestamp_column(7, &s))
            .transpose()?;

        Ok(DbContact {
            id: row.get(0)?,
            email: row.get(1)?,
            phone_number: row.get(2)?,
            linked_id: row.get(3)?,
            link_precedence,
            created_at: Self::timestamp_column(5, &row.get::<_, String>(5)?)?,
            updated_at: Self::timestamp_column(6, &row.get::<_, String>(6)?)?,
            deleted_at,
        })
    }

    fn timestamp_column(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
        parse_timestamp(value).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
    }
}

/// Primary ids of each connected component, in seniority order.
///
/// Records join a component when they share an email, a phone number, or a
/// `linked_id` edge to a live record. `contacts` must already be in seniority
/// order.
fn primaries_per_component(contacts: &[DbContact]) -> Vec<Vec<i64>> {
    let mut parent: Vec<usize> = (0..contacts.len()).collect();
    let index: HashMap<i64, usize> = contacts.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let mut first_email: HashMap<&str, usize> = HashMap::new();
    let mut first_phone: HashMap<&str, usize> = HashMap::new();

    for (i, contact) in contacts.iter().enumerate() {
        if let Some(email) = contact.email.as_deref() {
            let j = *first_email.entry(email).or_insert(i);
            union(&mut parent, i, j);
        }
        if let Some(phone) = contact.phone_number.as_deref() {
            let j = *first_phone.entry(phone).or_insert(i);
            union(&mut parent, i, j);
        }
        if let Some(&j) = contact.linked_id.and_then(|id| index.get(&id)) {
            union(&mut parent, i, j);
        }
    }

    let mut components: Vec<Vec<i64>> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for (i, contact) in contacts.iter().enumerate() {
        if !contact.is_primary() {
            continue;
        }
        let root = find(&mut parent, i);
        let k = *slot.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[k].push(contact.id);
    }
    components
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}
