//! Repository seam between the reconciliation pipeline and contact storage.
//!
//! The pipeline only ever talks to a `&dyn ContactStore` (or a generic `S:
//! ContactStore`), so tests can substitute doubles and no stage reaches for a
//! process-wide client. `ContactDb` is the production implementation.

use chrono::{DateTime, Utc};

use crate::db::{ContactDb, ContactUpdate, DbContact, DbError, NewContact};

pub trait ContactStore {
    /// Live contacts matching `email` or `phone_number`, oldest first.
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<DbContact>, DbError>;

    /// Live contacts whose id or `linked_id` is in `ids`, oldest first.
    fn find_by_ids_or_linked_ids(&self, ids: &[i64]) -> Result<Vec<DbContact>, DbError>;

    fn create(&self, contact: &NewContact) -> Result<DbContact, DbError>;

    fn update_one(&self, id: i64, update: &ContactUpdate) -> Result<(), DbError>;

    /// Re-point every contact linked to `old_linked_id`. Returns rows changed.
    fn update_many_by_linked_id(
        &self,
        old_linked_id: i64,
        new_linked_id: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, DbError>;
}

impl ContactStore for ContactDb {
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<DbContact>, DbError> {
        self.query_contacts_by_email_or_phone(email, phone_number)
    }

    fn find_by_ids_or_linked_ids(&self, ids: &[i64]) -> Result<Vec<DbContact>, DbError> {
        self.query_contacts_in_clusters(ids)
    }

    fn create(&self, contact: &NewContact) -> Result<DbContact, DbError> {
        self.insert_contact(contact)
    }

    fn update_one(&self, id: i64, update: &ContactUpdate) -> Result<(), DbError> {
        if !self.update_contact(id, update)? {
            return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }

    fn update_many_by_linked_id(
        &self,
        old_linked_id: i64,
        new_linked_id: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        self.relink_contacts(old_linked_id, new_linked_id, updated_at)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::{now_utc, LinkPrecedence};

    #[test]
    fn test_update_one_missing_contact_is_an_error() {
        let db = test_db();
        let result = db.update_one(77, &ContactUpdate::demote_to(1, now_utc()));
        assert!(matches!(
            result,
            Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        ));
    }

    #[test]
    fn test_trait_object_round_trip() {
        let db = test_db();
        let store: &dyn ContactStore = &db;
        let created = store
            .create(&NewContact::primary(Some("biff@tannen.co"), None))
            .unwrap();
        assert_eq!(created.link_precedence, LinkPrecedence::Primary);

        let found = store
            .find_by_email_or_phone(Some("biff@tannen.co"), None)
            .unwrap();
        assert_eq!(found, vec![created]);
    }
}
