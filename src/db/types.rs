//! Shared type definitions for the database layer.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Invalid contact row: {0}")]
    InvalidRow(String),
}

/// Role of a contact inside its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(LinkPrecedence::Primary),
            "secondary" => Some(LinkPrecedence::Secondary),
            _ => None,
        }
    }
}

/// A row from the `contacts` table.
///
/// `linked_id` is only set on secondaries and always names the cluster's
/// current primary. `email` and `phone_number` never change after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbContact {
    pub id: i64,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DbContact {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Seniority key: creation time, then store-assigned id for equal timestamps.
    pub fn seniority(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Values for a contact about to be inserted. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
}

impl NewContact {
    pub fn primary(email: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            email: email.map(str::to_string),
            phone_number: phone_number.map(str::to_string),
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
        }
    }

    pub fn secondary(email: Option<&str>, phone_number: Option<&str>, primary_id: i64) -> Self {
        Self {
            email: email.map(str::to_string),
            phone_number: phone_number.map(str::to_string),
            linked_id: Some(primary_id),
            link_precedence: LinkPrecedence::Secondary,
        }
    }
}

/// Partial update for a single contact. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpdate {
    pub linked_id: Option<i64>,
    pub link_precedence: Option<LinkPrecedence>,
    pub updated_at: DateTime<Utc>,
}

impl ContactUpdate {
    /// Demote a primary under `primary_id`.
    pub fn demote_to(primary_id: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            linked_id: Some(primary_id),
            link_precedence: Some(LinkPrecedence::Secondary),
            updated_at,
        }
    }
}

/// A structural problem found by `ContactDb::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvariantViolation {
    /// Secondary whose `linked_id` is missing or names no live contact.
    #[serde(rename_all = "camelCase")]
    DanglingLink {
        contact_id: i64,
        linked_id: Option<i64>,
    },
    /// Secondary pointing at another secondary (multi-hop chain).
    #[serde(rename_all = "camelCase")]
    ChainedLink { contact_id: i64, linked_id: i64 },
    /// Primary that still carries a `linked_id`.
    #[serde(rename_all = "camelCase")]
    PrimaryWithLink { contact_id: i64, linked_id: i64 },
    /// Records connected by a shared email, phone number or link that hold
    /// more than one primary between them. Ids are in seniority order.
    #[serde(rename_all = "camelCase")]
    MultiplePrimaries { contact_ids: Vec<i64> },
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Current time truncated to the precision the store persists.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 (microseconds, `Z` suffix) so text ordering in SQL
/// matches chronological ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidRow(format!("bad timestamp '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width_and_sortable() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let later = whole + chrono::Duration::microseconds(1);

        let a = format_timestamp(&whole);
        let b = format_timestamp(&later);
        assert_eq!(a, "2026-01-02T03:04:05.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), later);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DbError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_link_precedence_round_trips_text() {
        for p in [LinkPrecedence::Primary, LinkPrecedence::Secondary] {
            assert_eq!(LinkPrecedence::parse(p.as_str()), Some(p));
        }
        assert_eq!(LinkPrecedence::parse("PRIMARY"), None);
    }
}
