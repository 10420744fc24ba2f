//! Error types for identify requests
//!
//! Errors are classified by who has to act:
//! - Validation: the caller sent nothing to identify by (400)
//! - Consistency: the stored graph broke an invariant before this request (500)
//! - Store: the contact store failed; the request's transaction was rolled back (500)

use thiserror::Error;

use crate::db::DbError;

/// Body text for 400 responses.
pub const VALIDATION_MESSAGE: &str = "At least one of email or phoneNumber is required";

/// Body text for every 500 response. Details stay in the logs.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("At least one of email or phoneNumber is required")]
    Validation,

    #[error("No primary contact among related contacts {contact_ids:?}")]
    Consistency { contact_ids: Vec<i64> },

    #[error("Contact store error: {0}")]
    Store(#[from] DbError),
}

impl IdentifyError {
    /// HTTP status the request boundary answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            IdentifyError::Validation => 400,
            IdentifyError::Consistency { .. } | IdentifyError::Store(_) => 500,
        }
    }

    /// Message safe to show the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            IdentifyError::Validation => VALIDATION_MESSAGE,
            IdentifyError::Consistency { .. } | IdentifyError::Store(_) => INTERNAL_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(IdentifyError::Validation.status_code(), 400);
        assert_eq!(
            IdentifyError::Consistency { contact_ids: vec![1, 2] }.status_code(),
            500
        );
        let store = IdentifyError::from(DbError::Migration("boom".to_string()));
        assert_eq!(store.status_code(), 500);
    }

    #[test]
    fn test_internal_details_are_not_public() {
        let err = IdentifyError::from(DbError::InvalidRow("secret detail".to_string()));
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("secret detail"));
    }

    #[test]
    fn test_validation_message_matches_display() {
        assert_eq!(IdentifyError::Validation.to_string(), VALIDATION_MESSAGE);
        assert_eq!(IdentifyError::Validation.public_message(), VALIDATION_MESSAGE);
    }
}
