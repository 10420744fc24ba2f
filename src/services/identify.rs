// Identify service — one request, one transaction.

use crate::db::ContactDb;
use crate::error::IdentifyError;
use crate::reconcile::reconcile;
use crate::types::{IdentifyRequest, IdentityView};

/// Resolve the identity for `request`, creating and merging contacts as needed.
///
/// Validation happens before the store is touched. Find, create and merge
/// then run inside one `BEGIN IMMEDIATE` transaction, so concurrent requests
/// for the same unseen identifier cannot both create a primary, and a failed
/// merge leaves no partial writes behind.
pub fn identify(db: &ContactDb, request: &IdentifyRequest) -> Result<IdentityView, IdentifyError> {
    let (email, phone_number) = request.identifiers()?;

    let result = db.with_transaction(|tx| reconcile(tx, email, phone_number));
    match &result {
        Ok(view) => log::debug!(
            "Identified primary {} ({} secondaries)",
            view.primary_contact_id,
            view.secondary_contact_ids.len()
        ),
        Err(IdentifyError::Validation) => {}
        Err(e) => log::error!("Identify failed, transaction rolled back: {e}"),
    }
    result
}
