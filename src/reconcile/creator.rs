//! Decide whether a submission carries new information and record it.

use crate::db::{DbContact, NewContact};
use crate::error::IdentifyError;
use crate::store::ContactStore;

use super::Cluster;

/// Create a contact if the submission adds an unseen email or phone number.
///
/// An empty cluster gets a fresh primary. Otherwise a secondary carrying both
/// submitted values is linked to the designated primary. Returns the created
/// record, or `None` when nothing new was submitted and no write happened.
pub fn evaluate<S: ContactStore + ?Sized>(
    store: &S,
    cluster: &mut Cluster,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<Option<DbContact>, IdentifyError> {
    if email.is_none() && phone_number.is_none() {
        return Ok(None);
    }

    if cluster.is_empty() {
        let created = store.create(&NewContact::primary(email, phone_number))?;
        log::info!("Created primary contact {}", created.id);
        cluster.push(created.clone());
        return Ok(Some(created));
    }

    let primary_id = match cluster.designated_primary() {
        Some(primary) => primary.id,
        None => return Ok(None),
    };

    let new_email = email.is_some_and(|e| !cluster.contains_email(e));
    let new_phone = phone_number.is_some_and(|p| !cluster.contains_phone(p));
    if !new_email && !new_phone {
        return Ok(None);
    }

    let created = store.create(&NewContact::secondary(email, phone_number, primary_id))?;
    log::info!(
        "Created secondary contact {} under primary {} (new email: {}, new phone: {})",
        created.id,
        primary_id,
        new_email,
        new_phone
    );
    cluster.push(created.clone());
    Ok(Some(created))
}
