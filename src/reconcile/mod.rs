//! Identity reconciliation pipeline.
//!
//! One identify request runs four stages against an injected store:
//! [`find_related`] → [`evaluate`] → [`consolidate`] → [`format_identity`].
//! Each stage takes the [`Cluster`] the previous stage produced. The caller is
//! responsible for the transaction boundary (see `services::identify`).

mod cluster;
mod consolidator;
mod creator;
mod finder;
mod formatter;

pub use cluster::Cluster;
pub use consolidator::{consolidate, Consolidation};
pub use creator::evaluate;
pub use finder::find_related;
pub use formatter::format_identity;

use crate::error::IdentifyError;
use crate::store::ContactStore;
use crate::types::IdentityView;

/// Run the full pipeline for one (email, phone) submission.
pub fn reconcile<S: ContactStore + ?Sized>(
    store: &S,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<IdentityView, IdentifyError> {
    let mut cluster = find_related(store, email, phone_number)?;
    evaluate(store, &mut cluster, email, phone_number)?;
    consolidate(store, &mut cluster)?;
    format_identity(&cluster)
}
