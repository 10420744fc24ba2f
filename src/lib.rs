//! Contact identity reconciliation.
//!
//! Each `POST /identify` submission (an email and/or phone number) is matched
//! against stored contacts. Matches form clusters with exactly one primary;
//! a submission that connects two clusters merges them under the older primary.

pub mod db;
pub mod error;
pub mod http;
mod migrations;
pub mod reconcile;
pub mod services;
pub mod state;
pub mod store;
pub mod types;
