//! Database layer for Tollgate.
//!
//! This crate provides:
//! - The transactional store: one SQLite connection, always inside a transaction
//! - The account ledger: prepared statements over balances and session records
//! - The session billing engine built on both
//! - `SeaORM` entity definitions
//! - Database migrations

pub mod billing;
pub mod entities;
pub mod ledger;
pub mod migration;
pub mod store;

pub use billing::{Biller, BillingError, Session};
pub use ledger::{Ledger, LedgerError};
pub use store::{Prepared, SharedStore, Store, StoreError};

use tollgate_shared::config::DatabaseConfig;

/// Opens the configured database and wraps the store for sharing.
///
/// # Errors
///
/// Returns an error if the location is misconfigured or the connection
/// cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<SharedStore, StoreError> {
    Ok(Store::open(config).await?.into_shared())
}
