//! Database migration runner for Tollgate.
//!
//! Usage:
//!   migrator -u sqlite://$DBPATH/tollgate.sqlite?mode=rwc up
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use sea_orm_migration::prelude::*;
use tollgate_db::migration::Migrator;

#[tokio::main]
async fn main() {
    // DATABASE_URL may come from .env
    dotenvy::dotenv().ok();

    // Sets up its own tracing
    cli::run_cli(Migrator).await;
}
