//! Accounts migration.
//!
//! Creates the subscriber accounts table. Balances are whole minutes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_STATUS_INDEX_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS accounts;")
            .await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    uid INTEGER PRIMARY KEY CHECK (uid BETWEEN 100000 AND 2147483647),
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    encrypt TEXT NOT NULL,
    complimentary TEXT NOT NULL DEFAULT 'N' CHECK (complimentary IN ('Y', 'N')),
    minutes INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'A',
    created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

// Cancelled accounts are looked up on every login.
const ACCOUNTS_STATUS_INDEX_SQL: &str = r"
CREATE INDEX idx_accounts_status ON accounts(status)";
