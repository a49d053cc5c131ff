//! Sessions migration for connection billing.
//!
//! Creates the sessions table. One row per billed connection; the row is
//! updated on every flush and kept afterwards as the billing record.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SESSIONS_SQL).await?;
        db.execute_unprepared(SESSIONS_ACCOUNT_INDEX_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS sessions;")
            .await?;
        Ok(())
    }
}

const SESSIONS_SQL: &str = r#"
CREATE TABLE sessions (
    sid INTEGER PRIMARY KEY AUTOINCREMENT,
    product INTEGER NOT NULL DEFAULT 0,
    uid INTEGER NOT NULL REFERENCES accounts(uid),
    ip_address TEXT NOT NULL,
    minutes INTEGER NOT NULL DEFAULT 0,
    start TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    "end" TEXT
)"#;

// Usage reports list an account's sessions, newest first.
const SESSIONS_ACCOUNT_INDEX_SQL: &str = r"
CREATE INDEX idx_sessions_uid ON sessions(uid, sid DESC)";
