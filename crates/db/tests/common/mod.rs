//! Shared fixtures for store, ledger, and billing integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait,
    SqlxSqliteConnector, Statement, Value,
};
use sea_orm_migration::MigratorTrait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use tollgate_db::Store;
use tollgate_db::entities::{accounts, sessions};
use tollgate_db::migration::Migrator;
use tollgate_shared::types::{AccountId, SessionId};

/// A migrated database in a temporary directory, plus a separate connection
/// for checking what the code under test committed.
pub struct TestDb {
    dir: TempDir,
    pub path: PathBuf,
    pub db: DatabaseConnection,
}

/// Creates a fresh database with the production schema.
pub async fn setup() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tollgate.sqlite");

    let db = Database::connect(format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("Failed to open test database");
    db.execute_unprepared("PRAGMA journal_mode = WAL;")
        .await
        .expect("Failed to enable WAL");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    TestDb { dir, path, db }
}

/// Creates an empty database with no tables.
pub async fn setup_empty() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("empty.sqlite");
    let db = Database::connect(format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("Failed to open test database");
    TestDb { dir, path, db }
}

impl TestDb {
    /// Directory holding the database file.
    pub fn dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Connects a store to the test database.
    pub async fn open_store(&self) -> Store {
        let mut store = Store::new();
        store
            .connect(&self.path, false)
            .await
            .expect("Failed to connect store");
        store
    }

    /// Connects a store over a pool the test keeps a handle to.
    pub async fn attach_store(&self) -> (Store, SqlitePool) {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .expect("Failed to open pool");

        let mut store = Store::new();
        store
            .attach(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone()), false)
            .await
            .expect("Failed to attach store");
        (store, pool)
    }

    /// Inserts an account; `complimentary` is `"Y"` or `"N"`.
    pub async fn create_account(&self, uid: u32, complimentary: &str, minutes: i64) -> AccountId {
        self.db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                r"INSERT INTO accounts (uid, name, name_key, encrypt, complimentary, minutes)
                  VALUES (?, ?, ?, 'dummy_hash', ?, ?)",
                [
                    Value::from(i64::from(uid)),
                    Value::from(format!("User{uid}")),
                    Value::from(format!("user{uid}")),
                    Value::from(complimentary),
                    Value::from(minutes),
                ],
            ))
            .await
            .expect("Failed to create test account");
        AccountId::new(uid).expect("Test account id out of range")
    }

    /// Sets an account's status code.
    pub async fn set_status(&self, account: AccountId, status: &str) {
        self.db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "UPDATE accounts SET status = ? WHERE uid = ?",
                [Value::from(status), Value::from(account.as_i64())],
            ))
            .await
            .expect("Failed to set status");
    }

    /// Committed balance of an account.
    pub async fn account_minutes(&self, account: AccountId) -> i64 {
        accounts::Entity::find_by_id(account.as_i64())
            .one(&self.db)
            .await
            .expect("Query should succeed")
            .expect("Account should exist")
            .minutes
    }

    /// Committed session record, if any.
    pub async fn session(&self, id: SessionId) -> Option<sessions::Model> {
        sessions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .expect("Query should succeed")
    }

    /// Number of committed session records.
    pub async fn session_count(&self) -> u64 {
        sessions::Entity::find()
            .count(&self.db)
            .await
            .expect("Query should succeed")
    }

    /// Deletes a session record behind the engine's back.
    pub async fn delete_session(&self, id: SessionId) {
        sessions::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .expect("Failed to delete session");
    }

    /// Restores a session record with a given key.
    pub async fn restore_session(&self, id: SessionId, account: AccountId, minutes: i64) {
        self.db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                r"INSERT INTO sessions (sid, product, uid, ip_address, minutes)
                  VALUES (?, 1, ?, '192.0.2.99', ?)",
                [
                    Value::from(id.into_inner()),
                    Value::from(account.as_i64()),
                    Value::from(minutes),
                ],
            ))
            .await
            .expect("Failed to restore session");
    }
}

/// Closes `pool` to new checkouts. Connections already checked out, such as
/// the one carrying a store's open transaction, keep working.
pub async fn close_pool(pool: &SqlitePool) {
    let closing = pool.clone();
    tokio::spawn(async move { closing.close().await });
    tokio::task::yield_now().await;
    assert!(pool.is_closed());
}
