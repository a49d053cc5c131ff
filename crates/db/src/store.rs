//! Transactional store over a single SQLite database.
//!
//! The store reproduces the behaviour of an older database host in which a
//! program is always inside a transaction: [`Store::connect`] opens the first
//! transaction, and every [`Store::commit`] or [`Store::rollback`] immediately
//! opens the next one. Each of those is two explicit steps, finishing the
//! current transaction and beginning a new one, so the "exactly one open
//! transaction" rule can be checked at every step.
//!
//! # Usage
//!
//! ```ignore
//! use tollgate_db::store::Store;
//!
//! let mut store = Store::new();
//! store.connect("/var/lib/tollgate/tollgate.sqlite", false).await?;
//!
//! store.exec("UPDATE accounts SET minutes = minutes - ? WHERE uid = ?",
//!     [1_i64.into(), 100_000_i64.into()]).await?;
//! store.commit().await?; // a fresh transaction is already open again
//!
//! store.disconnect().await?; // commits
//! ```
//!
//! Prepared statements are bound to the connection pool rather than to the
//! transaction, so they stay usable across any number of commit cycles.

use std::path::Path;
use std::sync::Arc;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, ExecResult,
    QueryResult, SqlxSqliteConnector, Statement, TransactionTrait, Value,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions as _, Executor, Statement as _};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tollgate_shared::AppError;
use tollgate_shared::config::DatabaseConfig;

/// Physical connections in the pool: one carries the open transaction, the
/// other serves statement preparation.
const POOL_CONNECTIONS: u32 = 2;

/// Store shared by every billing session in the process.
pub type SharedStore = Arc<Mutex<Store>>;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `connect` was called while a connection is open.
    #[error("Database connection is already open")]
    AlreadyOpen,

    /// The operation needs an open connection.
    #[error("Database connection is not open")]
    NotConnected,

    /// The operation needs an open transaction.
    #[error("No transaction is open")]
    NoTransaction,

    /// A transaction was about to begin while another is open.
    #[error("A transaction is already open")]
    TransactionOpen,

    /// The database location is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The database could not be opened.
    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    /// The transaction finished but the next one did not begin. After a
    /// commit, the committed work is durable.
    #[error("Transaction finished but the next one did not begin: {0}")]
    Restart(#[source] Box<StoreError>),

    /// A prepared statement was run with the wrong number of arguments.
    #[error("Statement expects {expected} parameters, got {actual}")]
    ParameterCount {
        /// Parameters declared by the statement.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },

    /// Statement preparation failed.
    #[error("Prepare failed: {0}")]
    Prepare(#[from] sqlx::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyOpen | StoreError::Configuration(_) => {
                Self::Configuration(err.to_string())
            }
            StoreError::NotConnected
            | StoreError::NoTransaction
            | StoreError::TransactionOpen
            | StoreError::ParameterCount { .. } => Self::Internal(err.to_string()),
            StoreError::Connect(_)
            | StoreError::Restart(_)
            | StoreError::Prepare(_)
            | StoreError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// How the open transaction is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Commit,
    Rollback,
}

/// A statement prepared against the connection pool.
///
/// Preparation checks the SQL against the live schema once and records how
/// many parameters it takes. Execution happens inside whichever transaction is
/// open at the time, reusing the connection's statement cache.
#[derive(Debug, Clone)]
pub struct Prepared {
    sql: Arc<str>,
    parameters: usize,
}

impl Prepared {
    /// The statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameters the statement expects.
    #[must_use]
    pub const fn parameters(&self) -> usize {
        self.parameters
    }

    fn bind(&self, values: Vec<Value>) -> Result<Statement, StoreError> {
        if values.len() != self.parameters {
            return Err(StoreError::ParameterCount {
                expected: self.parameters,
                actual: values.len(),
            });
        }
        Ok(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            self.sql.as_ref(),
            values,
        ))
    }
}

/// The single database connection and its single open transaction.
#[derive(Default)]
pub struct Store {
    conn: Option<DatabaseConnection>,
    txn: Option<DatabaseTransaction>,
    read_only: bool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("connected", &self.is_connected())
            .field("in_transaction", &self.in_transaction())
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl Store {
    /// Creates a disconnected store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store and connects it to the configured database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the configured location is
    /// unusable, or any error from [`Store::connect`].
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let path = config
            .path()
            .map_err(|err| StoreError::Configuration(err.to_string()))?;
        let mut store = Self::new();
        store.connect(&path, config.read_only).await?;
        Ok(store)
    }

    /// Wraps the store for sharing between billing sessions.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Opens the connection and the first transaction.
    ///
    /// The database runs in WAL mode with foreign keys enforced. Read-only
    /// mode is advisory: every transaction asks SQLite to refuse writes, but
    /// the preparation connection is left unrestricted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyOpen`] if already connected,
    /// [`StoreError::Configuration`] for an empty path, or the database error
    /// that prevented the connection or the first transaction.
    pub async fn connect(&mut self, path: impl AsRef<Path>, read_only: bool) -> Result<(), StoreError> {
        if self.conn.is_some() {
            return Err(StoreError::AlreadyOpen);
        }
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StoreError::Configuration(
                "database path is empty".to_string(),
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(!read_only)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .disable_statement_logging();
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_CONNECTIONS)
            .min_connections(1)
            .connect_with(options)
            .await
            .map_err(|err| {
                error!(error = %err, path = %path.display(), "Failed to open database");
                StoreError::Connect(err)
            })?;
        info!(path = %path.display(), read_only, "Connected to database");

        self.attach(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool), read_only)
            .await
    }

    /// Takes over an already open connection and begins the first
    /// transaction on it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyOpen`] if already connected, or the error
    /// that prevented the first transaction.
    pub async fn attach(
        &mut self,
        conn: DatabaseConnection,
        read_only: bool,
    ) -> Result<(), StoreError> {
        if self.conn.is_some() {
            return Err(StoreError::AlreadyOpen);
        }
        self.conn = Some(conn);
        self.read_only = read_only;

        self.begin().await
    }

    /// Commits the open transaction and closes the connection.
    ///
    /// Does nothing if the store is not connected. If the commit fails the
    /// connection stays open with no transaction; [`Store::exit`] abandons it.
    ///
    /// # Errors
    ///
    /// Returns the commit or close error.
    pub async fn disconnect(&mut self) -> Result<(), StoreError> {
        if self.conn.is_none() {
            return Ok(());
        }
        if self.txn.is_some() {
            self.finish(Outcome::Commit).await?;
        }
        self.read_only = false;
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        info!("Disconnected from database");
        Ok(())
    }

    /// Abandons the connection: rolls back, closes, and forgets everything.
    ///
    /// Never fails. Meant for process teardown.
    pub async fn exit(&mut self) {
        if let Some(txn) = self.txn.take() {
            if let Err(err) = txn.rollback().await {
                debug!(error = %err, "Ignoring rollback failure on exit");
            }
        }
        if let Some(conn) = self.conn.take() {
            if let Err(err) = conn.close().await {
                debug!(error = %err, "Ignoring close failure on exit");
            }
        }
        self.read_only = false;
    }

    /// Commits the open transaction, then begins the next one.
    ///
    /// # Errors
    ///
    /// If the commit fails no transaction is open afterwards and the error is
    /// returned; the caller decides whether to [`Store::recover`]. If the
    /// commit succeeds but the next transaction cannot begin, the error is
    /// [`StoreError::Restart`] and the committed work stands.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        self.finish(Outcome::Commit).await?;
        self.restart().await
    }

    /// Rolls back the open transaction, then begins the next one.
    ///
    /// # Errors
    ///
    /// Same contract as [`Store::commit`].
    pub async fn rollback(&mut self) -> Result<(), StoreError> {
        self.finish(Outcome::Rollback).await?;
        self.restart().await
    }

    /// Discards whatever the open transaction holds, if any, and begins a
    /// fresh one.
    ///
    /// Restores the one-open-transaction rule after a failed commit.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is open or the new transaction
    /// cannot begin.
    pub async fn recover(&mut self) -> Result<(), StoreError> {
        if let Some(txn) = self.txn.take() {
            if let Err(err) = txn.rollback().await {
                warn!(error = %err, "Rollback failed during recovery");
            }
        }
        self.begin().await
    }

    /// Executes a statement in the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoTransaction`] if no transaction is open, or
    /// the database error.
    pub async fn exec<I>(&self, sql: &str, values: I) -> Result<ExecResult, StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        let txn = self.transaction()?;
        let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
        Ok(txn.execute(stmt).await?)
    }

    /// Runs a query in the open transaction and returns its first row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoTransaction`] if no transaction is open, or
    /// the database error.
    pub async fn query_row<I>(&self, sql: &str, values: I) -> Result<Option<QueryResult>, StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        let txn = self.transaction()?;
        let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
        Ok(txn.query_one(stmt).await?)
    }

    /// Prepares a statement on the connection, independent of the open
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotConnected`] or the preparation error (bad
    /// SQL, missing table).
    pub async fn prepare(&self, sql: &str) -> Result<Prepared, StoreError> {
        let conn = self.connection()?;
        let pool = conn.get_sqlite_connection_pool();
        let statement = pool.prepare(sql).await?;
        let parameters = statement
            .parameters()
            .map_or(0, |params| params.either(|types| types.len(), |count| count));

        debug!(parameters, sql = sql.trim(), "Prepared statement");
        Ok(Prepared {
            sql: Arc::from(sql),
            parameters,
        })
    }

    /// Executes a prepared statement in the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ParameterCount`] for a wrong number of
    /// arguments, [`StoreError::NoTransaction`], or the database error.
    pub async fn exec_prepared(
        &self,
        prepared: &Prepared,
        values: Vec<Value>,
    ) -> Result<ExecResult, StoreError> {
        let stmt = prepared.bind(values)?;
        let txn = self.transaction()?;
        Ok(txn.execute(stmt).await?)
    }

    /// Runs a prepared query in the open transaction and returns its first
    /// row.
    ///
    /// # Errors
    ///
    /// Same as [`Store::exec_prepared`].
    pub async fn query_prepared(
        &self,
        prepared: &Prepared,
        values: Vec<Value>,
    ) -> Result<Option<QueryResult>, StoreError> {
        let stmt = prepared.bind(values)?;
        let txn = self.transaction()?;
        Ok(txn.query_one(stmt).await?)
    }

    /// Returns the open transaction for ORM queries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotConnected`] or [`StoreError::NoTransaction`].
    pub fn transaction(&self) -> Result<&DatabaseTransaction, StoreError> {
        self.connection()?;
        self.txn.as_ref().ok_or(StoreError::NoTransaction)
    }

    /// Whether a connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Whether the store was opened in read-only mode.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn connection(&self) -> Result<&DatabaseConnection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::NotConnected)
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        if self.txn.is_some() {
            return Err(StoreError::TransactionOpen);
        }
        let txn = self.connection()?.begin().await?;
        if self.read_only {
            txn.execute_unprepared("PRAGMA query_only = ON;").await?;
        }
        self.txn = Some(txn);
        debug!("Transaction opened");
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), StoreError> {
        self.begin().await.map_err(|err| {
            error!(error = %err, "Next transaction did not begin");
            StoreError::Restart(Box::new(err))
        })
    }

    async fn finish(&mut self, outcome: Outcome) -> Result<(), StoreError> {
        self.connection()?;
        let txn = self.txn.take().ok_or(StoreError::NoTransaction)?;
        let result = match outcome {
            Outcome::Commit => txn.commit().await,
            Outcome::Rollback => txn.rollback().await,
        };
        if let Err(err) = result {
            error!(error = %err, ?outcome, "Transaction did not finish; none is open now");
            return Err(err.into());
        }
        Ok(())
    }
}
