//! Account ledger accessor.
//!
//! Prepared statements over the accounts and sessions tables. They are
//! prepared once per process and reused across every commit cycle of the
//! [`Store`].

use sea_orm::{DbErr, Value};
use tracing::{debug, error};

use tollgate_shared::types::{AccountId, Product, SessionId};

use crate::store::{Prepared, Store, StoreError};

const INSERT_SESSION_SQL: &str = r"
    INSERT INTO sessions (product, uid, ip_address, minutes)
    VALUES (?, ?, ?, ?)";

const SELECT_COMPLIMENTARY_SQL: &str = r"
    SELECT complimentary
    FROM accounts
    WHERE uid = ?";

const CHARGE_ACCOUNT_SQL: &str = r"
    UPDATE accounts
    SET minutes = minutes - ?
    WHERE uid = ?";

const UPDATE_SESSION_SQL: &str = r#"
    UPDATE sessions
    SET "end" = datetime('now'), minutes = ?
    WHERE sid = ?"#;

const SELECT_STATUS_SQL: &str = r"
    SELECT status
    FROM accounts
    WHERE uid = ?";

/// Account flag value marking a complimentary account.
pub const COMPLIMENTARY: &str = "Y";

/// Account status value marking a cancelled account.
pub const CANCELLED: &str = "X";

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Statements have not been prepared yet.
    #[error("Ledger statements are not prepared")]
    NotPrepared,

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// An update touched other than exactly one row.
    #[error("{statement}: expected to update 1 row, updated {actual} rows")]
    UnexpectedRowCount {
        /// Which statement misbehaved.
        statement: &'static str,
        /// Rows it affected.
        actual: u64,
    },

    /// The database returned a row id that does not fit a session key.
    #[error("Invalid session row id: {0}")]
    InvalidRowId(u64),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Column decoding error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// The statements, present once prepared.
#[derive(Debug)]
struct Statements {
    product: Product,
    insert_session: Prepared,
    select_complimentary: Prepared,
    charge_account: Prepared,
    update_session: Prepared,
    select_status: Prepared,
}

/// Prepared access to account balances and session records.
#[derive(Debug, Default)]
pub struct Ledger {
    statements: Option<Statements>,
}

impl Ledger {
    /// Creates a ledger with nothing prepared.
    #[must_use]
    pub const fn new() -> Self {
        Self { statements: None }
    }

    /// Prepares every statement, recording `product` in new sessions.
    ///
    /// Does nothing if already prepared, whatever the product.
    ///
    /// # Errors
    ///
    /// Returns the preparation error; nothing is kept in that case.
    pub async fn init(&mut self, store: &Store, product: Product) -> Result<(), LedgerError> {
        if self.statements.is_some() {
            return Ok(());
        }

        let statements = Statements {
            product,
            insert_session: store.prepare(INSERT_SESSION_SQL).await?,
            select_complimentary: store.prepare(SELECT_COMPLIMENTARY_SQL).await?,
            charge_account: store.prepare(CHARGE_ACCOUNT_SQL).await?,
            update_session: store.prepare(UPDATE_SESSION_SQL).await?,
            select_status: store.prepare(SELECT_STATUS_SQL).await?,
        };
        self.statements = Some(statements);

        debug!(%product, "Ledger statements prepared");
        Ok(())
    }

    /// Whether [`Ledger::init`] has succeeded.
    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.statements.is_some()
    }

    /// Product recorded in new sessions, once prepared.
    #[must_use]
    pub fn product(&self) -> Option<Product> {
        self.statements.as_ref().map(|s| s.product)
    }

    /// Inserts a session record and returns its key.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotPrepared`] or the database error.
    pub async fn insert_session(
        &self,
        store: &Store,
        account: AccountId,
        address: &str,
        initial_minutes: i64,
    ) -> Result<SessionId, LedgerError> {
        let s = self.statements()?;
        let result = store
            .exec_prepared(
                &s.insert_session,
                vec![
                    Value::from(s.product.code()),
                    Value::from(account.as_i64()),
                    Value::from(address),
                    Value::from(initial_minutes),
                ],
            )
            .await?;

        let row_id = result.last_insert_id();
        let row_id = i64::try_from(row_id).map_err(|_| LedgerError::InvalidRowId(row_id))?;
        Ok(SessionId::from_row_id(row_id))
    }

    /// Reads whether the account is complimentary.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if there is no such account.
    pub async fn lookup_complimentary(
        &self,
        store: &Store,
        account: AccountId,
    ) -> Result<bool, LedgerError> {
        let flag = read_flag(store, &self.statements()?.select_complimentary, account).await?;
        Ok(flag == COMPLIMENTARY)
    }

    /// Reads whether the account has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if there is no such account.
    pub async fn is_cancelled(&self, store: &Store, account: AccountId) -> Result<bool, LedgerError> {
        let status = read_flag(store, &self.statements()?.select_status, account).await?;
        Ok(status == CANCELLED)
    }

    /// Takes `minutes` from the account balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedRowCount`] unless exactly one account
    /// was updated.
    pub async fn charge_account(
        &self,
        store: &Store,
        minutes: i64,
        account: AccountId,
    ) -> Result<(), LedgerError> {
        let s = self.statements()?;
        let result = store
            .exec_prepared(
                &s.charge_account,
                vec![Value::from(minutes), Value::from(account.as_i64())],
            )
            .await?;
        expect_one_row("charge account", result.rows_affected())
    }

    /// Records the session's total charge and stamps its end time.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedRowCount`] unless exactly one session
    /// was updated.
    pub async fn update_session_charge(
        &self,
        store: &Store,
        minutes: i64,
        session: SessionId,
    ) -> Result<(), LedgerError> {
        let s = self.statements()?;
        let result = store
            .exec_prepared(
                &s.update_session,
                vec![Value::from(minutes), Value::from(session.into_inner())],
            )
            .await?;
        expect_one_row("update session", result.rows_affected())
    }

    fn statements(&self) -> Result<&Statements, LedgerError> {
        self.statements.as_ref().ok_or(LedgerError::NotPrepared)
    }
}

/// Reads the single text column selected for `account`.
async fn read_flag(
    store: &Store,
    stmt: &Prepared,
    account: AccountId,
) -> Result<String, LedgerError> {
    let row = store
        .query_prepared(stmt, vec![Value::from(account.as_i64())])
        .await?
        .ok_or(LedgerError::AccountNotFound(account))?;
    Ok(row.try_get_by_index::<String>(0)?)
}

fn expect_one_row(statement: &'static str, actual: u64) -> Result<(), LedgerError> {
    if actual == 1 {
        return Ok(());
    }
    error!(statement, actual, "Expected to update exactly one row");
    Err(LedgerError::UnexpectedRowCount { statement, actual })
}
