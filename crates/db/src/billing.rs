//! Session billing engine.
//!
//! A [`Biller`] opens billing sessions for authenticated accounts; each
//! [`Session`] then charges the account minute by minute while the caller
//! drives it. Nothing here runs on its own: the caller invokes
//! [`Session::tick`] on whatever cadence it likes, and every decision is taken
//! against the biller's [`Clock`].
//!
//! Charging rules live in [`tollgate_core::billing::Meter`]; this module
//! writes what the meter asks for through the [`Ledger`] and commits it on the
//! shared [`Store`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use tollgate_core::billing::{Clock, Flush, Meter, SystemClock};
use tollgate_shared::AppError;
use tollgate_shared::config::BillingConfig;
use tollgate_shared::types::{AccountId, Product, SessionId};

use crate::ledger::{Ledger, LedgerError};
use crate::store::{SharedStore, Store, StoreError};

/// Error types for billing operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The account to bill does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Ledger error.
    #[error(transparent)]
    Ledger(LedgerError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LedgerError> for BillingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound(account) => Self::AccountNotFound(account),
            LedgerError::Store(err) => Self::Store(err),
            other => Self::Ledger(other),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::AccountNotFound(account) => Self::NotFound(format!("account {account}")),
            BillingError::Ledger(err @ LedgerError::UnexpectedRowCount { .. }) => {
                Self::Internal(err.to_string())
            }
            BillingError::Ledger(err) => Self::Database(err.to_string()),
            BillingError::Store(err) => err.into(),
        }
    }
}

/// Opens billing sessions against one store.
///
/// Cloning is cheap; clones share the store, the prepared ledger, and the
/// free-period switch.
#[derive(Debug, Clone)]
pub struct Biller {
    store: SharedStore,
    ledger: Arc<Ledger>,
    free_period: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Biller {
    /// Prepares the ledger for `product` and returns a biller using the
    /// system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger statements cannot be prepared.
    pub async fn new(store: SharedStore, product: Product) -> Result<Self, BillingError> {
        let mut ledger = Ledger::new();
        ledger.init(&*store.lock().await, product).await?;

        Ok(Self {
            store,
            ledger: Arc::new(ledger),
            free_period: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Builds a biller for the configured product, with the free period
    /// switched on if configured so.
    ///
    /// # Errors
    ///
    /// Same as [`Biller::new`].
    pub async fn from_config(
        store: SharedStore,
        config: &BillingConfig,
    ) -> Result<Self, BillingError> {
        let biller = Self::new(store, config.product).await?;
        if config.free_period {
            biller.set_free_period(true);
        }
        Ok(biller)
    }

    /// Replaces the clock sessions are timed against.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Switches the free period on or off for every session of this biller.
    pub fn set_free_period(&self, on: bool) {
        self.free_period.store(on, Ordering::SeqCst);
        info!(on, "Free period switched");
    }

    /// Whether the free period is on.
    #[must_use]
    pub fn is_free_period(&self) -> bool {
        self.free_period.load(Ordering::SeqCst)
    }

    /// The store sessions write through.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The prepared ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Starts billing `account`, connected from `address`.
    ///
    /// Reserves the minimum charge (unless the account is complimentary or
    /// the free period is on), records the session, and commits. On any
    /// failure the transaction is rolled back and no session exists.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::AccountNotFound`] for an unknown account, or
    /// the ledger/store error that stopped the session from opening.
    pub async fn begin_session(
        &self,
        account: AccountId,
        address: &str,
    ) -> Result<Session, BillingError> {
        let mut store = self.store.lock().await;

        match self.reserve(&mut store, account, address).await {
            Ok((id, complimentary, initial_charge)) => {
                let meter = Meter::start(complimentary, initial_charge, self.clock.now());
                info!(
                    %account,
                    session = %id,
                    address,
                    complimentary,
                    initial_charge,
                    "Billing session started"
                );
                Ok(Session {
                    account,
                    id,
                    meter,
                    biller: self.clone(),
                })
            }
            Err(err) => {
                warn!(%account, error = %err, "Billing session not started");
                reopen(&mut store).await;
                Err(err)
            }
        }
    }

    async fn reserve(
        &self,
        store: &mut Store,
        account: AccountId,
        address: &str,
    ) -> Result<(SessionId, bool, i64), BillingError> {
        let complimentary = self.ledger.lookup_complimentary(store, account).await?;
        let initial_charge = Meter::initial_charge(complimentary, self.is_free_period());

        let id = self
            .ledger
            .insert_session(store, account, address, initial_charge)
            .await?;
        if initial_charge > 0 {
            self.ledger
                .charge_account(store, initial_charge, account)
                .await?;
        }
        commit(store).await?;

        Ok((id, complimentary, initial_charge))
    }
}

/// An open billing session.
///
/// Driven by a single caller; every method takes `&mut self`.
#[derive(Debug)]
pub struct Session {
    account: AccountId,
    id: SessionId,
    meter: Meter,
    biller: Biller,
}

impl Session {
    /// Account being billed.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Key of the session record.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current metering state.
    #[must_use]
    pub const fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Minutes charged and committed so far.
    #[must_use]
    pub const fn last_charge(&self) -> i64 {
        self.meter.last_charge()
    }

    /// Whether the clock is running.
    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.meter.is_ticking()
    }

    /// Resumes billing from now. Does nothing if already running.
    pub fn start_clock(&mut self) {
        if self.meter.resume(self.biller.clock.now()) {
            debug!(session = %self.id, "Clock started");
        }
    }

    /// Bills the time up to now, then pauses. Does nothing if already paused.
    pub async fn stop_clock(&mut self) {
        if self.meter.is_ticking() {
            self.tick().await;
            self.meter.pause();
            debug!(session = %self.id, "Clock stopped");
        }
    }

    /// Accumulates elapsed time and writes the charge if a minute boundary
    /// was crossed or the heartbeat is due.
    ///
    /// Returns false if the write failed. The failed write is rolled back and
    /// the same charge is attempted again on the next tick.
    pub async fn tick(&mut self) -> bool {
        let now = self.biller.clock.now();
        self.meter.accrue(now, self.biller.is_free_period());

        let Some(flush) = self.meter.due(now) else {
            return true;
        };

        let store = Arc::clone(&self.biller.store);
        let mut store = store.lock().await;

        match self.flush(&mut store, flush).await {
            Ok(()) => {
                self.meter.settle(flush, now);
                debug!(
                    session = %self.id,
                    total = flush.total,
                    delta = flush.delta,
                    "Charge flushed"
                );
                true
            }
            Err(err) => {
                warn!(
                    session = %self.id,
                    total = flush.total,
                    delta = flush.delta,
                    error = %err,
                    "Charge not flushed; retrying on next tick"
                );
                reopen(&mut store).await;
                false
            }
        }
    }

    /// Ticks, then returns the minutes charged so far.
    pub async fn time(&mut self) -> i64 {
        self.tick().await;
        self.meter.last_charge()
    }

    /// Final tick; returns the minutes charged for the whole session.
    ///
    /// The session record stays as the billing record of the connection.
    pub async fn end(mut self) -> i64 {
        let minutes = self.time().await;
        info!(account = %self.account, session = %self.id, minutes, "Billing session ended");
        minutes
    }

    async fn flush(&self, store: &mut Store, flush: Flush) -> Result<(), BillingError> {
        let ledger = &self.biller.ledger;
        ledger
            .update_session_charge(store, flush.total, self.id)
            .await?;
        if flush.charges_account() {
            ledger.charge_account(store, flush.delta, self.account).await?;
        }
        commit(store).await?;
        Ok(())
    }
}

/// Commits the store's open transaction.
///
/// A commit that went through counts as done even when the next transaction
/// fails to begin, so the caller settles it exactly once. Reopening is tried
/// once more here; otherwise the next failed write recovers the store.
async fn commit(store: &mut Store) -> Result<(), StoreError> {
    match store.commit().await {
        Err(StoreError::Restart(err)) => {
            warn!(error = %err, "Committed, but no transaction is open");
            reopen(store).await;
            Ok(())
        }
        other => other,
    }
}

async fn reopen(store: &mut Store) {
    if let Err(err) = store.recover().await {
        error!(error = %err, "Could not reopen transaction");
    }
}
