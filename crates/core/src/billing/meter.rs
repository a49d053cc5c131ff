//! Minute meter for a single connected session.
//!
//! A [`Meter`] is a pure state machine over "now": it accumulates billable
//! seconds while its clock runs, converts them to whole minutes, and decides
//! when the charge must be written out. It never touches the database. The
//! caller performs the write described by a [`Flush`] and reports success
//! through [`Meter::settle`]; until then the durable checkpoint
//! (`last_charge`) stays where it was, so a failed write is simply retried
//! with the same delta on the next tick.

/// Minutes reserved up front when a billable session starts.
pub const MINIMUM_CHARGE: i64 = 1;

/// Seconds between heartbeat writes of an unchanged charge.
pub const FLUSH_INTERVAL_SECS: i64 = 60;

/// Seconds in a billed minute.
pub const SECONDS_PER_MINUTE: i64 = 60;

/// A pending write of the session charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    /// Minutes to record on the session row.
    pub total: i64,
    /// Minutes to take from the account balance (zero for a heartbeat).
    pub delta: i64,
}

impl Flush {
    /// Returns true if this flush charges the account.
    #[must_use]
    pub const fn charges_account(&self) -> bool {
        self.delta > 0
    }
}

/// Billing state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    /// Complimentary accounts accumulate nothing.
    complimentary: bool,
    /// Minutes charged at the last successful flush.
    last_charge: i64,
    /// Billable seconds accumulated so far.
    seconds: i64,
    /// Unix time by which the next heartbeat write is due.
    next_write: i64,
    /// Unix time up to which seconds have been accumulated.
    last_tick: i64,
    /// Whether elapsed time is currently billable.
    ticking: bool,
}

impl Meter {
    /// Returns the charge reserved when a session begins.
    #[must_use]
    pub const fn initial_charge(complimentary: bool, free_period: bool) -> i64 {
        if complimentary || free_period {
            0
        } else {
            MINIMUM_CHARGE
        }
    }

    /// Starts a meter whose `initial_charge` has already been committed.
    ///
    /// The clock starts running immediately.
    #[must_use]
    pub const fn start(complimentary: bool, initial_charge: i64, now: i64) -> Self {
        Self {
            complimentary,
            last_charge: initial_charge,
            seconds: 0,
            next_write: now + FLUSH_INTERVAL_SECS,
            last_tick: now,
            ticking: true,
        }
    }

    /// Resumes accumulation from `now`. Returns false if already running.
    pub fn resume(&mut self, now: i64) -> bool {
        if self.ticking {
            return false;
        }
        self.last_tick = now;
        self.ticking = true;
        true
    }

    /// Stops accumulation. Returns false if already stopped.
    ///
    /// Callers should [`accrue`](Self::accrue) first so the time between the
    /// last tick and the pause is not lost.
    pub fn pause(&mut self) -> bool {
        if !self.ticking {
            return false;
        }
        self.ticking = false;
        true
    }

    /// Accumulates the seconds elapsed since the last tick.
    ///
    /// Complimentary sessions, free periods and paused clocks leave both the
    /// seconds and the last tick alone, so time spent in a free period is
    /// picked up by the first tick after it ends. A clock that steps
    /// backwards bills nothing until it has caught up with the last tick.
    pub fn accrue(&mut self, now: i64, free_period: bool) {
        if !self.ticking || self.complimentary || free_period || now <= self.last_tick {
            return;
        }
        self.seconds += now - self.last_tick;
        self.last_tick = now;
    }

    /// Whole minutes accumulated so far.
    #[must_use]
    pub const fn charge(&self) -> i64 {
        self.seconds / SECONDS_PER_MINUTE
    }

    /// Returns the write due at `now`, if any.
    ///
    /// A write is due when a new minute has been crossed or the heartbeat
    /// deadline has passed. The recorded total never drops below the last
    /// charge, so a heartbeat right after the minimum charge does not undo it.
    #[must_use]
    pub fn due(&self, now: i64) -> Option<Flush> {
        let charge = self.charge();
        if charge > self.last_charge || now >= self.next_write {
            Some(Flush {
                total: charge.max(self.last_charge),
                delta: (charge - self.last_charge).max(0),
            })
        } else {
            None
        }
    }

    /// Records that `flush` was committed at `now`.
    pub fn settle(&mut self, flush: Flush, now: i64) {
        self.last_charge = self.last_charge.max(flush.total);
        self.next_write = now + FLUSH_INTERVAL_SECS;
    }

    /// Minutes charged at the last successful flush.
    #[must_use]
    pub const fn last_charge(&self) -> i64 {
        self.last_charge
    }

    /// Billable seconds accumulated so far.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Unix time the next heartbeat write is due.
    #[must_use]
    pub const fn next_write(&self) -> i64 {
        self.next_write
    }

    /// Unix time of the last accumulation point.
    #[must_use]
    pub const fn last_tick(&self) -> i64 {
        self.last_tick
    }

    /// Whether the clock is running.
    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Whether the session is complimentary.
    #[must_use]
    pub const fn is_complimentary(&self) -> bool {
        self.complimentary
    }
}
