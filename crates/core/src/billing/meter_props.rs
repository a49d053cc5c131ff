//! Property-based tests for the minute meter.
//!
//! - Accumulated seconds never decrease, and stay put while paused
//! - The recorded charge is always floor(seconds / 60)
//! - The charge checkpoint never decreases, even when writes fail
//! - Pausing and resuming at the same instant changes nothing

use proptest::prelude::*;

use super::meter::{Flush, MINIMUM_CHARGE, Meter, SECONDS_PER_MINUTE};

const T0: i64 = 1_700_000_000;

/// One caller action against a meter.
#[derive(Debug, Clone)]
enum Step {
    /// Let wall time pass.
    Advance(i64),
    /// Tick; the write succeeds when `ok` is true.
    Tick { ok: bool },
    /// Stop the clock (forces a tick first).
    Stop,
    /// Start the clock.
    Start,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0i64..400).prop_map(Step::Advance),
        4 => any::<bool>().prop_map(|ok| Step::Tick { ok }),
        1 => Just(Step::Stop),
        1 => Just(Step::Start),
    ]
}

/// Mirrors the engine: accrue, then settle whatever is due if the write works.
fn tick(meter: &mut Meter, now: i64, ok: bool) -> Option<Flush> {
    meter.accrue(now, false);
    let flush = meter.due(now)?;
    if ok {
        meter.settle(flush, now);
    }
    Some(flush)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// *For any* sequence of actions, seconds never decrease, stay constant
    /// while paused, and the checkpoint never decreases.
    #[test]
    fn prop_accumulators_are_monotonic(
        steps in prop::collection::vec(step_strategy(), 1..60),
    ) {
        let mut now = T0;
        let mut meter = Meter::start(false, MINIMUM_CHARGE, now);
        let mut charged = MINIMUM_CHARGE;

        for step in steps {
            let seconds = meter.seconds();
            let checkpoint = meter.last_charge();
            let was_ticking = meter.is_ticking();

            match step {
                Step::Advance(secs) => now += secs,
                Step::Tick { ok } => {
                    if let Some(flush) = tick(&mut meter, now, ok) {
                        prop_assert_eq!(flush.total, meter.charge().max(checkpoint));
                        if ok {
                            charged += flush.delta;
                        }
                    }
                    if !was_ticking {
                        prop_assert_eq!(meter.seconds(), seconds);
                    }
                }
                Step::Stop => {
                    if meter.is_ticking() {
                        if let Some(flush) = tick(&mut meter, now, true) {
                            charged += flush.delta;
                        }
                        meter.pause();
                    }
                }
                Step::Start => {
                    meter.resume(now);
                }
            }

            prop_assert!(meter.seconds() >= seconds);
            prop_assert!(meter.last_charge() >= checkpoint);
        }

        // Every minute charged to the account is accounted for exactly once.
        prop_assert_eq!(charged, meter.last_charge());
        prop_assert!(meter.last_charge() <= (meter.seconds() / SECONDS_PER_MINUTE).max(MINIMUM_CHARGE));
    }

    /// *For any* elapsed time, the due flush total is floor(seconds / 60)
    /// once past the minimum charge.
    #[test]
    fn prop_charge_is_floor_of_minutes(elapsed in 60i64..100_000) {
        let mut meter = Meter::start(false, MINIMUM_CHARGE, T0);
        meter.accrue(T0 + elapsed, false);
        let flush = meter.due(T0 + elapsed).unwrap();
        prop_assert_eq!(flush.total, elapsed / 60);
        prop_assert_eq!(flush.delta, elapsed / 60 - MINIMUM_CHARGE);
    }

    /// *For any* state, stopping and immediately starting the clock with no
    /// elapsed time leaves the meter unchanged apart from a settled flush.
    #[test]
    fn prop_stop_start_at_same_instant_is_invisible(
        elapsed in 0i64..50,
    ) {
        let mut meter = Meter::start(false, MINIMUM_CHARGE, T0);
        meter.accrue(T0 + elapsed, false);
        let before = meter.clone();

        meter.accrue(T0 + elapsed, false);
        meter.pause();
        meter.resume(T0 + elapsed);

        prop_assert_eq!(meter, before);
    }

    /// *For any* elapsed time, a complimentary meter never charges.
    #[test]
    fn prop_complimentary_never_charges(
        advances in prop::collection::vec(0i64..10_000, 1..20),
    ) {
        let mut now = T0;
        let mut meter = Meter::start(true, 0, now);
        for secs in advances {
            now += secs;
            if let Some(flush) = tick(&mut meter, now, true) {
                prop_assert_eq!(flush.delta, 0);
            }
        }
        prop_assert_eq!(meter.seconds(), 0);
        prop_assert_eq!(meter.last_charge(), 0);
    }
}
