//! Property-based invariant tests for the timing gate state machine.
//!
//! Verifies structural guarantees of `TimingGate` under arbitrary event
//! sequences:
//!
//! 1. Never panics on arbitrary pending/settled/poll/advance sequences
//! 2. Emitted signal flips strictly alternate, starting with `true`
//! 3. `is_shown()` always equals the last emitted value (false before any)
//! 4. A deadline is armed iff the state is PendingBelowDelay or
//!    HoldingMinDuration
//! 5. With zero durations the gate is a pure mirror of the raw pending state
//! 6. An armed deadline never lies in the past right after arming
//! 7. Determinism: the same sequence produces the same emissions

use busyline_core::{GateState, TimingGate};
use proptest::prelude::*;
use web_time::{Duration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Pending,
    Settled,
    Advance(u16),
    Poll,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Pending),
        Just(Op::Settled),
        (0u16..=1000).prop_map(Op::Advance),
        Just(Op::Poll),
    ]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(), 0..=60)
}

/// Run a sequence against a gate, collecting emissions and checking the
/// per-step invariants.
fn run(gate: &mut TimingGate, ops: &[Op]) -> Vec<bool> {
    let mut now = Instant::now();
    let mut emissions = Vec::new();
    for op in ops {
        let flip = match op {
            Op::Pending => gate.note_pending(now),
            Op::Settled => gate.note_settled(now),
            Op::Advance(ms) => {
                now += Duration::from_millis(u64::from(*ms));
                None
            }
            Op::Poll => gate.poll(now),
        };
        if let Some(value) = flip {
            emissions.push(value);
        }

        // Invariant 4: deadline armed iff in a waiting state.
        let waiting = matches!(
            gate.state(),
            GateState::PendingBelowDelay | GateState::HoldingMinDuration
        );
        assert_eq!(gate.next_deadline().is_some(), waiting);

        // Invariant 3: is_shown mirrors the last emission.
        let last = emissions.last().copied().unwrap_or(false);
        assert_eq!(gate.is_shown(), last);
    }
    emissions
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Structural invariants under arbitrary sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn never_panics_and_emissions_alternate(
        ops in arb_ops(),
        delay_ms in 0u64..=500,
        min_ms in 0u64..=500,
    ) {
        let mut gate = TimingGate::new(
            Duration::from_millis(delay_ms),
            Duration::from_millis(min_ms),
        );
        let emissions = run(&mut gate, &ops);

        // Invariant 2: flips strictly alternate and start with true.
        for (i, value) in emissions.iter().enumerate() {
            let expected = i % 2 == 0;
            prop_assert_eq!(*value, expected, "emission {} out of order", i);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Zero durations mirror the raw pending state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn zero_durations_mirror_raw_state(ops in arb_ops()) {
        let mut gate = TimingGate::default();
        let mut now = Instant::now();
        let mut raw = false;

        for op in &ops {
            let flip = match op {
                Op::Pending => gate.note_pending(now),
                Op::Settled => gate.note_settled(now),
                Op::Advance(ms) => {
                    now += Duration::from_millis(u64::from(*ms));
                    None
                }
                Op::Poll => gate.poll(now),
            };
            match op {
                Op::Pending => {
                    prop_assert_eq!(flip, if raw { None } else { Some(true) });
                    raw = true;
                }
                Op::Settled => {
                    prop_assert_eq!(flip, if raw { Some(false) } else { None });
                    raw = false;
                }
                Op::Advance(_) | Op::Poll => {
                    prop_assert_eq!(flip, None, "no timers exist at zero durations");
                }
            }
            prop_assert_eq!(gate.is_shown(), raw);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Freshly armed deadlines are in the future
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn armed_deadline_respects_duration(
        delay_ms in 1u64..=500,
        min_ms in 1u64..=500,
    ) {
        let delay = Duration::from_millis(delay_ms);
        let min = Duration::from_millis(min_ms);
        let mut gate = TimingGate::new(delay, min);
        let t0 = Instant::now();

        gate.note_pending(t0);
        prop_assert_eq!(gate.next_deadline(), Some(t0 + delay));

        gate.poll(t0 + delay);
        let settle = t0 + delay + Duration::from_millis(100);
        gate.note_settled(settle);
        prop_assert_eq!(gate.next_deadline(), Some(settle + min));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn same_sequence_same_emissions(
        ops in arb_ops(),
        delay_ms in 0u64..=500,
        min_ms in 0u64..=500,
    ) {
        let delay = Duration::from_millis(delay_ms);
        let min = Duration::from_millis(min_ms);
        let mut first = TimingGate::new(delay, min);
        let mut second = TimingGate::new(delay, min);
        let a = run(&mut first, &ops);
        let b = run(&mut second, &ops);
        prop_assert_eq!(a, b);
    }
}
