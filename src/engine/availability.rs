use crate::model::{Ms, PaymentStatus, Span};

// ── Slot rules ────────────────────────────────────────────────────

/// Hard business rule: the grounds are shut 01:00–05:59. Not configurable.
pub const CLOSED_FROM_HOUR: u8 = 1;
pub const CLOSED_UNTIL_HOUR: u8 = 6;

/// A slot stays bookable for exactly this long after its nominal start.
pub const GRACE_MS: Ms = 30 * 60_000;

pub fn is_closed_hour(hour: u8) -> bool {
    (CLOSED_FROM_HOUR..CLOSED_UNTIL_HOUR).contains(&hour)
}

/// True once `now` has passed the slot's grace window — the slot can no
/// longer be booked due to elapsed time. Evaluated against wall-clock time at
/// query time, never cached.
pub fn grace_elapsed(slot_start: Ms, now: Ms) -> bool {
    now >= slot_start + GRACE_MS
}

// ── Status filters ───────────────────────────────────────────────
//
// Two named predicates, deliberately not one parameterized flag: the public
// availability view and the checkout-time conflict check use different sets.

pub type StatusFilter = fn(PaymentStatus) -> bool;

/// What the public sees: only fully-paid reservations occupy a slot.
pub fn blocks_public(status: PaymentStatus) -> bool {
    matches!(status, PaymentStatus::Paid)
}

/// What booking creation must respect: anything with a live claim on the
/// slot, including checkouts whose payment is still in flight.
pub fn blocks_checkout(status: PaymentStatus) -> bool {
    matches!(
        status,
        PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Paid
    )
}

// ── Hour-set availability ────────────────────────────────────────

/// One requested hour with its absolute span.
pub type HourSlot = (u8, Span);

/// Whether a single hour slot is free, given the busy spans collected from
/// the resource's exclusion group and the block-covered hours for the date.
pub fn hour_available(slot: HourSlot, busy: &[Span], blocked_hours: &[u8], now: Ms) -> bool {
    let (hour, span) = slot;
    !is_closed_hour(hour)
        && !grace_elapsed(span.start, now)
        && !blocked_hours.contains(&hour)
        && !busy.iter().any(|b| b.overlaps(&span))
}

/// Every hour in the set must be individually available; a partial match
/// fails the whole set.
pub fn hours_available(slots: &[HourSlot], busy: &[Span], blocked_hours: &[u8], now: Ms) -> bool {
    slots
        .iter()
        .all(|&slot| hour_available(slot, busy, blocked_hours, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::HOUR_MS;

    fn slot(hour: u8) -> HourSlot {
        let start = Ms::from(hour) * HOUR_MS;
        (hour, Span::new(start, start + HOUR_MS))
    }

    #[test]
    fn closed_hours_never_available() {
        // Hours in [1, 6) are closed whatever the state.
        for h in 0..24u8 {
            let expect_closed = (1..6).contains(&h);
            assert_eq!(is_closed_hour(h), expect_closed, "hour {h}");
            if expect_closed {
                assert!(!hour_available(slot(h), &[], &[], 0));
            }
        }
    }

    #[test]
    fn grace_window_boundary() {
        // Slot starts at 13:00: bookable at 13:25, no longer at 13:35.
        let start = 13 * HOUR_MS;
        let at_13_25 = start + 25 * 60_000;
        let at_13_35 = start + 35 * 60_000;
        assert!(!grace_elapsed(start, at_13_25));
        assert!(grace_elapsed(start, at_13_35));
        // Exactly 30 minutes in counts as elapsed.
        assert!(grace_elapsed(start, start + GRACE_MS));

        assert!(hour_available(slot(13), &[], &[], at_13_25));
        assert!(!hour_available(slot(13), &[], &[], at_13_35));
    }

    #[test]
    fn busy_span_blocks_only_overlapping_hours() {
        let busy = vec![Span::new(14 * HOUR_MS, 15 * HOUR_MS)];
        assert!(!hour_available(slot(14), &busy, &[], 0));
        assert!(hour_available(slot(13), &busy, &[], 0));
        assert!(hour_available(slot(15), &busy, &[], 0)); // edge-touching is fine
    }

    #[test]
    fn blocked_hours_match_exactly() {
        assert!(!hour_available(slot(10), &[], &[10], 0));
        assert!(hour_available(slot(11), &[], &[10], 0));
    }

    #[test]
    fn partial_match_fails_whole_set() {
        let slots = [slot(9), slot(10)];
        let busy = vec![Span::new(10 * HOUR_MS, 11 * HOUR_MS)];
        assert!(!hours_available(&slots, &busy, &[], 0));
        assert!(hours_available(&[slot(9)], &busy, &[], 0));
    }

    #[test]
    fn public_and_checkout_filters_diverge() {
        assert!(blocks_public(PaymentStatus::Paid));
        assert!(!blocks_public(PaymentStatus::Pending));
        assert!(!blocks_public(PaymentStatus::Processing));
        assert!(!blocks_public(PaymentStatus::Failed));

        assert!(blocks_checkout(PaymentStatus::Paid));
        assert!(blocks_checkout(PaymentStatus::Pending));
        assert!(blocks_checkout(PaymentStatus::Processing));
        assert!(!blocks_checkout(PaymentStatus::Failed));
        assert!(!blocks_checkout(PaymentStatus::Refunded));
    }
}
