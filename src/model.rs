use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::pricing::RateTable;

/// Unix milliseconds — the only time type used for interval math.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Stable resource identifier from the catalog (e.g. `ground-a`, `mega`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Payment state of a reservation.
///
/// Only `Paid` blocks public availability. `Pending` and `Processing`
/// additionally block booking creation (see the checkout filter) so two
/// in-flight checkouts cannot claim the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    /// Reachable only through the refund flow, which lives outside this crate.
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// How the booking entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// An authenticated operator. Constructed by the auth layer embedding this
/// crate; holding a value of this type is the capability to perform
/// admin-only operations.
#[derive(Debug, Clone)]
pub struct Operator {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub customer: Customer,
    pub resource: ResourceKey,
    /// Civil date of the booking in the business timezone.
    pub date: NaiveDate,
    /// Consecutive booked hours (0–23), e.g. `[17, 18]`.
    pub hours: Vec<u8>,
    /// Absolute interval covering all booked hours. Always hour-aligned;
    /// `duration_hours` always equals the span length in hours.
    pub span: Span,
    pub duration_hours: u32,
    pub amount: i64,
    pub status: PaymentStatus,
    pub channel: Channel,
    /// Gateway order correlation id. At most one non-null value, ever.
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub method: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub created_at: Ms,
    pub completed_at: Option<Ms>,
}

/// Operator-imposed unavailability for one date + hour slot. Scoped to a
/// single resource, or to all resources when `resource` is `None`.
/// Soft-deleted via `active`, never mutated otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBlock {
    pub id: Ulid,
    pub date: NaiveDate,
    pub hour: u8,
    pub resource: Option<ResourceKey>,
    pub reason: String,
    pub created_by: String,
    pub active: bool,
    pub created_at: Ms,
}

impl AdminBlock {
    pub fn covers(&self, resource: &ResourceKey, date: NaiveDate, hour: u8) -> bool {
        self.active
            && self.date == date
            && self.hour == hour
            && self.resource.as_ref().is_none_or(|r| r == resource)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
    },
    PaymentBegun {
        id: Ulid,
        resource: ResourceKey,
        order_id: String,
    },
    PaymentCaptured {
        id: Ulid,
        resource: ResourceKey,
        payment_id: String,
        signature: String,
        method: Option<String>,
        completed_at: Ms,
    },
    PaymentFailed {
        id: Ulid,
        resource: ResourceKey,
        reason: String,
    },
    ReservationDeleted {
        id: Ulid,
        resource: ResourceKey,
    },
    BlockCreated {
        block: AdminBlock,
    },
    BlockDeactivated {
        id: Ulid,
    },
    RatesUpdated {
        resource: ResourceKey,
        rates: RateTable,
    },
}

/// Per-resource reservation list, sorted by `span.start`.
#[derive(Debug, Clone)]
pub struct ResourceSchedule {
    pub key: ResourceKey,
    pub reservations: Vec<Reservation>,
}

impl ResourceSchedule {
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn get(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            customer: Customer {
                name: "A Customer".into(),
                phone: "+911234567890".into(),
                email: "a@example.com".into(),
            },
            resource: ResourceKey::from("ground-a"),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            hours: vec![10],
            span: Span::new(start, end),
            duration_hours: 1,
            amount: 1000,
            status: PaymentStatus::Pending,
            channel: Channel::Online,
            order_id: None,
            payment_id: None,
            signature: None,
            method: None,
            failure_reason: None,
            attempts: 0,
            created_at: 0,
            completed_at: None,
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn schedule_insert_keeps_order() {
        let mut s = ResourceSchedule::new(ResourceKey::from("ground-a"));
        s.insert(reservation(300, 400));
        s.insert(reservation(100, 200));
        s.insert(reservation(200, 300));
        assert_eq!(s.reservations[0].span.start, 100);
        assert_eq!(s.reservations[1].span.start, 200);
        assert_eq!(s.reservations[2].span.start, 300);
    }

    #[test]
    fn schedule_overlapping_scan() {
        let mut s = ResourceSchedule::new(ResourceKey::from("ground-a"));
        s.insert(reservation(100, 200)); // past
        s.insert(reservation(450, 600)); // hit
        s.insert(reservation(1000, 1100)); // future
        let hits: Vec<_> = s.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn schedule_overlapping_adjacent_excluded() {
        let mut s = ResourceSchedule::new(ResourceKey::from("ground-a"));
        s.insert(reservation(100, 200));
        assert!(s.overlapping(&Span::new(200, 300)).next().is_none());
    }

    #[test]
    fn schedule_remove() {
        let mut s = ResourceSchedule::new(ResourceKey::from("ground-a"));
        let r = reservation(100, 200);
        let id = r.id;
        s.insert(r);
        assert!(s.remove(id).is_some());
        assert!(s.remove(id).is_none());
        assert!(s.reservations.is_empty());
    }

    #[test]
    fn block_covers_scoping() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let scoped = AdminBlock {
            id: Ulid::new(),
            date,
            hour: 14,
            resource: Some(ResourceKey::from("ground-a")),
            reason: "maintenance".into(),
            created_by: "op1".into(),
            active: true,
            created_at: 0,
        };
        assert!(scoped.covers(&ResourceKey::from("ground-a"), date, 14));
        assert!(!scoped.covers(&ResourceKey::from("ground-b"), date, 14));
        assert!(!scoped.covers(&ResourceKey::from("ground-a"), date, 15));

        let unscoped = AdminBlock {
            resource: None,
            ..scoped.clone()
        };
        assert!(unscoped.covers(&ResourceKey::from("ground-b"), date, 14));

        let inactive = AdminBlock {
            active: false,
            ..scoped
        };
        assert!(!inactive.covers(&ResourceKey::from("ground-a"), date, 14));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            reservation: reservation(1000, 2000),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
