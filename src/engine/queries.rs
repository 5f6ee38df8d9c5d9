//! Read-side views. Every query snapshots under read locks and evaluates
//! availability against wall-clock "now" — nothing here is cached.

use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::clock::{hour_label, now_ms};
use crate::limits::{HOURS_PER_DAY, MAX_WINDOW_DAYS};
use crate::model::*;
use crate::pricing;

use super::availability::{blocks_public, hour_available, hours_available, HourSlot, StatusFilter};
use super::{BookingError, Engine};

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub hour: u8,
    pub label: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateStatus {
    pub date: NaiveDate,
    pub available: bool,
}

/// One resource's answer to "is this hour set free, and at what price".
#[derive(Debug, Clone, Serialize)]
pub struct ResourceQuote {
    pub resource: ResourceKey,
    pub name: String,
    pub available: bool,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingStats {
    pub total: usize,
    pub paid: usize,
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
    pub refunded: usize,
    pub online: usize,
    pub offline: usize,
    /// Sum of amounts across paid reservations, in minor units.
    pub revenue: i64,
}

impl Engine {
    /// Occupied spans within `window` across `resource`'s exclusion group.
    /// A paid slot on the combined ground occupies both halves and vice versa.
    async fn busy_spans(
        &self,
        resource: &ResourceKey,
        window: &Span,
        filter: StatusFilter,
    ) -> Result<Vec<Span>, BookingError> {
        let mut busy = Vec::new();
        for key in self.catalog.group(resource) {
            let sched = self.schedule_for(&key)?;
            let guard = sched.read().await;
            busy.extend(
                guard
                    .overlapping(window)
                    .filter(|r| filter(r.status))
                    .map(|r| r.span),
            );
        }
        Ok(busy)
    }

    async fn blocked_hours(&self, resource: &ResourceKey, date: NaiveDate) -> Vec<u8> {
        let blocks = self.blocks.read().await;
        (0..HOURS_PER_DAY)
            .filter(|&h| blocks.iter().any(|b| b.covers(resource, date, h)))
            .collect()
    }

    fn hour_slots(&self, date: NaiveDate, hours: &[u8]) -> Vec<HourSlot> {
        hours
            .iter()
            .map(|&h| (h, self.clock.slot_span(date, h)))
            .collect()
    }

    fn day_span(&self, date: NaiveDate) -> Span {
        self.clock.booking_span(date, 0, u32::from(HOURS_PER_DAY))
    }

    /// Public availability for a specific hour set. Only paid reservations
    /// occupy slots here; in-flight checkouts stay invisible.
    pub async fn is_available(
        &self,
        resource: &ResourceKey,
        date: NaiveDate,
        hours: &[u8],
    ) -> Result<bool, BookingError> {
        if !self.catalog.contains(resource) {
            return Err(BookingError::UnknownResource(resource.clone()));
        }
        if hours.is_empty() || hours.iter().any(|&h| h >= HOURS_PER_DAY) {
            return Ok(false);
        }
        let now = now_ms();
        let slots = self.hour_slots(date, hours);
        let busy = self
            .busy_spans(resource, &self.day_span(date), blocks_public)
            .await?;
        let blocked = self.blocked_hours(resource, date).await;
        Ok(hours_available(&slots, &busy, &blocked, now))
    }

    /// All 24 hour slots for a date. A slot is available if at least one
    /// resource can still take it.
    pub async fn available_slots(&self, date: NaiveDate) -> Result<Vec<SlotStatus>, BookingError> {
        let now = now_ms();
        let day = self.day_span(date);

        let mut per_resource = Vec::with_capacity(self.catalog.len());
        for spec in self.catalog.iter() {
            let busy = self.busy_spans(&spec.key, &day, blocks_public).await?;
            let blocked = self.blocked_hours(&spec.key, date).await;
            per_resource.push((busy, blocked));
        }

        let mut out = Vec::with_capacity(usize::from(HOURS_PER_DAY));
        for hour in 0..HOURS_PER_DAY {
            let slot = (hour, self.clock.slot_span(date, hour));
            let available = per_resource
                .iter()
                .any(|(busy, blocked)| hour_available(slot, busy, blocked, now));
            out.push(SlotStatus {
                hour,
                label: hour_label(hour),
                available,
            });
        }
        Ok(out)
    }

    /// Dates from today through the booking window, flagged by whether any
    /// slot on any resource remains open.
    pub async fn available_dates(
        &self,
        window_days: u32,
    ) -> Result<Vec<DateStatus>, BookingError> {
        let days = window_days.min(MAX_WINDOW_DAYS);
        let today = self.clock.date_of(now_ms());
        let mut out = Vec::with_capacity(days as usize);
        for date in self.clock.dates_from(today, days) {
            let slots = self.available_slots(date).await?;
            out.push(DateStatus {
                date,
                available: slots.iter().any(|s| s.available),
            });
        }
        Ok(out)
    }

    /// Every resource quoted for an hour set: availability plus total price.
    pub async fn available_resources(
        &self,
        date: NaiveDate,
        hours: &[u8],
    ) -> Result<Vec<ResourceQuote>, BookingError> {
        let mut out = Vec::with_capacity(self.catalog.len());
        for spec in self.catalog.iter() {
            let available = !hours.is_empty() && self.is_available(&spec.key, date, hours).await?;
            let table = self
                .rates
                .get(&spec.key)
                .map(|e| e.value().clone())
                .unwrap_or_default();
            let total = pricing::total_for_hours(&spec.key, &table, date, hours);
            out.push(ResourceQuote {
                resource: spec.key.clone(),
                name: spec.name.clone(),
                available,
                total,
            });
        }
        Ok(out)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        let resource = self.resource_of(id)?;
        let sched = self.schedule_for(&resource)?;
        let guard = sched.read().await;
        guard.get(id).cloned().ok_or(BookingError::NotFound(id))
    }

    /// All reservations touching a civil date, across every resource, in
    /// start order.
    pub async fn reservations_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError> {
        let day = self.day_span(date);
        let mut out = Vec::new();
        for spec in self.catalog.iter() {
            let sched = self.schedule_for(&spec.key)?;
            let guard = sched.read().await;
            out.extend(guard.overlapping(&day).cloned());
        }
        out.sort_by_key(|r| (r.span.start, r.id));
        Ok(out)
    }

    /// Active blocks covering a date, for operator dashboards.
    pub async fn blocks_for_date(&self, date: NaiveDate) -> Vec<AdminBlock> {
        self.blocks
            .read()
            .await
            .iter()
            .filter(|b| b.active && b.date == date)
            .cloned()
            .collect()
    }

    /// Counts and paid revenue over an inclusive civil-date range.
    pub async fn booking_stats(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BookingStats, BookingError> {
        let mut stats = BookingStats::default();
        for spec in self.catalog.iter() {
            let sched = self.schedule_for(&spec.key)?;
            let guard = sched.read().await;
            for r in &guard.reservations {
                if r.date < from || r.date > to {
                    continue;
                }
                stats.total += 1;
                match r.status {
                    PaymentStatus::Paid => {
                        stats.paid += 1;
                        stats.revenue += r.amount;
                    }
                    PaymentStatus::Pending => stats.pending += 1,
                    PaymentStatus::Processing => stats.processing += 1,
                    PaymentStatus::Failed => stats.failed += 1,
                    PaymentStatus::Refunded => stats.refunded += 1,
                }
                match r.channel {
                    Channel::Online => stats.online += 1,
                    Channel::Offline => stats.offline += 1,
                }
            }
        }
        Ok(stats)
    }
}
