mod availability;
mod conflict;
mod error;
mod lifecycle;
mod queries;

pub use availability::{
    blocks_checkout, blocks_public, grace_elapsed, hour_available, hours_available,
    is_closed_hour, StatusFilter, GRACE_MS,
};
pub use error::{BookingError, ErrorKind};
pub use lifecycle::NewReservation;
pub use queries::{BookingStats, DateStatus, ResourceQuote, SlotStatus};

use std::io;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use ulid::Ulid;

use crate::catalog::Catalog;
use crate::clock::BusinessClock;
use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::model::*;
use crate::observability;
use crate::pricing::RateTable;
use crate::wal::Wal;

pub type SharedSchedule = Arc<RwLock<ResourceSchedule>>;

/// The booking engine: all slot-occupancy state, guarded per resource, with
/// every write persisted to the WAL before it is applied.
pub struct Engine {
    pub(super) catalog: Arc<Catalog>,
    pub(super) clock: BusinessClock,
    pub(super) currency: String,
    pub(super) gateway_secret: String,
    pub(super) booking_window_days: u32,
    /// One schedule per catalog resource. The resource set is fixed at boot.
    pub(super) schedules: DashMap<ResourceKey, SharedSchedule>,
    /// Reverse lookup: reservation id → resource key.
    pub(super) index: DashMap<Ulid, ResourceKey>,
    /// Admin blocks, scoped or global. Written only by operator actions.
    pub(super) blocks: RwLock<Vec<AdminBlock>>,
    /// Live rate tables, seeded from the catalog, updated by operators.
    pub(super) rates: DashMap<ResourceKey, RateTable>,
    wal: Mutex<Wal>,
    pub(super) gateway: Arc<dyn PaymentGateway>,
}

/// Apply a reservation-scoped event to a schedule (no locking — caller holds
/// the write lock). Used identically by replay and live mutations.
fn apply_to_schedule(sched: &mut ResourceSchedule, event: &Event, index: &DashMap<Ulid, ResourceKey>) {
    match event {
        Event::ReservationCreated { reservation } => {
            index.insert(reservation.id, reservation.resource.clone());
            sched.insert(reservation.clone());
        }
        Event::PaymentBegun { id, order_id, .. } => {
            if let Some(r) = sched.get_mut(*id) {
                r.order_id = Some(order_id.clone());
                r.status = PaymentStatus::Processing;
            }
        }
        Event::PaymentCaptured {
            id,
            payment_id,
            signature,
            method,
            completed_at,
            ..
        } => {
            if let Some(r) = sched.get_mut(*id) {
                r.status = PaymentStatus::Paid;
                r.payment_id = Some(payment_id.clone());
                r.signature = Some(signature.clone());
                r.method = method.clone();
                r.completed_at = Some(*completed_at);
                r.attempts += 1;
            }
        }
        Event::PaymentFailed { id, reason, .. } => {
            if let Some(r) = sched.get_mut(*id) {
                r.status = PaymentStatus::Failed;
                r.failure_reason = Some(reason.clone());
                r.attempts += 1;
            }
        }
        Event::ReservationDeleted { id, .. } => {
            sched.remove(*id);
            index.remove(id);
        }
        // Blocks and rates are engine-level, not schedule-level.
        Event::BlockCreated { .. } | Event::BlockDeactivated { .. } | Event::RatesUpdated { .. } => {}
    }
}

/// Extract the resource key from a reservation-scoped event.
fn event_resource(event: &Event) -> Option<&ResourceKey> {
    match event {
        Event::ReservationCreated { reservation } => Some(&reservation.resource),
        Event::PaymentBegun { resource, .. }
        | Event::PaymentCaptured { resource, .. }
        | Event::PaymentFailed { resource, .. }
        | Event::ReservationDeleted { resource, .. } => Some(resource),
        Event::BlockCreated { .. } | Event::BlockDeactivated { .. } | Event::RatesUpdated { .. } => {
            None
        }
    }
}

impl Engine {
    pub fn new(
        catalog: Arc<Catalog>,
        config: &Config,
        gateway: Arc<dyn PaymentGateway>,
    ) -> io::Result<Self> {
        let clock = BusinessClock::new(config.utc_offset_minutes).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid UTC offset")
        })?;

        let wal_path = config.wal_path();
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;

        let engine = Self {
            clock,
            currency: config.currency.clone(),
            gateway_secret: config.gateway_secret.clone(),
            booking_window_days: config.booking_window_days,
            schedules: DashMap::new(),
            index: DashMap::new(),
            blocks: RwLock::new(Vec::new()),
            rates: DashMap::new(),
            wal: Mutex::new(wal),
            gateway,
            catalog,
        };

        for spec in engine.catalog.iter() {
            engine.schedules.insert(
                spec.key.clone(),
                Arc::new(RwLock::new(ResourceSchedule::new(spec.key.clone()))),
            );
            engine.rates.insert(spec.key.clone(), spec.rates.clone());
        }

        // Replay — we're the sole owner of these locks, so try_write always
        // succeeds instantly. Never blocking_write here: new() may run inside
        // an async context.
        for event in &events {
            engine.replay_event(event);
        }
        tracing::info!(events = events.len(), "WAL replay complete");

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::BlockCreated { block } => {
                let mut blocks = self
                    .blocks
                    .try_write()
                    .expect("replay: uncontended write");
                blocks.push(block.clone());
            }
            Event::BlockDeactivated { id } => {
                let mut blocks = self
                    .blocks
                    .try_write()
                    .expect("replay: uncontended write");
                if let Some(b) = blocks.iter_mut().find(|b| b.id == *id) {
                    b.active = false;
                }
            }
            Event::RatesUpdated { resource, rates } => {
                if self.catalog.contains(resource) {
                    self.rates.insert(resource.clone(), rates.clone());
                } else {
                    tracing::warn!(%resource, "replay: rates for resource not in catalog, skipped");
                }
            }
            other => {
                let Some(resource) = event_resource(other) else {
                    return;
                };
                match self.schedules.get(resource) {
                    Some(entry) => {
                        let sched = entry.value().clone();
                        let mut guard = sched.try_write().expect("replay: uncontended write");
                        apply_to_schedule(&mut guard, other, &self.index);
                    }
                    None => {
                        tracing::warn!(%resource, "replay: event for resource not in catalog, skipped")
                    }
                }
            }
        }
    }

    /// Write event to the WAL, fsynced before returning.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let start = std::time::Instant::now();
        let mut wal = self.wal.lock().await;
        let result = wal.append(event).map_err(|e| BookingError::Wal(e.to_string()));
        metrics::histogram!(observability::WAL_APPEND_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        result
    }

    /// WAL-append + apply in one call, under the caller's write lock.
    pub(super) async fn persist_and_apply(
        &self,
        sched: &mut ResourceSchedule,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.wal_append(event).await?;
        apply_to_schedule(sched, event, &self.index);
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    pub(super) fn schedule_for(&self, key: &ResourceKey) -> Result<SharedSchedule, BookingError> {
        self.schedules
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| BookingError::UnknownResource(key.clone()))
    }

    pub(super) fn resource_of(&self, id: Ulid) -> Result<ResourceKey, BookingError> {
        self.index
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    /// Lookup reservation → resource, then take that schedule's write lock.
    pub(super) async fn resolve_write(
        &self,
        id: Ulid,
    ) -> Result<(ResourceKey, tokio::sync::OwnedRwLockWriteGuard<ResourceSchedule>), BookingError>
    {
        let resource = self.resource_of(id)?;
        let sched = self.schedule_for(&resource)?;
        let guard = sched.write_owned().await;
        Ok((resource, guard))
    }
}
