use chrono::NaiveDate;
use ulid::Ulid;

use crate::clock::now_ms;
use crate::gateway::{is_settled, verify_signature};
use crate::limits::{HOURS_PER_DAY, MAX_REASON_LEN};
use crate::model::*;
use crate::observability;
use crate::pricing::{self, RateTable};

use super::availability::{blocks_checkout, blocks_public, grace_elapsed, StatusFilter};
use super::conflict::{conflicting_reservation, validate_customer, validate_date, validate_hours};
use super::{BookingError, Engine};

/// A booking request, transport-agnostic.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub customer: Customer,
    pub resource: ResourceKey,
    pub date: NaiveDate,
    pub hours: Vec<u8>,
}

/// How a create behaves. Online checkouts and operator walk-ins share the
/// same conflict-safe path but differ in filter, grace and initial state.
struct CreateMode {
    channel: Channel,
    filter: StatusFilter,
    enforce_grace: bool,
    respect_blocks: bool,
    initial_status: PaymentStatus,
    method: Option<&'static str>,
}

impl Engine {
    /// Create a pending online reservation.
    ///
    /// Conflict-checks under the conservative checkout filter: `pending`,
    /// `processing` and `paid` reservations all block, so two simultaneous
    /// checkouts cannot both claim a slot while payment is in flight.
    pub async fn create_reservation(
        &self,
        req: NewReservation,
    ) -> Result<Reservation, BookingError> {
        self.create_with_mode(
            req,
            CreateMode {
                channel: Channel::Online,
                filter: blocks_checkout,
                enforce_grace: true,
                respect_blocks: true,
                initial_status: PaymentStatus::Pending,
                method: None,
            },
        )
        .await
    }

    /// Operator walk-in: created directly in `paid`, cash method. Conflicts
    /// only against truly paid reservations — a concurrent online checkout
    /// does not block the counter. Grace and admin blocks do not apply; the
    /// operator placing walk-ins is the actor who owns the blocks.
    pub async fn create_offline(
        &self,
        operator: &Operator,
        req: NewReservation,
    ) -> Result<Reservation, BookingError> {
        tracing::info!(operator = %operator.id, resource = %req.resource, date = %req.date, "offline booking");
        self.create_with_mode(
            req,
            CreateMode {
                channel: Channel::Offline,
                filter: blocks_public,
                enforce_grace: false,
                respect_blocks: false,
                initial_status: PaymentStatus::Paid,
                method: Some("cash"),
            },
        )
        .await
    }

    async fn create_with_mode(
        &self,
        req: NewReservation,
        mode: CreateMode,
    ) -> Result<Reservation, BookingError> {
        if !self.catalog.contains(&req.resource) {
            return Err(BookingError::UnknownResource(req.resource));
        }
        validate_customer(&req.customer)?;
        validate_hours(&req.hours)?;

        let now = now_ms();
        let today = self.clock.date_of(now);
        validate_date(req.date, today, self.booking_window_days)?;

        let span = self
            .clock
            .booking_span(req.date, req.hours[0], req.hours.len() as u32);
        if mode.enforce_grace && grace_elapsed(span.start, now) {
            return Err(BookingError::SlotUnavailable {
                resource: req.resource,
                date: req.date,
                hours: req.hours,
            });
        }

        // Conflict-safe transaction boundary: write locks over the whole
        // exclusion group, acquired in sorted key order, held across the
        // re-check and the WAL commit.
        let group = self.catalog.group(&req.resource);
        let mut guards = Vec::with_capacity(group.len());
        for key in &group {
            let sched = self.schedule_for(key)?;
            guards.push(sched.write_owned().await);
        }

        if mode.respect_blocks {
            let blocks = self.blocks.read().await;
            for &h in &req.hours {
                if blocks.iter().any(|b| b.covers(&req.resource, req.date, h)) {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                    return Err(BookingError::SlotUnavailable {
                        resource: req.resource,
                        date: req.date,
                        hours: req.hours,
                    });
                }
            }
        }

        for guard in &guards {
            if let Some(held_by) = conflicting_reservation(guard, &span, mode.filter) {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                tracing::debug!(resource = %guard.key, %held_by, "create rejected: slot held");
                return Err(BookingError::SlotUnavailable {
                    resource: req.resource,
                    date: req.date,
                    hours: req.hours,
                });
            }
        }

        let table = self
            .rates
            .get(&req.resource)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let amount = pricing::total_for_hours(&req.resource, &table, req.date, &req.hours);

        let duration_hours = req.hours.len() as u32;
        let reservation = Reservation {
            id: Ulid::new(),
            customer: req.customer,
            resource: req.resource.clone(),
            date: req.date,
            hours: req.hours,
            span,
            duration_hours,
            amount,
            status: mode.initial_status,
            channel: mode.channel,
            order_id: None,
            payment_id: None,
            signature: None,
            method: mode.method.map(str::to_string),
            failure_reason: None,
            attempts: 0,
            created_at: now,
            completed_at: matches!(mode.initial_status, PaymentStatus::Paid).then_some(now),
        };

        let own = group
            .iter()
            .position(|k| k == &req.resource)
            .expect("group always contains the requested resource");
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.persist_and_apply(&mut guards[own], &event).await?;

        let channel = match mode.channel {
            Channel::Online => "online",
            Channel::Offline => "offline",
        };
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL, "channel" => channel).increment(1);
        tracing::info!(
            id = %reservation.id,
            resource = %reservation.resource,
            date = %reservation.date,
            amount = reservation.amount,
            channel,
            "reservation created"
        );
        Ok(reservation)
    }

    /// `pending|failed → processing`: attach the gateway order. A reservation
    /// gets at most one non-null order id, ever — repeated calls re-enter
    /// `processing` with the original order.
    pub async fn begin_payment(&self, id: Ulid) -> Result<String, BookingError> {
        let resource = self.resource_of(id)?;
        let sched = self.schedule_for(&resource)?;

        let (amount, existing_order, status) = {
            let guard = sched.read().await;
            let r = guard.get(id).ok_or(BookingError::NotFound(id))?;
            (r.amount, r.order_id.clone(), r.status)
        };
        match status {
            PaymentStatus::Paid | PaymentStatus::Refunded => {
                return Err(BookingError::InvalidTransition {
                    id,
                    from: status,
                    action: "begin payment for",
                });
            }
            PaymentStatus::Processing => {
                if let Some(order) = existing_order {
                    return Ok(order);
                }
                // A processing reservation always has an order id; fall
                // through defensively if the invariant was violated.
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }

        if let Some(order) = existing_order {
            // Retry after failure: same order, back to processing.
            let mut guard = sched.write().await;
            let current = guard.get(id).ok_or(BookingError::NotFound(id))?.status;
            if matches!(current, PaymentStatus::Paid | PaymentStatus::Refunded) {
                return Err(BookingError::InvalidTransition {
                    id,
                    from: current,
                    action: "begin payment for",
                });
            }
            let event = Event::PaymentBegun {
                id,
                resource,
                order_id: order.clone(),
            };
            self.persist_and_apply(&mut guard, &event).await?;
            return Ok(order);
        }

        // First attempt: create the order without holding any lock.
        let order = self
            .gateway
            .create_order(amount, &self.currency, &id.to_string())
            .await?;

        let mut guard = sched.write().await;
        let current = {
            let r = guard.get(id).ok_or(BookingError::NotFound(id))?;
            if let Some(first) = &r.order_id {
                // Lost a race with a concurrent begin; the first assigned
                // order id wins, ours is abandoned.
                tracing::warn!(%id, "discarding duplicate gateway order");
                return Ok(first.clone());
            }
            r.status
        };
        if matches!(current, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Err(BookingError::InvalidTransition {
                id,
                from: current,
                action: "begin payment for",
            });
        }
        let event = Event::PaymentBegun {
            id,
            resource,
            order_id: order.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!(%id, order = %order, "payment begun");
        Ok(order)
    }

    /// `processing → paid | failed`, gated by signature verification.
    ///
    /// A bad signature fails the reservation without ever contacting the
    /// gateway. A verified signature is still only a claim: the gateway's
    /// reported status decides. Gateway timeouts leave the reservation in
    /// `processing` and surface as a retryable error — never an optimistic
    /// `paid`.
    pub async fn confirm_payment(
        &self,
        id: Ulid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Reservation, BookingError> {
        let resource = self.resource_of(id)?;
        let sched = self.schedule_for(&resource)?;

        {
            let guard = sched.read().await;
            let r = guard.get(id).ok_or(BookingError::NotFound(id))?;
            if r.status != PaymentStatus::Processing {
                return Err(BookingError::InvalidTransition {
                    id,
                    from: r.status,
                    action: "confirm payment for",
                });
            }
            if r.order_id.as_deref() != Some(order_id) {
                return Err(BookingError::OrderMismatch(id));
            }
        }

        if !verify_signature(&self.gateway_secret, order_id, payment_id, signature) {
            let mut guard = sched.write().await;
            if guard
                .get(id)
                .is_some_and(|r| r.status == PaymentStatus::Processing)
            {
                let event = Event::PaymentFailed {
                    id,
                    resource,
                    reason: "invalid signature".into(),
                };
                self.persist_and_apply(&mut guard, &event).await?;
            }
            metrics::counter!(observability::SIGNATURE_REJECTS_TOTAL).increment(1);
            tracing::warn!(%id, "payment signature mismatch");
            return Err(BookingError::SignatureMismatch(id));
        }

        let capture = self
            .gateway
            .fetch_payment(payment_id)
            .await
            .map_err(BookingError::Gateway)?;

        let now = now_ms();
        let mut guard = sched.write().await;
        let current = guard.get(id).ok_or(BookingError::NotFound(id))?.status;
        if current != PaymentStatus::Processing {
            // Cancelled or reaped while we talked to the gateway.
            return Err(BookingError::InvalidTransition {
                id,
                from: current,
                action: "confirm payment for",
            });
        }

        if is_settled(&capture.status) {
            let event = Event::PaymentCaptured {
                id,
                resource,
                payment_id: payment_id.to_string(),
                signature: signature.trim().to_ascii_lowercase(),
                method: capture.method,
                completed_at: now,
            };
            self.persist_and_apply(&mut guard, &event).await?;
            metrics::counter!(observability::PAYMENTS_CONFIRMED_TOTAL).increment(1);
            tracing::info!(%id, "payment confirmed");
            Ok(guard.get(id).cloned().expect("reservation applied above"))
        } else {
            let event = Event::PaymentFailed {
                id,
                resource,
                reason: format!("Payment status: {}", capture.status),
            };
            self.persist_and_apply(&mut guard, &event).await?;
            metrics::counter!(observability::PAYMENTS_FAILED_TOTAL).increment(1);
            tracing::warn!(%id, status = %capture.status, "payment not settled");
            Err(BookingError::PaymentDeclined {
                id,
                status: capture.status,
            })
        }
    }

    /// Record a caller-reported failure (user abort, checkout closed). No
    /// gateway contact. Forbidden once paid.
    pub async fn record_failure(&self, id: Ulid, reason: &str) -> Result<(), BookingError> {
        let reason = reason.trim();
        if reason.is_empty() || reason.len() > MAX_REASON_LEN {
            return Err(BookingError::Validation {
                field: "reason",
                reason: format!("reason must be 1-{MAX_REASON_LEN} characters"),
            });
        }
        let (resource, mut guard) = self.resolve_write(id).await?;
        let status = guard.get(id).ok_or(BookingError::NotFound(id))?.status;
        if matches!(status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Err(BookingError::InvalidTransition {
                id,
                from: status,
                action: "record failure for",
            });
        }
        let event = Event::PaymentFailed {
            id,
            resource,
            reason: reason.to_string(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::PAYMENTS_FAILED_TOTAL).increment(1);
        Ok(())
    }

    /// Hard-delete a `pending|processing|failed` reservation. Cancelling a
    /// paid reservation is a reported error — refunds are a separate flow.
    pub async fn cancel_reservation(&self, id: Ulid) -> Result<(), BookingError> {
        let (resource, mut guard) = self.resolve_write(id).await?;
        let status = guard.get(id).ok_or(BookingError::NotFound(id))?.status;
        match status {
            PaymentStatus::Paid => return Err(BookingError::CancelPaid(id)),
            PaymentStatus::Refunded => {
                return Err(BookingError::InvalidTransition {
                    id,
                    from: status,
                    action: "cancel",
                });
            }
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Failed => {}
        }
        let event = Event::ReservationDeleted { id, resource };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!(%id, "reservation cancelled");
        Ok(())
    }

    // ── Operator actions ─────────────────────────────────────────

    /// Mark one date + hour slot unavailable, for one resource or all.
    pub async fn block_slot(
        &self,
        operator: &Operator,
        date: NaiveDate,
        hour: u8,
        resource: Option<ResourceKey>,
        reason: &str,
    ) -> Result<AdminBlock, BookingError> {
        if hour >= HOURS_PER_DAY {
            return Err(BookingError::Validation {
                field: "hour",
                reason: format!("hour {hour} out of range"),
            });
        }
        let reason = reason.trim();
        if reason.is_empty() || reason.len() > MAX_REASON_LEN {
            return Err(BookingError::Validation {
                field: "reason",
                reason: format!("reason must be 1-{MAX_REASON_LEN} characters"),
            });
        }
        if let Some(key) = &resource
            && !self.catalog.contains(key) {
                return Err(BookingError::UnknownResource(key.clone()));
            }

        let block = AdminBlock {
            id: Ulid::new(),
            date,
            hour,
            resource,
            reason: reason.to_string(),
            created_by: operator.id.clone(),
            active: true,
            created_at: now_ms(),
        };
        self.wal_append(&Event::BlockCreated {
            block: block.clone(),
        })
        .await?;
        self.blocks.write().await.push(block.clone());
        tracing::info!(id = %block.id, %date, hour, operator = %operator.id, "slot blocked");
        Ok(block)
    }

    /// Soft-delete a block. Idempotent once deactivated.
    pub async fn unblock_slot(&self, operator: &Operator, id: Ulid) -> Result<(), BookingError> {
        {
            let blocks = self.blocks.read().await;
            let Some(block) = blocks.iter().find(|b| b.id == id) else {
                return Err(BookingError::NotFound(id));
            };
            if !block.active {
                return Ok(());
            }
        }
        self.wal_append(&Event::BlockDeactivated { id }).await?;
        let mut blocks = self.blocks.write().await;
        if let Some(block) = blocks.iter_mut().find(|b| b.id == id) {
            block.active = false;
        }
        tracing::info!(%id, operator = %operator.id, "slot unblocked");
        Ok(())
    }

    /// Replace a resource's rate table. The only mutation resources admit.
    pub async fn update_rates(
        &self,
        operator: &Operator,
        resource: &ResourceKey,
        rates: RateTable,
    ) -> Result<(), BookingError> {
        if !self.catalog.contains(resource) {
            return Err(BookingError::UnknownResource(resource.clone()));
        }
        self.wal_append(&Event::RatesUpdated {
            resource: resource.clone(),
            rates: rates.clone(),
        })
        .await?;
        self.rates.insert(resource.clone(), rates);
        tracing::info!(%resource, operator = %operator.id, "rates updated");
        Ok(())
    }

    /// Reservations whose payment never concluded within `stale_after_ms`.
    /// Consumed by the reaper.
    pub fn collect_stale(&self, now: Ms, stale_after_ms: Ms) -> Vec<Ulid> {
        let mut stale = Vec::new();
        for entry in self.schedules.iter() {
            let sched = entry.value().clone();
            if let Ok(guard) = sched.try_read() {
                for r in &guard.reservations {
                    if matches!(
                        r.status,
                        PaymentStatus::Pending | PaymentStatus::Processing
                    ) && r.created_at + stale_after_ms <= now
                    {
                        stale.push(r.id);
                    }
                }
            }
        }
        stale
    }
}
