use chrono::NaiveDate;
use ulid::Ulid;

use crate::gateway::GatewayError;
use crate::model::{PaymentStatus, ResourceKey};

/// Coarse taxonomy a transport layer maps onto response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-fixable request problem; never retried automatically.
    Validation,
    /// Business-logic rejection, reported verbatim.
    Conflict,
    /// Gateway trouble; surfaced as retryable.
    Upstream,
    /// Storage/internal failure; opaque to production callers.
    System,
}

#[derive(Debug)]
pub enum BookingError {
    Validation {
        field: &'static str,
        reason: String,
    },
    UnknownResource(ResourceKey),
    NotFound(Ulid),
    SlotUnavailable {
        resource: ResourceKey,
        date: NaiveDate,
        hours: Vec<u8>,
    },
    SignatureMismatch(Ulid),
    /// Supplied order id does not match the reservation's.
    OrderMismatch(Ulid),
    CancelPaid(Ulid),
    InvalidTransition {
        id: Ulid,
        from: PaymentStatus,
        action: &'static str,
    },
    /// Gateway reported a definite non-settled status.
    PaymentDeclined {
        id: Ulid,
        status: String,
    },
    Gateway(GatewayError),
    Wal(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation { .. }
            | BookingError::UnknownResource(_)
            | BookingError::NotFound(_)
            | BookingError::OrderMismatch(_) => ErrorKind::Validation,
            BookingError::SlotUnavailable { .. }
            | BookingError::SignatureMismatch(_)
            | BookingError::CancelPaid(_)
            | BookingError::InvalidTransition { .. } => ErrorKind::Conflict,
            BookingError::PaymentDeclined { .. } | BookingError::Gateway(_) => ErrorKind::Upstream,
            BookingError::Wal(_) => ErrorKind::System,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Gateway(e) if e.is_retryable())
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            BookingError::UnknownResource(key) => write!(f, "unknown resource: {key}"),
            BookingError::NotFound(id) => write!(f, "reservation not found: {id}"),
            BookingError::SlotUnavailable {
                resource,
                date,
                hours,
            } => {
                write!(f, "slot unavailable: {resource} on {date}, hours {hours:?}")
            }
            BookingError::SignatureMismatch(id) => {
                write!(f, "payment signature mismatch for reservation {id}")
            }
            BookingError::OrderMismatch(id) => {
                write!(f, "order id does not match reservation {id}")
            }
            BookingError::CancelPaid(id) => {
                write!(f, "cannot cancel paid reservation {id}: refund required")
            }
            BookingError::InvalidTransition { id, from, action } => {
                write!(f, "cannot {action} reservation {id} in status {from}")
            }
            BookingError::PaymentDeclined { id, status } => {
                write!(f, "payment for reservation {id} not settled: status {status}")
            }
            BookingError::Gateway(e) => write!(f, "gateway error: {e}"),
            BookingError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Gateway(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GatewayError> for BookingError {
    fn from(e: GatewayError) -> Self {
        BookingError::Gateway(e)
    }
}
