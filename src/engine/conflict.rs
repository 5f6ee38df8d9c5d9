use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Customer, ResourceSchedule, Span};

use super::availability::{is_closed_hour, StatusFilter};
use super::error::BookingError;

/// First reservation in `schedule` that passes `filter` and overlaps `span`.
/// Run under the schedule's write lock right before commit — this re-check is
/// what makes check-then-insert safe.
pub(super) fn conflicting_reservation(
    schedule: &ResourceSchedule,
    span: &Span,
    filter: StatusFilter,
) -> Option<Ulid> {
    schedule
        .overlapping(span)
        .find(|r| filter(r.status))
        .map(|r| r.id)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> BookingError {
    BookingError::Validation {
        field,
        reason: reason.into(),
    }
}

/// Hours must be a non-empty run of consecutive in-range open hours.
pub(super) fn validate_hours(hours: &[u8]) -> Result<(), BookingError> {
    if hours.is_empty() {
        return Err(invalid("hours", "at least one hour is required"));
    }
    if hours.len() > MAX_HOURS_PER_BOOKING {
        return Err(invalid(
            "hours",
            format!("at most {MAX_HOURS_PER_BOOKING} hours per booking"),
        ));
    }
    for &h in hours {
        if h >= HOURS_PER_DAY {
            return Err(invalid("hours", format!("hour {h} out of range")));
        }
        if is_closed_hour(h) {
            return Err(invalid(
                "hours",
                format!("hour {h} falls in closed hours (01:00-05:59)"),
            ));
        }
    }
    for pair in hours.windows(2) {
        if pair[1] != pair[0] + 1 {
            return Err(invalid(
                "hours",
                format!("hours must be consecutive, got {} then {}", pair[0], pair[1]),
            ));
        }
    }
    Ok(())
}

pub(super) fn validate_customer(customer: &Customer) -> Result<(), BookingError> {
    let name = customer.name.trim();
    if name.is_empty() {
        return Err(invalid("name", "name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name", format!("name exceeds {MAX_NAME_LEN} characters")));
    }

    let phone = customer.phone.trim();
    if phone.is_empty() {
        return Err(invalid("phone", "phone is required"));
    }
    if phone.len() > MAX_CONTACT_LEN {
        return Err(invalid("phone", "phone too long"));
    }
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' ' | '(' | ')'))
        .collect();
    if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("phone", "phone must be 7-15 digits"));
    }

    let email = customer.email.trim();
    if email.is_empty() {
        return Err(invalid("email", "email is required"));
    }
    if email.len() > MAX_CONTACT_LEN {
        return Err(invalid("email", "email too long"));
    }
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        });
    if !well_formed {
        return Err(invalid("email", "email is malformed"));
    }
    Ok(())
}

/// Online bookings must land on or after today, inside the booking window.
pub(super) fn validate_date(
    date: NaiveDate,
    today: NaiveDate,
    window_days: u32,
) -> Result<(), BookingError> {
    if date < today {
        return Err(invalid("date", format!("{date} is in the past")));
    }
    let horizon = today
        .checked_add_days(chrono::Days::new(u64::from(window_days)))
        .unwrap_or(today);
    if date > horizon {
        return Err(invalid(
            "date",
            format!("{date} is beyond the {window_days}-day booking window"),
        ));
    }
    Ok(())
}
