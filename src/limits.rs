//! Validation bounds. Requests exceeding these are rejected up front.

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_CONTACT_LEN: usize = 120;
pub const MAX_REASON_LEN: usize = 500;

/// Longest bookable stretch of consecutive hours in one reservation.
pub const MAX_HOURS_PER_BOOKING: usize = 12;

/// Widest window accepted by date-range queries.
pub const MAX_WINDOW_DAYS: u32 = 90;

pub const HOURS_PER_DAY: u8 = 24;
