//! Civil time for the business.
//!
//! All date/hour-label conversions go through one configured fixed offset so
//! availability, pricing and blocks agree on what "Tuesday 17:00" means.
//! Interval math everywhere else stays in unix milliseconds.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, TimeZone, Weekday};

use crate::model::{Ms, Span};

pub const HOUR_MS: Ms = 3_600_000;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

/// Display label for an hour slot, e.g. `"17:00 - 18:00"`.
pub fn hour_label(hour: u8) -> String {
    format!("{:02}:00 - {:02}:00", hour, (hour + 1) % 24)
}

#[derive(Debug, Clone, Copy)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    /// `offset_minutes` east of UTC, e.g. 330 for +05:30.
    pub fn new(offset_minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_minutes * 60).map(|offset| Self { offset })
    }

    /// Start of an hour slot on a civil date, as unix millis.
    pub fn slot_start(&self, date: NaiveDate, hour: u8) -> Ms {
        let naive = date
            .and_hms_opt(u32::from(hour), 0, 0)
            .expect("hour validated to 0..24");
        self.offset
            .from_local_datetime(&naive)
            .single()
            .expect("fixed offsets are unambiguous")
            .timestamp_millis()
    }

    /// The `[start, end)` span of a single hour slot.
    pub fn slot_span(&self, date: NaiveDate, hour: u8) -> Span {
        let start = self.slot_start(date, hour);
        Span::new(start, start + HOUR_MS)
    }

    /// The span covering `count` consecutive hours starting at `first_hour`.
    pub fn booking_span(&self, date: NaiveDate, first_hour: u8, count: u32) -> Span {
        let start = self.slot_start(date, first_hour);
        Span::new(start, start + Ms::from(count) * HOUR_MS)
    }

    /// Civil date containing the instant `now`.
    pub fn date_of(&self, now: Ms) -> NaiveDate {
        self.offset
            .timestamp_millis_opt(now)
            .single()
            .expect("fixed offsets are unambiguous")
            .date_naive()
    }

    pub fn dates_from(&self, start: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
        (0..days).filter_map(move |i| start.checked_add_days(Days::new(u64::from(i))))
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
