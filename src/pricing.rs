//! Per-hour pricing by day type and half-day band.
//!
//! Every hour of a multi-hour booking is priced at its own band's rate; a
//! booking spanning the 17:00→18:00 boundary has a genuinely mixed total.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::is_weekend;
use crate::model::ResourceKey;

/// Applied when a rate table has no entry for a band. The fallback is
/// explicit and logged, never silent.
pub const DEFAULT_HOURLY_RATE: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn for_date(date: NaiveDate) -> Self {
        if is_weekend(date) {
            DayType::Weekend
        } else {
            DayType::Weekday
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHalf {
    /// 06:00–17:59.
    First,
    /// 18:00–05:59, wrapping across midnight.
    Second,
}

impl DayHalf {
    pub fn for_hour(hour: u8) -> Self {
        if (6..18).contains(&hour) {
            DayHalf::First
        } else {
            DayHalf::Second
        }
    }
}

pub fn band_key(day: DayType, half: DayHalf) -> &'static str {
    match (day, half) {
        (DayType::Weekday, DayHalf::First) => "weekday_first_half",
        (DayType::Weekday, DayHalf::Second) => "weekday_second_half",
        (DayType::Weekend, DayHalf::First) => "weekend_first_half",
        (DayType::Weekend, DayHalf::Second) => "weekend_second_half",
    }
}

/// Band → amount-per-hour. Stored as the JSON blob the catalog carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    rates: BTreeMap<String, i64>,
}

impl RateTable {
    pub fn new(rates: BTreeMap<String, i64>) -> Self {
        Self { rates }
    }

    pub fn with_rate(mut self, band: &str, amount: i64) -> Self {
        self.rates.insert(band.to_string(), amount);
        self
    }

    pub fn rate(&self, day: DayType, half: DayHalf) -> Option<i64> {
        self.rates.get(band_key(day, half)).copied()
    }
}

/// Rate for one hour on one date. Falls back to [`DEFAULT_HOURLY_RATE`] with
/// a warning when the band is missing from the table.
pub fn rate_for_hour(resource: &ResourceKey, table: &RateTable, date: NaiveDate, hour: u8) -> i64 {
    let day = DayType::for_date(date);
    let half = DayHalf::for_hour(hour);
    match table.rate(day, half) {
        Some(amount) => amount,
        None => {
            tracing::warn!(
                resource = %resource,
                band = band_key(day, half),
                fallback = DEFAULT_HOURLY_RATE,
                "rate table missing band, using default rate"
            );
            DEFAULT_HOURLY_RATE
        }
    }
}

/// Total for an hour set: the sum of each hour priced independently.
pub fn total_for_hours(
    resource: &ResourceKey,
    table: &RateTable,
    date: NaiveDate,
    hours: &[u8],
) -> i64 {
    hours
        .iter()
        .map(|&h| rate_for_hour(resource, table, date, h))
        .sum()
}
