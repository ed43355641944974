//! Calendar-day windows over the time index
//!
//! Day boundaries are UTC midnights regardless of the caller's time zone.

use crate::entry::instant_score;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};

/// Half-open UTC day `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayRange {
    /// The UTC day `days_ago` days before the day containing `now`.
    ///
    /// Returns `None` if the date falls outside chrono's supported range.
    pub fn days_ago(days_ago: u32, now: DateTime<Utc>) -> Option<Self> {
        let day = now
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days_ago)))?;
        let next = day.checked_add_days(Days::new(1))?;

        Some(Self {
            start: Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)),
            end: Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)),
        })
    }

    /// Check if an instant falls within the day
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Lower score bound (inclusive) in the time index
    pub fn start_score(&self) -> f64 {
        instant_score(self.start)
    }

    /// Upper score bound (exclusive) in the time index
    pub fn end_score(&self) -> f64 {
        instant_score(self.end)
    }
}
