use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Daily window `[start, end)` in local time during which no cycle runs.
/// Wraps past midnight when `start > end`; empty when `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Self {
        Self {
            start,
            end,
            timezone,
        }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone).time();
        if self.start <= self.end {
            self.start <= local && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}
