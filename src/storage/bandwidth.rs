//! Bandwidth limiting (§4.6 "Bandwidth limiting", testable property 9 in §8).
//!
//! A `BandWidthList` maps `(weekday-set, time-range)` to a target
//! bytes-per-second; the adapter sleeps between writes to hit it. Using
//! `std::thread::sleep` against a token bucket keeps this out of the async
//! runtime entirely, matching the rest of the storage layer (§4.6.1).

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike, Weekday};

/// One bandwidth rule: active on the given weekdays, within the given
/// time-of-day range, capping throughput at `bytes_per_sec`.
#[derive(Debug, Clone)]
pub struct BandWidthRule {
    pub weekdays: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub bytes_per_sec: u64,
}

impl BandWidthRule {
    fn matches(&self, now: &DateTime<Local>) -> bool {
        if !self.weekdays.is_empty() && !self.weekdays.contains(&now.weekday()) {
            return false;
        }
        let t = now.time();
        if self.start <= self.end {
            t >= self.start && t < self.end
        } else {
            // Wraps past midnight, e.g. 22:00-06:00.
            t >= self.start || t < self.end
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BandWidthList(pub Vec<BandWidthRule>);

impl BandWidthList {
    pub fn new(rules: Vec<BandWidthRule>) -> Self {
        Self(rules)
    }

    /// The first matching rule's limit for `now`, or `None` if unthrottled.
    pub fn limit_at(&self, now: &DateTime<Local>) -> Option<u64> {
        self.0.iter().find(|r| r.matches(now)).map(|r| r.bytes_per_sec)
    }
}

/// A simple token-bucket throttle: `throttle` is called after each write and
/// sleeps just long enough to keep the running average at the active limit.
pub struct BandWidthLimiter {
    list: BandWidthList,
    window_start: Instant,
    window_bytes: u64,
}

impl BandWidthLimiter {
    pub fn new(list: BandWidthList) -> Self {
        Self {
            list,
            window_start: Instant::now(),
            window_bytes: 0,
        }
    }

    /// Call after writing `n` bytes; blocks the calling thread if the
    /// configured limit for "now" has been exceeded this second.
    pub fn throttle(&mut self, n: usize, now: DateTime<Local>) {
        let limit = match self.list.limit_at(&now) {
            Some(l) if l > 0 => l,
            _ => {
                self.window_bytes = 0;
                self.window_start = Instant::now();
                return;
            }
        };

        self.window_bytes += n as u64;
        let elapsed = self.window_start.elapsed();
        let allowed = (elapsed.as_secs_f64() * limit as f64) as u64;
        if self.window_bytes > allowed {
            let excess = self.window_bytes - allowed;
            let sleep_secs = excess as f64 / limit as f64;
            if sleep_secs > 0.0 {
                thread::sleep(Duration::from_secs_f64(sleep_secs));
            }
        }
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.window_bytes = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rule_matches_weekday_and_time_window() {
        let rule = BandWidthRule {
            weekdays: vec![Weekday::Mon, Weekday::Tue],
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            bytes_per_sec: 1_000_000,
        };
        let monday_noon = Local.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert!(rule.matches(&monday_noon));

        let monday_evening = Local.with_ymd_and_hms(2026, 7, 27, 20, 0, 0).unwrap();
        assert!(!rule.matches(&monday_evening));

        let wednesday_noon = Local.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap();
        assert!(!rule.matches(&wednesday_noon));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let rule = BandWidthRule {
            weekdays: vec![],
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            bytes_per_sec: 500_000,
        };
        let late_night = Local.with_ymd_and_hms(2026, 7, 27, 23, 30, 0).unwrap();
        assert!(rule.matches(&late_night));
        let early_morning = Local.with_ymd_and_hms(2026, 7, 27, 2, 0, 0).unwrap();
        assert!(rule.matches(&early_morning));
        let midday = Local.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert!(!rule.matches(&midday));
    }

    #[test]
    fn list_returns_none_when_unconfigured() {
        let list = BandWidthList::default();
        let now = Local.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert_eq!(list.limit_at(&now), None);
    }
}
