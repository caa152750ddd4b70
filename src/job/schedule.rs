//! Scheduler (§4.9 "Scheduling"): `(weekday-set, date-pattern, time-pattern,
//! archive-type, interval-minutes, enabled)` schedules, woken every minute.

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::job::ArchiveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    fn from_chrono(wd: chrono::Weekday) -> Self {
        match wd {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

/// `*` (any) or a fixed `(month, day)` pair — enough to express "every day"
/// and "on this specific date" without a full cron grammar, which the spec
/// doesn't require (§4.9 only names "date-pattern" abstractly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    Any,
    Fixed { month: u32, day: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePattern {
    Any,
    Fixed { hour: u32, minute: u32 },
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub weekdays: Vec<Weekday>,
    pub date: DatePattern,
    pub time: TimePattern,
    pub archive_type: ArchiveType,
    pub interval_minutes: i64,
    pub enabled: bool,
}

impl Schedule {
    fn weekday_matches(&self, now: DateTime<Local>) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&Weekday::from_chrono(now.weekday()))
    }

    fn date_matches(&self, now: DateTime<Local>) -> bool {
        match self.date {
            DatePattern::Any => true,
            DatePattern::Fixed { month, day } => now.month() == month && now.day() == day,
        }
    }

    fn time_matches(&self, now: DateTime<Local>) -> bool {
        match self.time {
            TimePattern::Any => true,
            TimePattern::Fixed { hour, minute } => now.hour() == hour && now.minute() == minute,
        }
    }

    /// Whether this schedule fires at `now`, given `last_executed` (unix
    /// seconds, or `None` if this archive type never ran): weekday, date and
    /// time patterns must all match, `enabled` must be set, and
    /// `last_executed + interval <= now` (§4.9 "the scheduler wakes every
    /// minute ... triggers matching jobs whose `last_executed + interval ≤
    /// now`").
    pub fn fires_at(&self, now: DateTime<Local>, last_executed: Option<i64>) -> bool {
        if !self.enabled || !self.weekday_matches(now) || !self.date_matches(now) || !self.time_matches(now) {
            return false;
        }
        match last_executed {
            None => true,
            Some(last) => last + self.interval_minutes * 60 <= now.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> Schedule {
        Schedule {
            weekdays: vec![],
            date: DatePattern::Any,
            time: TimePattern::Any,
            archive_type: ArchiveType::Full,
            interval_minutes: 60,
            enabled: true,
        }
    }

    #[test]
    fn disabled_schedule_never_fires() {
        let mut s = schedule();
        s.enabled = false;
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        assert!(!s.fires_at(now, None));
    }

    #[test]
    fn never_run_fires_immediately() {
        let s = schedule();
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        assert!(s.fires_at(now, None));
    }

    #[test]
    fn interval_not_yet_elapsed_does_not_fire() {
        let s = schedule();
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let last = now.timestamp() - 30 * 60;
        assert!(!s.fires_at(now, Some(last)));
    }

    #[test]
    fn interval_elapsed_fires() {
        let s = schedule();
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let last = now.timestamp() - 61 * 60;
        assert!(s.fires_at(now, Some(last)));
    }

    #[test]
    fn weekday_restriction_is_honored() {
        let mut s = schedule();
        // 2026-07-28 is a Tuesday.
        s.weekdays = vec![Weekday::Mon];
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        assert!(!s.fires_at(now, None));
    }
}
