//! Aggregates over ledger records for the stats and report commands.
//!
//! Rendering (text replies, bar charts) is done by the caller; this module
//! only produces the numbers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use roomlease_protocol::{SessionRecord, UserId};
use serde::Serialize;

const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// StudyTotals
// ---------------------------------------------------------------------------

/// A user's lifetime total, as returned by
/// [`SessionLedger::total_duration`](crate::SessionLedger::total_duration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudyTotals {
    /// Total seconds across all sessions.
    pub total_secs: u64,
}

impl StudyTotals {
    pub fn new(total_secs: u64) -> Self {
        Self { total_secs }
    }

    /// `true` when nothing has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.total_secs == 0
    }

    /// Fractional hours, e.g. `5400s` → `1.5`.
    pub fn hours(&self) -> f64 {
        self.total_secs as f64 / SECS_PER_HOUR
    }

    pub fn whole_hours(&self) -> u64 {
        self.total_secs / 3600
    }

    /// Minutes left over after the whole hours.
    pub fn remainder_minutes(&self) -> u64 {
        (self.total_secs % 3600) / 60
    }
}

impl fmt::Display for StudyTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m", self.whole_hours(), self.remainder_minutes())
    }
}

// ---------------------------------------------------------------------------
// WeeklyReport
// ---------------------------------------------------------------------------

/// Per-owner seconds for one weekday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayUsage {
    pub weekday: Weekday,
    /// Seconds per session owner. Sessions are attributed to the owner
    /// only, so a pair's session is counted once.
    pub per_owner: BTreeMap<UserId, u64>,
}

impl DayUsage {
    fn empty(weekday: Weekday) -> Self {
        Self {
            weekday,
            per_owner: BTreeMap::new(),
        }
    }

    /// Hours logged by `owner` on this day.
    pub fn hours(&self, owner: UserId) -> f64 {
        self.per_owner.get(&owner).copied().unwrap_or(0) as f64 / SECS_PER_HOUR
    }
}

/// The last seven days of usage, grouped by weekday (Monday first) and by
/// session owner. This is the table a bar chart is drawn from.
///
/// Weekdays are taken from each record's `start_time` in UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    /// Start of the reporting window (`now - 7 days`).
    pub since: DateTime<Utc>,
    /// Exactly seven entries, Monday through Sunday.
    pub days: Vec<DayUsage>,
}

impl WeeklyReport {
    /// Length of the reporting window.
    pub const WINDOW_DAYS: i64 = 7;

    /// The earliest `start_time` included in a report generated at `now`.
    pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(Self::WINDOW_DAYS)
    }

    /// Groups `records` into a report for the window ending at `now`.
    ///
    /// Records starting before the window are ignored, so the caller may
    /// pass an unfiltered set.
    pub fn build<'a>(
        records: impl IntoIterator<Item = &'a SessionRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let since = Self::window_start(now);
        let mut days: Vec<DayUsage> = (0..7)
            .map(|i| DayUsage::empty(weekday_from_monday(i)))
            .collect();

        for record in records.into_iter().filter(|r| r.start_time >= since) {
            let index = record.start_time.weekday().num_days_from_monday() as usize;
            *days[index].per_owner.entry(record.owner).or_insert(0) += record.duration_secs;
        }

        Self { since, days }
    }

    /// `true` when no session fell inside the window.
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(|d| d.per_owner.is_empty())
    }

    /// Every owner that appears in the report, in id order.
    pub fn owners(&self) -> BTreeSet<UserId> {
        self.days
            .iter()
            .flat_map(|d| d.per_owner.keys().copied())
            .collect()
    }

    /// The entry for `weekday`.
    pub fn day(&self, weekday: Weekday) -> &DayUsage {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    /// Total hours for `owner` across the window.
    pub fn total_hours(&self, owner: UserId) -> f64 {
        self.days.iter().map(|d| d.hours(owner)).sum()
    }
}

fn weekday_from_monday(index: u32) -> Weekday {
    match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn uid(id: u64) -> UserId {
        UserId(id)
    }

    /// 2026-10-18 is a Sunday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().unwrap()
    }

    fn on(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).single().unwrap()
    }

    // =====================================================================
    // StudyTotals
    // =====================================================================

    #[test]
    fn test_study_totals_breakdown() {
        let totals = StudyTotals::new(5_400 + 120);
        assert_eq!(totals.whole_hours(), 1);
        assert_eq!(totals.remainder_minutes(), 32);
        assert_eq!(totals.to_string(), "1h 32m");
    }

    #[test]
    fn test_study_totals_hours_fractional() {
        assert!((StudyTotals::new(5_400).hours() - 1.5).abs() < f64::EPSILON);
        assert!(StudyTotals::new(0).is_empty());
    }

    // =====================================================================
    // WeeklyReport
    // =====================================================================

    #[test]
    fn test_build_has_seven_days_monday_first() {
        let report = WeeklyReport::build(&[], now());
        assert_eq!(report.days.len(), 7);
        assert_eq!(report.days[0].weekday, Weekday::Mon);
        assert_eq!(report.days[6].weekday, Weekday::Sun);
        assert!(report.is_empty());
    }

    #[test]
    fn test_build_groups_by_weekday_and_owner() {
        let records = vec![
            // Monday 2026-10-12, owner 1, twice.
            SessionRecord::new(uid(1), uid(2), on(12, 9), 1_800, "a"),
            SessionRecord::new(uid(1), uid(3), on(12, 15), 1_800, "b"),
            // Wednesday, owner 2.
            SessionRecord::new(uid(2), uid(1), on(14, 10), 7_200, "c"),
        ];

        let report = WeeklyReport::build(&records, now());

        assert!((report.day(Weekday::Mon).hours(uid(1)) - 1.0).abs() < f64::EPSILON);
        assert!((report.day(Weekday::Wed).hours(uid(2)) - 2.0).abs() < f64::EPSILON);
        // Partners are not credited in the weekly chart.
        assert_eq!(report.day(Weekday::Wed).hours(uid(1)), 0.0);
        assert_eq!(report.owners().into_iter().collect::<Vec<_>>(), vec![uid(1), uid(2)]);
    }

    #[test]
    fn test_build_ignores_records_before_window() {
        let records = vec![
            SessionRecord::new(uid(1), uid(2), on(11, 11), 3_600, "too old"),
            SessionRecord::new(uid(1), uid(2), on(11, 12), 3_600, "window edge"),
        ];

        let report = WeeklyReport::build(&records, now());

        assert!((report.total_hours(uid(1)) - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.since, on(11, 12));
    }
}
