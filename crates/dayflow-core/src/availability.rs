//! Availability resolution: per-day free intervals for a planning range.
//!
//! Each day starts from the profile's working window (empty on non-working
//! days, whatever events say), minus the merged busy intervals: expanded
//! event occurrences, fixed task slots, and slots placed earlier in the run.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{merge_intervals, subtract_all, Interval};
use crate::profile::WorkingHoursProfile;

/// Free intervals for one day, sorted and non-overlapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub free: Vec<Interval>,
}

/// Free time across the whole planning range, one entry per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    days: Vec<DayAvailability>,
}

impl Availability {
    /// Resolve free intervals for `range` from the profile and busy set.
    ///
    /// Busy intervals are merged once up front (sort-then-sweep), then
    /// subtracted from each day's working window clipped to the range.
    pub fn resolve(profile: &WorkingHoursProfile, range: &Interval, busy: &[Interval]) -> Self {
        let merged_busy = merge_intervals(busy);
        let mut days = Vec::new();

        let mut date = range.start.date_naive();
        let last = range.end.date_naive();
        while date <= last {
            let free = match working_window(profile, date) {
                Some(window) => {
                    let clipped = Interval::new(
                        window.start.max(range.start),
                        window.end.min(range.end),
                    );
                    if clipped.is_empty() {
                        Vec::new()
                    } else {
                        subtract_all(&clipped, &merged_busy)
                    }
                }
                None => Vec::new(),
            };
            days.push(DayAvailability { date, free });
            date = date.succ_opt().expect("date overflow");
        }

        Self { days }
    }

    /// Per-day availability in date order.
    pub fn days(&self) -> &[DayAvailability] {
        &self.days
    }

    /// All free intervals in time order.
    pub fn free_intervals(&self) -> impl Iterator<Item = &Interval> {
        self.days.iter().flat_map(|d| d.free.iter())
    }

    /// Total free minutes remaining.
    pub fn total_free_minutes(&self) -> i64 {
        self.free_intervals().map(|iv| iv.duration_minutes()).sum()
    }

    /// Remove a placed slot so later placements see updated availability.
    pub fn consume(&mut self, slot: &Interval) {
        for day in &mut self.days {
            if day.free.iter().any(|iv| iv.overlaps(slot)) {
                let mut next = Vec::with_capacity(day.free.len() + 1);
                for iv in &day.free {
                    next.extend(crate::interval::subtract_one(iv, slot));
                }
                day.free = next;
            }
        }
    }
}

/// The working window of one civil day, if it is a working day.
pub fn working_window(profile: &WorkingHoursProfile, date: NaiveDate) -> Option<Interval> {
    let hours = profile.day(date.weekday());
    if !hours.is_working_day {
        return None;
    }
    let start: DateTime<Utc> = date.and_time(hours.start).and_utc();
    let end: DateTime<Utc> = date.and_time(hours.end).and_utc();
    Some(Interval::new(start, end))
}

/// Planning ranges spanning whole days: `[start 00:00, day after end 00:00)`.
pub fn day_range(start: NaiveDate, end: NaiveDate) -> Interval {
    Interval::new(
        start.and_hms_opt(0, 0, 0).expect("midnight").and_utc(),
        (end + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight")
            .and_utc(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()
    }

    #[test]
    fn working_day_yields_clipped_window() {
        let profile = WorkingHoursProfile::default();
        let range = day_range(monday(), monday());
        let availability = Availability::resolve(&profile, &range, &[]);
        assert_eq!(availability.days().len(), 2); // Mon + midnight boundary day
        let mon = &availability.days()[0];
        assert_eq!(mon.free, vec![Interval::new(utc(5, 9, 0), utc(5, 17, 0))]);
    }

    #[test]
    fn non_working_day_yields_nothing_despite_events() {
        let profile = WorkingHoursProfile::default();
        let saturday = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let range = day_range(saturday, saturday);
        // An event on a non-working day changes nothing.
        let busy = vec![Interval::new(utc(10, 10, 0), utc(10, 11, 0))];
        let availability = Availability::resolve(&profile, &range, &busy);
        assert!(availability.days().iter().all(|d| d.free.is_empty()));
    }

    #[test]
    fn busy_intervals_split_the_window() {
        let profile = WorkingHoursProfile::default();
        let range = day_range(monday(), monday());
        let busy = vec![
            Interval::new(utc(5, 12, 0), utc(5, 13, 0)),
            Interval::new(utc(5, 12, 30), utc(5, 14, 0)), // overlaps, merges
        ];
        let availability = Availability::resolve(&profile, &range, &busy);
        assert_eq!(
            availability.days()[0].free,
            vec![
                Interval::new(utc(5, 9, 0), utc(5, 12, 0)),
                Interval::new(utc(5, 14, 0), utc(5, 17, 0)),
            ]
        );
    }

    #[test]
    fn consume_updates_availability_for_later_placements() {
        let profile = WorkingHoursProfile::default();
        let range = day_range(monday(), monday());
        let mut availability = Availability::resolve(&profile, &range, &[]);

        availability.consume(&Interval::new(utc(5, 9, 0), utc(5, 10, 0)));
        assert_eq!(
            availability.days()[0].free,
            vec![Interval::new(utc(5, 10, 0), utc(5, 17, 0))]
        );
        assert_eq!(availability.total_free_minutes(), 7 * 60);
    }

    #[test]
    fn range_clips_partial_first_day() {
        let profile = WorkingHoursProfile::default();
        let range = Interval::new(utc(5, 11, 0), utc(5, 23, 0));
        let availability = Availability::resolve(&profile, &range, &[]);
        assert_eq!(
            availability.days()[0].free,
            vec![Interval::new(utc(5, 11, 0), utc(5, 17, 0))]
        );
    }
}
