//! Calendar events and recurrence expansion.
//!
//! The planner treats events as opaque busy intervals. Recurring events are
//! expanded to concrete occurrences over the planning horizon before use;
//! origin (native or externally synced) makes no difference downstream.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::interval::Interval;

/// Recurrence rule for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepeatRule {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Default for RepeatRule {
    fn default() -> Self {
        RepeatRule::None
    }
}

/// Invitation status of a participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl Default for InviteStatus {
    fn default() -> Self {
        InviteStatus::Pending
    }
}

/// An invited participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub email: String,
    #[serde(default)]
    pub status: InviteStatus,
}

/// A calendar event owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    /// Unique identifier (UUIDv4)
    pub id: String,
    /// Owning user id
    pub owner_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// All-day events block the entire working window of their day
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub repeat: RepeatRule,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// Create a one-off event.
    pub fn new(
        owner_id: &str,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvertedEvent(title.to_string()));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            start,
            end,
            all_day: false,
            repeat: RepeatRule::None,
            participants: Vec::new(),
            location: None,
            description: None,
            created_at: Utc::now(),
        })
    }

    /// Busy interval of a single occurrence starting at `start`.
    ///
    /// All-day occurrences cover their full civil day so they blot out any
    /// working window they touch.
    fn occurrence_interval(&self, start: DateTime<Utc>) -> Interval {
        if self.all_day {
            let day_start = start
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc();
            Interval::new(day_start, day_start + Duration::days(1))
        } else {
            Interval::new(start, start + (self.end - self.start))
        }
    }

    /// Expand this event into concrete busy intervals intersecting `range`.
    ///
    /// Daily and weekly rules fast-forward arithmetically to the horizon;
    /// monthly and yearly rules step with calendar-aware month arithmetic
    /// (chrono clamps the 31st to shorter months).
    pub fn expand_occurrences(&self, range: &Interval) -> Vec<Interval> {
        let mut occurrences = Vec::new();
        let duration = self.end - self.start;

        match self.repeat {
            RepeatRule::None => {
                let occ = self.occurrence_interval(self.start);
                if occ.overlaps(range) {
                    occurrences.push(occ);
                }
            }
            RepeatRule::Daily | RepeatRule::Weekly => {
                let step_days = if self.repeat == RepeatRule::Daily { 1 } else { 7 };
                let step = Duration::days(step_days);
                let mut start = self.start;
                // Skip whole periods that end before the range starts.
                if start + duration < range.start {
                    let behind = (range.start - (start + duration)).num_days();
                    start += Duration::days((behind / step_days) * step_days);
                }
                while start < range.end {
                    let occ = self.occurrence_interval(start);
                    if occ.overlaps(range) {
                        occurrences.push(occ);
                    }
                    start += step;
                }
            }
            RepeatRule::Monthly | RepeatRule::Yearly => {
                let months = if self.repeat == RepeatRule::Monthly { 1 } else { 12 };
                let mut start = self.start;
                while start < range.end {
                    let occ = self.occurrence_interval(start);
                    if occ.overlaps(range) {
                        occurrences.push(occ);
                    }
                    start = match start.checked_add_months(Months::new(months)) {
                        Some(next) => next,
                        None => break,
                    };
                }
            }
        }

        occurrences
    }
}

/// Expand every event into busy intervals over `range`, unsorted.
pub fn expand_events(events: &[CalendarEvent], range: &Interval) -> Vec<Interval> {
    events
        .iter()
        .flat_map(|e| e.expand_occurrences(range))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn week_range() -> Interval {
        Interval::new(utc(2025, 5, 5, 0, 0), utc(2025, 5, 12, 0, 0))
    }

    #[test]
    fn rejects_inverted_events() {
        assert!(
            CalendarEvent::new("u1", "Bad", utc(2025, 5, 5, 11, 0), utc(2025, 5, 5, 10, 0))
                .is_err()
        );
    }

    #[test]
    fn one_off_event_inside_range() {
        let event =
            CalendarEvent::new("u1", "Review", utc(2025, 5, 6, 14, 0), utc(2025, 5, 6, 15, 0))
                .unwrap();
        let occ = event.expand_occurrences(&week_range());
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].start, utc(2025, 5, 6, 14, 0));
    }

    #[test]
    fn one_off_event_outside_range_is_dropped() {
        let event =
            CalendarEvent::new("u1", "Old", utc(2025, 4, 1, 14, 0), utc(2025, 4, 1, 15, 0))
                .unwrap();
        assert!(event.expand_occurrences(&week_range()).is_empty());
    }

    #[test]
    fn daily_event_expands_once_per_day() {
        let mut event =
            CalendarEvent::new("u1", "Standup", utc(2025, 4, 1, 9, 0), utc(2025, 4, 1, 9, 15))
                .unwrap();
        event.repeat = RepeatRule::Daily;
        let occ = event.expand_occurrences(&week_range());
        assert_eq!(occ.len(), 7);
        assert!(occ.iter().all(|iv| iv.duration_minutes() == 15));
        assert_eq!(occ[0].start, utc(2025, 5, 5, 9, 0));
    }

    #[test]
    fn weekly_event_expands_on_matching_weekday() {
        let mut event =
            CalendarEvent::new("u1", "1:1", utc(2025, 4, 7, 13, 0), utc(2025, 4, 7, 13, 30))
                .unwrap(); // a Monday
        event.repeat = RepeatRule::Weekly;
        let occ = event.expand_occurrences(&week_range());
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].start, utc(2025, 5, 5, 13, 0));
    }

    #[test]
    fn monthly_event_clamps_short_months() {
        let mut event = CalendarEvent::new(
            "u1",
            "Invoice day",
            utc(2025, 1, 31, 10, 0),
            utc(2025, 1, 31, 11, 0),
        )
        .unwrap();
        event.repeat = RepeatRule::Monthly;
        let range = Interval::new(utc(2025, 2, 1, 0, 0), utc(2025, 3, 1, 0, 0));
        let occ = event.expand_occurrences(&range);
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].start.day(), 28);
    }

    #[test]
    fn all_day_event_blocks_the_whole_day() {
        let mut event =
            CalendarEvent::new("u1", "Offsite", utc(2025, 5, 6, 9, 0), utc(2025, 5, 6, 10, 0))
                .unwrap();
        event.all_day = true;
        let occ = event.expand_occurrences(&week_range());
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].start, utc(2025, 5, 6, 0, 0));
        assert_eq!(occ[0].end, utc(2025, 5, 7, 0, 0));
    }
}
