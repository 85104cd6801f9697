//! Working-hours profiles.
//!
//! A profile holds one [`DayHours`] per weekday. New users get the stock
//! 09:00-17:00 Monday-Friday profile with non-working weekends; preference
//! updates replace individual days.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::task::EnergyLevel;

/// Parse an "HH:mm" 24-hour time string.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ValidationError::InvalidTimeFormat(value.to_string()))
}

/// Working hours and energy label for one weekday.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub is_working_day: bool,
    /// Energy label for the day, matched against task requirements
    pub energy: EnergyLevel,
}

impl DayHours {
    /// Build from validated "HH:mm" strings.
    pub fn from_hhmm(
        start: &str,
        end: &str,
        is_working_day: bool,
        energy: EnergyLevel,
    ) -> Result<Self, ValidationError> {
        let start_t = parse_hhmm(start)?;
        let end_t = parse_hhmm(end)?;
        if end_t <= start_t {
            return Err(ValidationError::InvertedWorkingHours {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start: start_t,
            end: end_t,
            is_working_day,
            energy,
        })
    }

    fn default_workday() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            is_working_day: true,
            energy: EnergyLevel::Medium,
        }
    }

    fn default_weekend() -> Self {
        Self {
            is_working_day: false,
            ..Self::default_workday()
        }
    }
}

/// Per-weekday working hours for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHoursProfile {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

impl Default for WorkingHoursProfile {
    fn default() -> Self {
        Self {
            monday: DayHours::default_workday(),
            tuesday: DayHours::default_workday(),
            wednesday: DayHours::default_workday(),
            thursday: DayHours::default_workday(),
            friday: DayHours::default_workday(),
            saturday: DayHours::default_weekend(),
            sunday: DayHours::default_weekend(),
        }
    }
}

impl WorkingHoursProfile {
    /// Hours for a given weekday.
    pub fn day(&self, weekday: Weekday) -> &DayHours {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Replace the hours for a given weekday.
    pub fn set_day(&mut self, weekday: Weekday, hours: DayHours) {
        match weekday {
            Weekday::Mon => self.monday = hours,
            Weekday::Tue => self.tuesday = hours,
            Weekday::Wed => self.wednesday = hours,
            Weekday::Thu => self.thursday = hours,
            Weekday::Fri => self.friday = hours,
            Weekday::Sat => self.saturday = hours,
            Weekday::Sun => self.sunday = hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hhmm() {
        assert_eq!(
            parse_hhmm("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_hhmm("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_hhmm() {
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("9am").is_err());
        assert!(parse_hhmm("09:60").is_err());
        assert!(parse_hhmm("").is_err());
    }

    #[test]
    fn rejects_inverted_working_hours() {
        let result = DayHours::from_hhmm("17:00", "09:00", true, EnergyLevel::Medium);
        assert!(matches!(
            result,
            Err(ValidationError::InvertedWorkingHours { .. })
        ));
    }

    #[test]
    fn default_profile_is_nine_to_five_weekdays() {
        let profile = WorkingHoursProfile::default();
        assert!(profile.day(Weekday::Mon).is_working_day);
        assert!(profile.day(Weekday::Fri).is_working_day);
        assert!(!profile.day(Weekday::Sat).is_working_day);
        assert!(!profile.day(Weekday::Sun).is_working_day);
        assert_eq!(
            profile.day(Weekday::Wed).start,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            profile.day(Weekday::Wed).end,
            NaiveTime::from_hms_opt(17, 0, 0).unwrap()
        );
    }

    #[test]
    fn set_day_replaces_hours() {
        let mut profile = WorkingHoursProfile::default();
        let late = DayHours::from_hhmm("12:00", "20:00", true, EnergyLevel::High).unwrap();
        profile.set_day(Weekday::Sat, late);
        assert!(profile.day(Weekday::Sat).is_working_day);
        assert_eq!(profile.day(Weekday::Sat).energy, EnergyLevel::High);
    }
}
