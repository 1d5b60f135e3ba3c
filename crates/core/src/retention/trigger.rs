//! Calendar triggers.

use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::error::RetentionConfigError;

/// Decides when a job fires next.
pub trait Trigger: Send + Sync + 'static {
    /// First fire time strictly after `after`, or `None` if the trigger is
    /// exhausted.
    fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Recurring calendar slot, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarSchedule {
    /// Once a week.
    Weekly {
        /// Day of the week.
        weekday: Weekday,
        /// Hour (0-23).
        hour: u32,
        /// Minute (0-59).
        minute: u32,
    },
    /// Once a month. Days above 28 are rejected so every month has the slot.
    Monthly {
        /// Day of the month (1-28).
        day: u32,
        /// Hour (0-23).
        hour: u32,
        /// Minute (0-59).
        minute: u32,
    },
}

impl CalendarSchedule {
    /// Weekly slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the time of day is out of range.
    pub fn weekly(weekday: Weekday, hour: u32, minute: u32) -> Result<Self, RetentionConfigError> {
        let schedule = Self::Weekly {
            weekday,
            hour,
            minute,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Monthly slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the day or time of day is out of range.
    pub fn monthly(day: u32, hour: u32, minute: u32) -> Result<Self, RetentionConfigError> {
        let schedule = Self::Monthly { day, hour, minute };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first field out of range.
    pub fn validate(&self) -> Result<(), RetentionConfigError> {
        let (hour, minute) = match *self {
            Self::Weekly { hour, minute, .. } => (hour, minute),
            Self::Monthly { day, hour, minute } => {
                if !(1..=28).contains(&day) {
                    return Err(RetentionConfigError::new(format!(
                        "day of month must be 1-28, got {day}"
                    )));
                }
                (hour, minute)
            }
        };
        if hour > 23 {
            return Err(RetentionConfigError::new(format!(
                "hour must be 0-23, got {hour}"
            )));
        }
        if minute > 59 {
            return Err(RetentionConfigError::new(format!(
                "minute must be 0-59, got {minute}"
            )));
        }
        Ok(())
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
        date.and_hms_opt(hour, minute, 0).map(|t| t.and_utc())
    }
}

impl Trigger for CalendarSchedule {
    fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = after.date_naive();
        match *self {
            Self::Weekly {
                weekday,
                hour,
                minute,
            } => (0..=7)
                .filter_map(|offset| today.checked_add_days(chrono::Days::new(offset)))
                .filter(|date| date.weekday() == weekday)
                .filter_map(|date| Self::at(date, hour, minute))
                .find(|fire| *fire > after),
            Self::Monthly { day, hour, minute } => (0..=2)
                .filter_map(|offset| today.with_day(1)?.checked_add_months(Months::new(offset)))
                .filter_map(|month| month.with_day(day))
                .filter_map(|date| Self::at(date, hour, minute))
                .find(|fire| *fire > after),
        }
    }
}

impl fmt::Display for CalendarSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly {
                weekday,
                hour,
                minute,
            } => write!(f, "weekly on {weekday} at {hour:02}:{minute:02} UTC"),
            Self::Monthly { day, hour, minute } => {
                write!(f, "monthly on day {day} at {hour:02}:{minute:02} UTC")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    // 2026-03-01 is a Sunday.
    #[rstest]
    #[case(utc(2026, 2, 27, 12, 0), utc(2026, 3, 1, 2, 0))]
    #[case(utc(2026, 3, 1, 1, 59), utc(2026, 3, 1, 2, 0))]
    #[case(utc(2026, 3, 1, 2, 0), utc(2026, 3, 8, 2, 0))]
    #[case(utc(2026, 3, 1, 3, 0), utc(2026, 3, 8, 2, 0))]
    fn test_weekly_next_fire(#[case] after: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        let schedule = CalendarSchedule::weekly(Weekday::Sun, 2, 0).unwrap();
        assert_eq!(schedule.next_fire(after), Some(expected));
    }

    #[rstest]
    #[case(utc(2026, 1, 15, 0, 0), utc(2026, 2, 1, 3, 0))]
    #[case(utc(2026, 2, 1, 2, 0), utc(2026, 2, 1, 3, 0))]
    #[case(utc(2026, 2, 1, 3, 0), utc(2026, 3, 1, 3, 0))]
    #[case(utc(2026, 12, 31, 23, 0), utc(2027, 1, 1, 3, 0))]
    fn test_monthly_next_fire(#[case] after: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        let schedule = CalendarSchedule::monthly(1, 3, 0).unwrap();
        assert_eq!(schedule.next_fire(after), Some(expected));
    }

    #[test]
    fn test_monthly_day_28_in_february() {
        let schedule = CalendarSchedule::monthly(28, 0, 0).unwrap();
        assert_eq!(
            schedule.next_fire(utc(2026, 2, 28, 0, 1)),
            Some(utc(2026, 3, 28, 0, 0))
        );
    }

    #[rstest]
    #[case(CalendarSchedule::Monthly { day: 0, hour: 0, minute: 0 })]
    #[case(CalendarSchedule::Monthly { day: 29, hour: 0, minute: 0 })]
    #[case(CalendarSchedule::Weekly { weekday: Weekday::Mon, hour: 24, minute: 0 })]
    #[case(CalendarSchedule::Weekly { weekday: Weekday::Mon, hour: 0, minute: 60 })]
    fn test_invalid_schedules(#[case] schedule: CalendarSchedule) {
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_display() {
        let schedule = CalendarSchedule::weekly(Weekday::Sun, 2, 0).unwrap();
        assert_eq!(schedule.to_string(), "weekly on Sun at 02:00 UTC");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    proptest! {
        // The next fire is always in the future and within one period.
        #[test]
        fn prop_weekly_within_a_week(secs in 0i64..4_000_000_000, wd in 0u8..7, hour in 0u32..24, minute in 0u32..60) {
            let after = Utc.timestamp_opt(secs, 0).unwrap();
            let weekday = Weekday::try_from(wd).unwrap();
            let schedule = CalendarSchedule::weekly(weekday, hour, minute).unwrap();
            let fire = schedule.next_fire(after).unwrap();
            prop_assert!(fire > after);
            prop_assert!(fire - after <= chrono::Duration::days(7));
            prop_assert_eq!(fire.weekday(), weekday);
        }

        #[test]
        fn prop_monthly_hits_the_day(secs in 0i64..4_000_000_000, day in 1u32..=28, hour in 0u32..24) {
            let after = Utc.timestamp_opt(secs, 0).unwrap();
            let schedule = CalendarSchedule::monthly(day, hour, 0).unwrap();
            let fire = schedule.next_fire(after).unwrap();
            prop_assert!(fire > after);
            prop_assert!(fire - after <= chrono::Duration::days(31));
            prop_assert_eq!(fire.day(), day);
        }
    }
}
