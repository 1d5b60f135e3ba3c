//! Retention policy configuration.

use autodocs_shared::{RetentionSettings, ScheduleSettings};
use chrono::{TimeDelta, Weekday};

use super::error::RetentionConfigError;
use super::trigger::CalendarSchedule;

/// Retention windows and job schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Age after which unclaimed temp uploads are removed.
    pub temp_retention: TimeDelta,
    /// Age after which soft-deleted objects are purged.
    pub soft_delete_retention: TimeDelta,
    /// Records fetched per page. A run pages until nothing eligible is
    /// left.
    pub page_size: u64,
    /// When the temp cleanup runs.
    pub temp_schedule: CalendarSchedule,
    /// When the soft-delete purge runs.
    pub purge_schedule: CalendarSchedule,
}

impl RetentionConfig {
    /// Default temp window: 7 days.
    pub const DEFAULT_TEMP_RETENTION_DAYS: i64 = 7;
    /// Default soft-delete window: 30 days.
    pub const DEFAULT_SOFT_DELETE_RETENTION_DAYS: i64 = 30;
    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: u64 = 1000;
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            temp_retention: TimeDelta::days(Self::DEFAULT_TEMP_RETENTION_DAYS),
            soft_delete_retention: TimeDelta::days(Self::DEFAULT_SOFT_DELETE_RETENTION_DAYS),
            page_size: Self::DEFAULT_PAGE_SIZE,
            // Sunday 02:00 UTC
            temp_schedule: CalendarSchedule::Weekly {
                weekday: Weekday::Sun,
                hour: 2,
                minute: 0,
            },
            // 1st of the month, 03:00 UTC
            purge_schedule: CalendarSchedule::Monthly {
                day: 1,
                hour: 3,
                minute: 0,
            },
        }
    }
}

impl TryFrom<&ScheduleSettings> for CalendarSchedule {
    type Error = RetentionConfigError;

    fn try_from(settings: &ScheduleSettings) -> Result<Self, Self::Error> {
        match settings {
            ScheduleSettings::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let weekday = weekday.parse::<Weekday>().map_err(|_| {
                    RetentionConfigError::new(format!("unknown weekday '{weekday}'"))
                })?;
                Self::weekly(weekday, *hour, *minute)
            }
            ScheduleSettings::Monthly { day, hour, minute } => Self::monthly(*day, *hour, *minute),
        }
    }
}

impl TryFrom<&RetentionSettings> for RetentionConfig {
    type Error = RetentionConfigError;

    fn try_from(settings: &RetentionSettings) -> Result<Self, Self::Error> {
        if settings.temp_retention_days == 0 {
            return Err(RetentionConfigError::new("temp_retention_days must be > 0"));
        }
        if settings.soft_delete_retention_days == 0 {
            return Err(RetentionConfigError::new(
                "soft_delete_retention_days must be > 0",
            ));
        }
        if settings.page_size == 0 {
            return Err(RetentionConfigError::new("page_size must be > 0"));
        }

        Ok(Self {
            temp_retention: TimeDelta::days(i64::from(settings.temp_retention_days)),
            soft_delete_retention: TimeDelta::days(i64::from(
                settings.soft_delete_retention_days,
            )),
            page_size: settings.page_size,
            temp_schedule: CalendarSchedule::try_from(&settings.temp_schedule)?,
            purge_schedule: CalendarSchedule::try_from(&settings.purge_schedule)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings_defaults() {
        let from_settings = RetentionConfig::try_from(&RetentionSettings::default()).unwrap();
        assert_eq!(from_settings, RetentionConfig::default());
        assert_eq!(from_settings.temp_retention, TimeDelta::days(7));
        assert_eq!(from_settings.soft_delete_retention, TimeDelta::days(30));
    }

    #[test]
    fn test_weekday_names() {
        for name in ["sun", "Sunday", "SUN"] {
            let schedule = CalendarSchedule::try_from(&ScheduleSettings::Weekly {
                weekday: name.to_string(),
                hour: 2,
                minute: 0,
            })
            .unwrap();
            assert!(matches!(
                schedule,
                CalendarSchedule::Weekly {
                    weekday: Weekday::Sun,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut settings = RetentionSettings::default();
        settings.purge_schedule = ScheduleSettings::Monthly {
            day: 31,
            hour: 0,
            minute: 0,
        };
        assert!(RetentionConfig::try_from(&settings).is_err());

        let mut settings = RetentionSettings::default();
        settings.temp_retention_days = 0;
        assert!(RetentionConfig::try_from(&settings).is_err());

        let bad_weekday = ScheduleSettings::Weekly {
            weekday: "someday".to_string(),
            hour: 0,
            minute: 0,
        };
        assert!(CalendarSchedule::try_from(&bad_weekday).is_err());
    }
}
