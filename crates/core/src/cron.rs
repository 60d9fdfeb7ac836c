// Cron expression evaluation
//
// Accepts standard 5-field crontab expressions (seconds optional) and an IANA
// timezone name. Only the next trigger time is computed; executing schedules
// is somebody else's job.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use thiserror::Error;

/// Timezone used when a schedule does not name one
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("cron expression '{0}' has no upcoming run")]
    NoUpcomingRun(String),
}

/// Next trigger strictly after `after`, evaluated in `timezone`
pub fn next_run_at(
    expression: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, CronError> {
    let tz: Tz = timezone
        .trim()
        .parse()
        .map_err(|_| CronError::UnknownTimezone(timezone.to_string()))?;

    let cron = Cron::new(expression.trim())
        .with_seconds_optional()
        .parse()
        .map_err(|e| CronError::InvalidExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

    let local = after.with_timezone(&tz);
    let next = cron
        .find_next_occurrence(&local, false)
        .map_err(|_| CronError::NoUpcomingRun(expression.to_string()))?;

    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_in_utc() {
        let next = next_run_at("0 9 * * *", "UTC", at(2025, 3, 10, 10, 0)).unwrap();
        assert_eq!(next, at(2025, 3, 11, 9, 0));
    }

    #[test]
    fn test_next_is_strictly_after() {
        let next = next_run_at("0 9 * * *", "UTC", at(2025, 3, 10, 9, 0)).unwrap();
        assert_eq!(next, at(2025, 3, 11, 9, 0));
    }

    #[test]
    fn test_respects_timezone() {
        // 09:00 in New York during EDT is 13:00 UTC
        let next = next_run_at("0 9 * * *", "America/New_York", at(2025, 6, 2, 0, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 2, 13, 0));
    }

    #[test]
    fn test_weekdays_only() {
        // 2025-03-08 is a Saturday
        let next = next_run_at("30 8 * * 1-5", "UTC", at(2025, 3, 8, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 3, 10, 8, 30));
    }

    #[test]
    fn test_invalid_expression() {
        let err = next_run_at("not a cron", "UTC", Utc::now()).unwrap_err();
        assert!(matches!(err, CronError::InvalidExpression { .. }));
    }

    #[test]
    fn test_unknown_timezone() {
        let err = next_run_at("0 9 * * *", "Mars/Olympus", Utc::now()).unwrap_err();
        assert_eq!(err, CronError::UnknownTimezone("Mars/Olympus".to_string()));
    }
}
