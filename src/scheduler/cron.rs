// =============================================================================
// Minimal cron interpreter — evaluated in-process, no external scheduler
// =============================================================================
//
// Supports the standard 5-field form `minute hour day-of-month month
// day-of-week`, each field being `*`, a literal number, or a `*/N` step.
// That covers the one expression this system actually needs
// (`*/5 * * * *`) without pulling in a scheduling crate for a single cron
// string.
// =============================================================================

use chrono::{DateTime, Timelike, Utc};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Field {
    Any,
    Step(u32),
    Value(u32),
}

impl Field {
    fn parse(raw: &str) -> Result<Self> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        if let Some(step) = raw.strip_prefix("*/") {
            let n: u32 = step
                .parse()
                .map_err(|_| Error::Validation(format!("invalid cron step field: {raw}")))?;
            return Ok(Field::Step(n));
        }
        let n: u32 = raw
            .parse()
            .map_err(|_| Error::Validation(format!("invalid cron field: {raw}")))?;
        Ok(Field::Value(n))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Step(n) => *n > 0 && value % n == 0,
            Field::Value(n) => value == *n,
        }
    }
}

/// A parsed 5-field cron expression, matched at minute granularity.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(Error::Validation(format!(
                "cron expression must have 5 fields, got {}: '{expr}'",
                parts.len()
            )));
        }
        Ok(Self {
            minute: Field::parse(parts[0])?,
            hour: Field::parse(parts[1])?,
            day_of_month: Field::parse(parts[2])?,
            month: Field::parse(parts[3])?,
            day_of_week: Field::parse(parts[4])?,
        })
    }

    /// Whether `at` (truncated to the minute) matches this schedule.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        use chrono::Datelike;
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self.day_of_week.matches(at.weekday().num_days_from_sunday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_five_minutes_matches_multiples_of_five() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t5 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap();
        let t7 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 7, 0).unwrap();
        assert!(cron.matches(t0));
        assert!(cron.matches(t5));
        assert!(!cron.matches(t7));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(CronSchedule::parse("* * *").is_err());
        assert!(CronSchedule::parse("bad * * * *").is_err());
    }
}
