//! Cron-spec parsing and next-fire-time computation.
//!
//! The teacher's `settlement::scheduler::ScheduleConfig` only ever modeled a
//! handful of fixed daily times; `ScheduledTask.cronspec` needs the general
//! five-field form (`minute hour day-of-month month day-of-week`) plus the
//! literal `"* * *"`, which the tests use to mean "fire on every scheduler
//! tick" rather than a time-of-day match. No crate in the teacher's
//! dependency set parses cron, so this reimplements field-set matching
//! directly over `chrono` rather than reach for an unrelated dependency.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// A parsed `ScheduledTask.cronspec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronSpec {
    /// The literal `"* * *"`: fires on every scheduler tick, irrespective
    /// of wall-clock time.
    EveryTick,
    /// A standard five-field cron expression.
    Standard(StandardCron),
}

/// One field of a five-field cron expression: `*`, a comma-separated list
/// of values, or `*/step`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Any,
    Step(u32),
    Values(Vec<u32>),
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32) -> Result<Self> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        if let Some(step_str) = raw.strip_prefix("*/") {
            let step = step_str
                .parse::<u32>()
                .map_err(|_| Error::InvalidCronSpec(raw.to_string(), "bad step".into()))?;
            if step == 0 {
                return Err(Error::InvalidCronSpec(raw.to_string(), "step of 0".into()));
            }
            return Ok(Field::Step(step));
        }
        let values = raw
            .split(',')
            .map(|v| v.parse::<u32>().map_err(|_| Error::InvalidCronSpec(raw.to_string(), "bad value".into())))
            .collect::<Result<Vec<u32>>>()?;
        for &v in &values {
            if v < min || v > max {
                return Err(Error::InvalidCronSpec(
                    raw.to_string(),
                    format!("value {v} out of range {min}..={max}"),
                ));
            }
        }
        Ok(Field::Values(values))
    }

    fn matches(&self, value: u32, min: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Step(step) => (value - min) % step == 0,
            Field::Values(values) => values.contains(&value),
        }
    }
}

/// A standard `minute hour day-of-month month day-of-week` cron expression.
/// `day-of-week` is `0..=6` with `0` meaning Sunday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardCron {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl StandardCron {
    fn matches(&self, t: &DateTime<Utc>) -> bool {
        self.minute.matches(t.minute(), 0)
            && self.hour.matches(t.hour(), 0)
            && self.day_of_month.matches(t.day(), 1)
            && self.month.matches(t.month(), 1)
            && self.day_of_week.matches(t.weekday().num_days_from_sunday(), 0)
    }
}

impl CronSpec {
    /// Parse a cronspec: either the literal `"* * *"` or a five-field
    /// standard cron expression.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == "* * *" {
            return Ok(CronSpec::EveryTick);
        }
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::InvalidCronSpec(
                raw.to_string(),
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }
        Ok(CronSpec::Standard(StandardCron {
            minute: Field::parse(fields[0], 0, 59)?,
            hour: Field::parse(fields[1], 0, 23)?,
            day_of_month: Field::parse(fields[2], 1, 31)?,
            month: Field::parse(fields[3], 1, 12)?,
            day_of_week: Field::parse(fields[4], 0, 6)?,
        }))
    }

    /// The next fire time strictly after `after`. For [`CronSpec::EveryTick`]
    /// this is always one second later; for [`CronSpec::Standard`] it is the
    /// next minute boundary (seconds truncated to zero) whose fields match,
    /// searched up to one year ahead.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            CronSpec::EveryTick => after + Duration::seconds(1),
            CronSpec::Standard(cron) => {
                let mut candidate = (after + Duration::minutes(1))
                    .with_second(0)
                    .and_then(|t| t.with_nanosecond(0))
                    .expect("zeroing seconds/nanos never overflows");
                let limit = after + Duration::days(366);
                while candidate < limit {
                    if cron.matches(&candidate) {
                        return candidate;
                    }
                    candidate += Duration::minutes(1);
                }
                // No match found in the search horizon; fall back to one
                // tick later so the task is retried rather than stalled.
                after + Duration::seconds(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn every_tick_literal_fires_one_second_later() {
        let spec = CronSpec::parse("* * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(spec.next_after(now), now + Duration::seconds(1));
    }

    #[test]
    fn standard_all_wildcards_fires_next_minute() {
        let spec = CronSpec::parse("* * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 15).unwrap();
        let next = spec.next_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 10, 31, 0).unwrap());
    }

    #[test]
    fn standard_fixed_hour_and_minute_wraps_to_tomorrow() {
        let spec = CronSpec::parse("0 6 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = spec.next_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 6, 0, 0).unwrap());
    }

    #[test]
    fn standard_step_field_matches_every_15_minutes() {
        let spec = CronSpec::parse("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 16, 0).unwrap();
        let next = spec.next_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronSpec::parse("* * *  *").is_err() || CronSpec::parse("* *").is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(CronSpec::parse("60 * * * *").is_err());
    }

    proptest! {
        /// `next_after` must always move strictly forward, for the every-tick
        /// literal and for every standard cron field combination the search
        /// horizon can resolve.
        #[test]
        fn next_after_is_always_strictly_later(
            epoch_secs in 0i64..2_000_000_000,
            minute_step in prop_oneof![Just("*".to_string()), Just("*/5".to_string()), Just("*/30".to_string())],
            hour_step in prop_oneof![Just("*".to_string()), Just("*/3".to_string())],
        ) {
            let now = Utc.timestamp_opt(epoch_secs, 0).unwrap();
            let spec = CronSpec::parse(&format!("{minute_step} {hour_step} * * *")).unwrap();
            let next = spec.next_after(now);
            prop_assert!(next > now);
        }

        #[test]
        fn every_tick_always_advances_by_exactly_one_second(epoch_secs in 0i64..2_000_000_000) {
            let now = Utc.timestamp_opt(epoch_secs, 0).unwrap();
            let spec = CronSpec::EveryTick;
            prop_assert_eq!(spec.next_after(now), now + Duration::seconds(1));
        }
    }
}
