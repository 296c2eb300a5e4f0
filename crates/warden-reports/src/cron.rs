//! Cron expression parsing and next-run computation, per spec §4.K.
//!
//! Accepts standard 5-field expressions (`minute hour day-of-month month
//! day-of-week`) with `*`, `,`, `-`, and `*/n`; 7-field (and 6-field)
//! variants are rejected before ever reaching the parser. The `cron` crate
//! itself speaks the Quartz dialect (seconds-first, 6/7 fields), so a literal
//! `"0"` seconds field is prepended internally — callers never see it.

use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use cron::Schedule;

use crate::error::ReportError;

pub fn validate(expr: &str) -> Result<(), ReportError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ReportError::InvalidCronExpression(format!(
            "expected 5 fields (minute hour dom month dow), got {}",
            fields.len()
        )));
    }
    to_schedule(expr)?;
    Ok(())
}

fn to_schedule(expr: &str) -> Result<Schedule, ReportError> {
    let quartz_form = format!("0 {expr}");
    Schedule::from_str(&quartz_form).map_err(|e| ReportError::InvalidCronExpression(e.to_string()))
}

/// Returns the next firing time strictly after `from`, operating in the
/// host's local time per spec §4.K ("returns the next firing time...in the
/// host's local time").
pub fn next_run_after(expr: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, ReportError> {
    validate(expr)?;
    let schedule = to_schedule(expr)?;
    let local_from: DateTime<Local> = from.with_timezone(&Local);
    let next = schedule
        .after(&local_from)
        .next()
        .ok_or_else(|| ReportError::InvalidCronExpression("no future occurrence".to_string()))?;
    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expression_is_accepted() {
        assert!(validate("0 9 * * *").is_ok());
    }

    #[test]
    fn seven_field_expression_is_rejected() {
        assert!(validate("0 0 9 * * * 2024").is_err());
    }

    #[test]
    fn step_values_and_ranges_parse() {
        assert!(validate("*/15 9-17 * * 1-5").is_ok());
    }

    #[test]
    fn next_run_is_strictly_after_from() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", from).unwrap();
        assert!(next > from);
    }
}
