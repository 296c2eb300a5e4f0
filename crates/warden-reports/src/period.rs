//! Period calculator, per spec §4.K's table.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::types::{Period, PeriodType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriodKind {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).unwrap())
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap().pred_opt().unwrap()
}

pub fn compute_period(kind: ReportPeriodKind, now: DateTime<Utc>) -> Period {
    let today = now.date_naive();

    match kind {
        ReportPeriodKind::Daily => {
            let yesterday = today.pred_opt().unwrap();
            Period { start: day_start(yesterday), end: day_end(yesterday), period_type: PeriodType::PointInTime }
        }
        ReportPeriodKind::Weekly => {
            let yesterday = today.pred_opt().unwrap();
            let week_ago = today - chrono::Duration::days(7);
            Period { start: day_start(week_ago), end: day_end(yesterday), period_type: PeriodType::Period }
        }
        ReportPeriodKind::Monthly => {
            let (prev_year, prev_month) = if today.month() == 1 { (today.year() - 1, 12) } else { (today.year(), today.month() - 1) };
            let start = NaiveDate::from_ymd_opt(prev_year, prev_month, 1).unwrap();
            let end = last_day_of_month(prev_year, prev_month);
            Period { start: day_start(start), end: day_end(end), period_type: PeriodType::Period }
        }
        ReportPeriodKind::Quarterly => {
            let current_quarter = (today.month0() / 3) + 1;
            let (prev_year, prev_quarter) = if current_quarter == 1 { (today.year() - 1, 4) } else { (today.year(), current_quarter - 1) };
            let start_month = (prev_quarter - 1) * 3 + 1;
            let end_month = start_month + 2;
            let start = NaiveDate::from_ymd_opt(prev_year, start_month, 1).unwrap();
            let end = last_day_of_month(prev_year, end_month);
            Period { start: day_start(start), end: day_end(end), period_type: PeriodType::Period }
        }
        ReportPeriodKind::Yearly => {
            let prev_year = today.year() - 1;
            let start = NaiveDate::from_ymd_opt(prev_year, 1, 1).unwrap();
            let end = NaiveDate::from_ymd_opt(prev_year, 12, 31).unwrap();
            Period { start: day_start(start), end: day_end(end), period_type: PeriodType::Period }
        }
    }
}
