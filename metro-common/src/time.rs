//! Timestamp and calendar utilities

use chrono::{DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, NaiveTime, Utc};

/// Length of one calibration frequency unit
pub const CYCLE_DAYS: u64 = 30;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// First day of the month following the one containing `date`
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Half-open window `[month start, next month start)` around `date`
pub fn month_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (month_start(date), next_month_start(date))
}

/// `date + frequency * 30 days`, `None` past the supported calendar range
pub fn add_cycles(date: NaiveDate, frequency: u32) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(frequency) * CYCLE_DAYS))
}

/// Midnight UTC at the start of `date`
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
