//! Compliance classification of schedule entries
//!
//! An entry is satisfied once a live calibration of its instrument was
//! performed on or after the first day of the due date's month. Every
//! unsatisfied entry falls in exactly one bucket:
//!
//! | Bucket        | Condition                                   |
//! |---------------|---------------------------------------------|
//! | `overdue`     | due date (midnight UTC) is before now       |
//! | `upcoming`    | due within the next 30 days                 |
//! | `within_term` | anything further out                        |

use chrono::{DateTime, NaiveDate, Utc};
use metro_common::time::{month_start, start_of_day_utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::CalibrationError;
use crate::db::{calibrations, schedule};

/// Days ahead in which an unsatisfied entry counts as upcoming
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceBucket {
    Overdue,
    Upcoming,
    WithinTerm,
}

/// Whole days from `now` until the start of `due_date`, rounded up
pub fn days_until(due_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    let seconds = (start_of_day_utc(due_date) - now).num_seconds();
    (seconds + SECONDS_PER_DAY - 1).div_euclid(SECONDS_PER_DAY)
}

/// Bucket of one schedule entry, `None` when satisfied
pub fn classify(
    due_date: NaiveDate,
    now: DateTime<Utc>,
    satisfied: bool,
) -> Option<ComplianceBucket> {
    if satisfied {
        return None;
    }

    if start_of_day_utc(due_date) < now {
        return Some(ComplianceBucket::Overdue);
    }

    let days = days_until(due_date, now);
    if days > 0 && days <= UPCOMING_WINDOW_DAYS {
        Some(ComplianceBucket::Upcoming)
    } else {
        Some(ComplianceBucket::WithinTerm)
    }
}

/// Per-bucket counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub overdue: u64,
    pub upcoming: u64,
    pub within_term: u64,
}

impl ComplianceSummary {
    pub fn record(&mut self, bucket: ComplianceBucket) {
        match bucket {
            ComplianceBucket::Overdue => self.overdue += 1,
            ComplianceBucket::Upcoming => self.upcoming += 1,
            ComplianceBucket::WithinTerm => self.within_term += 1,
        }
    }

    pub fn tally<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = ComplianceBucket>,
    {
        let mut summary = Self::default();
        for bucket in buckets {
            summary.record(bucket);
        }
        summary
    }

    pub fn total(&self) -> u64 {
        self.overdue + self.upcoming + self.within_term
    }
}

/// An unsatisfied schedule entry with its bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedEntry {
    pub schedule_entry_id: Uuid,
    pub instrument_id: Uuid,
    pub instrument_code: String,
    pub instrument_name: String,
    pub location: Option<String>,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
    pub bucket: ComplianceBucket,
}

/// Tenant-wide classification
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceReport {
    pub summary: ComplianceSummary,
    /// Entries already covered by a calibration
    pub satisfied: u64,
    pub overdue: Vec<ClassifiedEntry>,
    pub upcoming: Vec<ClassifiedEntry>,
    pub within_term: Vec<ClassifiedEntry>,
}

impl ComplianceReport {
    fn push(&mut self, entry: ClassifiedEntry) {
        self.summary.record(entry.bucket);
        match entry.bucket {
            ComplianceBucket::Overdue => self.overdue.push(entry),
            ComplianceBucket::Upcoming => self.upcoming.push(entry),
            ComplianceBucket::WithinTerm => self.within_term.push(entry),
        }
    }
}

/// Classify every schedule entry of a tenant's live instruments
pub async fn evaluate_tenant(
    pool: &SqlitePool,
    tenant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ComplianceReport, CalibrationError> {
    let mut conn = pool.acquire().await?;
    let entries = schedule::list_for_tenant(&mut conn, tenant_id).await?;

    let mut report = ComplianceReport::default();
    for scheduled in entries {
        let due_date = scheduled.entry.due_date;
        let satisfied = calibrations::performed_since(
            &mut conn,
            scheduled.entry.instrument_id,
            month_start(due_date),
        )
        .await?;

        match classify(due_date, now, satisfied) {
            Some(bucket) => report.push(ClassifiedEntry {
                schedule_entry_id: scheduled.entry.id,
                instrument_id: scheduled.entry.instrument_id,
                instrument_code: scheduled.instrument_code,
                instrument_name: scheduled.instrument_name,
                location: scheduled.location,
                due_date,
                days_until_due: days_until(due_date, now),
                bucket,
            }),
            None => report.satisfied += 1,
        }
    }

    debug!(
        tenant_id = %tenant_id,
        overdue = report.summary.overdue,
        upcoming = report.summary.upcoming,
        within_term = report.summary.within_term,
        satisfied = report.satisfied,
        "Evaluated compliance"
    );

    Ok(report)
}
