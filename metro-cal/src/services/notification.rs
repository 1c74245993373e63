//! Monthly calibration reminder job
//!
//! On the first day of each month at 02:00 local time the job collects the
//! schedule entries due that month, skips instruments already calibrated
//! inside the due month, and sends one reminder per calibration
//! administrator of the owning tenant in a single dispatch batch.
//!
//! A sweep never overlaps another one: a second trigger while a sweep is in
//! progress returns [`SweepOutcome::AlreadyRunning`]. A failure while
//! preparing one entry is logged and counted, and the sweep moves on.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use metro_common::time::{month_start, month_window, next_month_start, today};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::dispatch_client::{DispatchBatch, MessageDispatcher, OutboundMessage};
use super::CalibrationError;
use crate::db::schedule::ScheduledInstrument;
use crate::db::{calibrations, schedule, tenants};
use crate::models::User;

/// Hour of the monthly run, local time
pub const RUN_HOUR: u32 = 2;

/// Sender shown on every reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub name: String,
    pub address: String,
}

/// What happened to the batch at the end of a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// No reminder was built, nothing was sent
    NothingToSend,
    Delivered { http_status: u16, messages: usize },
    Rejected { http_status: u16, messages: usize },
    Failed { reason: String, messages: usize },
}

/// Counters of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub month: NaiveDate,
    pub entries_due: usize,
    pub entries_satisfied: usize,
    pub entries_without_recipients: usize,
    pub entries_failed: usize,
    pub reminders: usize,
    pub dispatch: DispatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed(SweepReport),
    AlreadyRunning,
}

/// Clears the running flag when the sweep ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct NotificationJob {
    db: SqlitePool,
    dispatcher: Arc<dyn MessageDispatcher>,
    sender: SenderIdentity,
    running: AtomicBool,
}

impl NotificationJob {
    pub fn new(
        db: SqlitePool,
        dispatcher: Arc<dyn MessageDispatcher>,
        sender: SenderIdentity,
    ) -> Self {
        Self {
            db,
            dispatcher,
            sender,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sweep over the calendar month containing `today`
    pub async fn run_sweep(&self, today: NaiveDate) -> Result<SweepOutcome, CalibrationError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Calibration reminder sweep already running, skipping");
            return Ok(SweepOutcome::AlreadyRunning);
        };

        let month = month_start(today);
        info!(month = %month, "Starting calibration reminder sweep");

        let (messages, mut report) = self.prepare_reminders(month).await?;
        report.dispatch = self.send(messages).await;

        info!(
            month = %month,
            entries_due = report.entries_due,
            entries_satisfied = report.entries_satisfied,
            entries_failed = report.entries_failed,
            reminders = report.reminders,
            "Calibration reminder sweep finished"
        );

        Ok(SweepOutcome::Completed(report))
    }

    /// Build the reminders for every entry due in the month starting at
    /// `month`; the connection is released before dispatch
    async fn prepare_reminders(
        &self,
        month: NaiveDate,
    ) -> Result<(Vec<OutboundMessage>, SweepReport), CalibrationError> {
        let mut conn = self.db.acquire().await?;
        let due = schedule::due_between(&mut conn, month, next_month_start(month)).await?;

        let mut report = SweepReport {
            month,
            entries_due: due.len(),
            entries_satisfied: 0,
            entries_without_recipients: 0,
            entries_failed: 0,
            reminders: 0,
            dispatch: DispatchStatus::NothingToSend,
        };
        let mut messages = Vec::new();

        for scheduled in &due {
            match self.reminders_for(&mut conn, scheduled).await {
                Ok(None) => report.entries_satisfied += 1,
                Ok(Some(built)) if built.is_empty() => {
                    warn!(
                        tenant_id = %scheduled.entry.tenant_id,
                        instrument = %scheduled.instrument_code,
                        "No calibration administrator to remind"
                    );
                    report.entries_without_recipients += 1;
                }
                Ok(Some(built)) => messages.extend(built),
                Err(e) => {
                    warn!(
                        schedule_entry_id = %scheduled.entry.id,
                        instrument = %scheduled.instrument_code,
                        error = %e,
                        "Skipping schedule entry"
                    );
                    report.entries_failed += 1;
                }
            }
        }

        report.reminders = messages.len();
        Ok((messages, report))
    }

    /// Reminders for one entry, `None` when its due month already holds a
    /// calibration
    async fn reminders_for(
        &self,
        conn: &mut SqliteConnection,
        scheduled: &ScheduledInstrument,
    ) -> metro_common::Result<Option<Vec<OutboundMessage>>> {
        let instrument_id = scheduled.entry.instrument_id;
        let (start, end) = month_window(scheduled.entry.due_date);

        if calibrations::performed_between(conn, instrument_id, start, end).await? {
            return Ok(None);
        }

        let recipients = tenants::calibration_admins(conn, scheduled.entry.tenant_id).await?;
        let certificate = calibrations::latest_certificate(conn, instrument_id).await?;

        Ok(Some(
            recipients
                .iter()
                .map(|user| build_reminder(&self.sender, user, scheduled, certificate.as_deref()))
                .collect(),
        ))
    }

    async fn send(&self, messages: Vec<OutboundMessage>) -> DispatchStatus {
        if messages.is_empty() {
            info!("No calibration reminders to send");
            return DispatchStatus::NothingToSend;
        }

        let count = messages.len();
        let batch = DispatchBatch { messages };

        match self.dispatcher.dispatch(&batch).await {
            Ok(receipt) if receipt.is_success() => {
                info!(http_status = receipt.http_status, messages = count, "Reminder batch dispatched");
                DispatchStatus::Delivered {
                    http_status: receipt.http_status,
                    messages: count,
                }
            }
            Ok(receipt) => {
                warn!(http_status = receipt.http_status, messages = count, "Reminder batch rejected");
                DispatchStatus::Rejected {
                    http_status: receipt.http_status,
                    messages: count,
                }
            }
            Err(e) => {
                error!(error = %e, messages = count, "Reminder batch dispatch failed");
                DispatchStatus::Failed {
                    reason: e.to_string(),
                    messages: count,
                }
            }
        }
    }
}

/// Reminder addressed to one administrator
pub fn build_reminder(
    sender: &SenderIdentity,
    recipient: &User,
    scheduled: &ScheduledInstrument,
    certificate: Option<&str>,
) -> OutboundMessage {
    let location = scheduled
        .location
        .as_deref()
        .map(|l| format!(" at {}", l))
        .unwrap_or_default();

    let body = format!(
        "Hello {recipient},\n\n\
         Instrument {code} ({name}){location} is due for calibration on {due}.\n\
         Last certificate: {certificate}.\n\n\
         Please record the calibration before the end of the month.\n\n\
         {sender}",
        recipient = recipient.name,
        code = scheduled.instrument_code,
        name = scheduled.instrument_name,
        location = location,
        due = scheduled.entry.due_date.format("%Y-%m-%d"),
        certificate = certificate.unwrap_or("none on record"),
        sender = sender.name,
    );

    OutboundMessage {
        subject: format!(
            "Calibration due: {} {}",
            scheduled.instrument_code, scheduled.instrument_name
        ),
        sender: sender.name.clone(),
        recipient_name: recipient.name.clone(),
        sender_address: sender.address.clone(),
        recipient_address: recipient.email.clone(),
        body,
    }
}

/// First scheduled run (day 1 of a month, 02:00) strictly after `after`
pub fn next_run_after(after: NaiveDateTime) -> NaiveDateTime {
    let run_time = NaiveTime::from_hms_opt(RUN_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let this_month = month_start(after.date()).and_time(run_time);
    if this_month > after {
        this_month
    } else {
        next_month_start(after.date()).and_time(run_time)
    }
}

/// Sleep until each monthly run and execute the sweep
pub fn spawn_monthly_schedule(job: Arc<NotificationJob>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now().naive_local();
            let next = next_run_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "Calibration reminder sweep scheduled");

            tokio::time::sleep(wait).await;

            match job.run_sweep(today()).await {
                Ok(SweepOutcome::Completed(_)) | Ok(SweepOutcome::AlreadyRunning) => {}
                Err(e) => error!(error = %e, "Calibration reminder sweep aborted"),
            }
        }
    })
}
