//! Calibration lifecycle engine
//!
//! Records calibrations, applies corrections and soft-deletes records. Every
//! operation that touches more than one row runs inside a single
//! transaction; dropping the transaction on an early return rolls it back.

use metro_common::time::add_cycles;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::CalibrationError;
use crate::db::{calibrations, instruments, schedule};
use crate::models::{
    Calibration, CalibrationCorrection, CalibrationFilter, CalibrationListing,
    CalibrationSubmission, Instrument, InstrumentFields, ScheduleEntry,
};
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};

/// Result of recording a calibration
#[derive(Debug, Clone, Serialize)]
pub struct RecordedCalibration {
    pub calibration: Calibration,
    pub instrument: Instrument,
    /// Next due date, absent once the repetition ceiling is reached or the
    /// date was already scheduled
    pub schedule_entry: Option<ScheduleEntry>,
    /// Live calibrations of the instrument including this one
    pub calibration_count: i64,
}

/// What an instrument deletion removed alongside the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstrumentRemoval {
    pub calibrations_removed: u64,
    pub schedule_entries_removed: u64,
}

/// One page of calibration history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub rows: Vec<CalibrationListing>,
    pub total_results: i64,
    pub page: i64,
    pub total_pages: i64,
    pub page_size: i64,
}

/// Record a calibration, upserting its instrument and scheduling the next
/// due date
pub async fn record_calibration(
    pool: &SqlitePool,
    tenant_id: Uuid,
    submission: CalibrationSubmission,
) -> Result<RecordedCalibration, CalibrationError> {
    let fields = submission
        .instrument
        .validated()
        .map_err(CalibrationError::Invalid)?;
    let mut details = submission.details;
    details.certificate_number = details.certificate_number.trim().to_string();
    if details.certificate_number.is_empty() {
        return Err(CalibrationError::Invalid(
            "Certificate number is required".to_string(),
        ));
    }

    let due_date = add_cycles(details.performed_at, fields.frequency).ok_or_else(|| {
        CalibrationError::Invalid(format!(
            "Next due date for {} is out of range",
            fields.code
        ))
    })?;

    let mut tx = pool.begin().await?;

    let instrument = match instruments::find_by_code(&mut tx, tenant_id, &fields.code).await? {
        Some(existing) => {
            let refreshed = existing.with_fields(fields);
            if refreshed != existing {
                instruments::update(&mut tx, &refreshed).await?;
                debug!(instrument_id = %refreshed.id, "Refreshed instrument attributes");
            }
            refreshed
        }
        None => {
            let created = Instrument::new(tenant_id, fields);
            instruments::insert(&mut tx, &created)
                .await
                .map_err(|e| instrument_write_error(e, &created.fields.code))?;
            info!(
                instrument_id = %created.id,
                code = %created.fields.code,
                "Created instrument from calibration submission"
            );
            created
        }
    };

    if calibrations::certificate_exists(&mut tx, instrument.id, &details.certificate_number, None)
        .await?
    {
        warn!(
            instrument_id = %instrument.id,
            certificate = %details.certificate_number,
            "Rejected duplicate certificate"
        );
        return Err(CalibrationError::DuplicateCertificate {
            certificate: details.certificate_number,
        });
    }

    let count = calibrations::count_live(&mut tx, instrument.id).await?;
    if count >= instrument.calibration_limit() {
        warn!(
            instrument_id = %instrument.id,
            count,
            ceiling = instrument.fields.repetition_ceiling,
            "Rejected calibration over repetition ceiling"
        );
        return Err(CalibrationError::RepetitionExceeded {
            instrument_code: instrument.fields.code.clone(),
            ceiling: instrument.fields.repetition_ceiling,
        });
    }

    let calibration = Calibration::record(&instrument, details, submission.recorded_by);
    calibrations::insert(&mut tx, &calibration)
        .await
        .map_err(|e| certificate_write_error(e, &calibration.certificate_number))?;

    let calibration_count = count + 1;
    let schedule_entry = if instrument.schedules_after(calibration_count) {
        schedule::insert_if_absent(&mut tx, &ScheduleEntry::new(&instrument, due_date)).await?
    } else {
        debug!(
            instrument_id = %instrument.id,
            calibration_count,
            "Repetition ceiling reached, no next due date"
        );
        None
    };

    tx.commit().await?;

    info!(
        calibration_id = %calibration.id,
        instrument_id = %instrument.id,
        outcome = %calibration.outcome,
        next_due = ?schedule_entry.as_ref().map(|e| e.due_date),
        "Recorded calibration"
    );

    Ok(RecordedCalibration {
        calibration,
        instrument,
        schedule_entry,
        calibration_count,
    })
}

/// Apply a correction to a live calibration and re-derive its outcome
///
/// Schedule entries are left untouched.
pub async fn correct_calibration(
    pool: &SqlitePool,
    tenant_id: Uuid,
    calibration_id: Uuid,
    correction: CalibrationCorrection,
) -> Result<Calibration, CalibrationError> {
    let mut tx = pool.begin().await?;

    let existing = calibrations::find_by_id(&mut tx, tenant_id, calibration_id)
        .await?
        .ok_or_else(|| CalibrationError::NotFound("Calibration".to_string()))?;

    let corrected = existing.corrected(correction);
    if corrected.certificate_number.trim().is_empty() {
        return Err(CalibrationError::Invalid(
            "Certificate number is required".to_string(),
        ));
    }

    if corrected.certificate_number != existing.certificate_number
        && calibrations::certificate_exists(
            &mut tx,
            existing.instrument_id,
            &corrected.certificate_number,
            Some(existing.id),
        )
        .await?
    {
        warn!(
            calibration_id = %existing.id,
            certificate = %corrected.certificate_number,
            "Rejected correction to a duplicate certificate"
        );
        return Err(CalibrationError::DuplicateCertificate {
            certificate: corrected.certificate_number,
        });
    }

    calibrations::update(&mut tx, &corrected)
        .await
        .map_err(|e| certificate_write_error(e, &corrected.certificate_number))?;
    tx.commit().await?;

    info!(
        calibration_id = %corrected.id,
        outcome = %corrected.outcome,
        "Corrected calibration"
    );

    Ok(corrected)
}

pub async fn delete_calibration(
    pool: &SqlitePool,
    tenant_id: Uuid,
    calibration_id: Uuid,
) -> Result<(), CalibrationError> {
    let mut conn = pool.acquire().await?;

    if !calibrations::soft_delete(&mut conn, tenant_id, calibration_id).await? {
        return Err(CalibrationError::NotFound("Calibration".to_string()));
    }

    info!(calibration_id = %calibration_id, "Deleted calibration");
    Ok(())
}

/// Register an instrument without a calibration
pub async fn create_instrument(
    pool: &SqlitePool,
    tenant_id: Uuid,
    fields: InstrumentFields,
) -> Result<Instrument, CalibrationError> {
    let fields = fields.validated().map_err(CalibrationError::Invalid)?;
    let mut conn = pool.acquire().await?;

    if instruments::find_by_code(&mut conn, tenant_id, &fields.code)
        .await?
        .is_some()
    {
        return Err(CalibrationError::DuplicateInstrumentCode(fields.code));
    }

    let instrument = Instrument::new(tenant_id, fields);
    instruments::insert(&mut conn, &instrument)
        .await
        .map_err(|e| instrument_write_error(e, &instrument.fields.code))?;

    info!(
        instrument_id = %instrument.id,
        code = %instrument.fields.code,
        "Created instrument"
    );
    Ok(instrument)
}

/// Administrative edit of an instrument's attributes
pub async fn update_instrument(
    pool: &SqlitePool,
    tenant_id: Uuid,
    instrument_id: Uuid,
    fields: InstrumentFields,
) -> Result<Instrument, CalibrationError> {
    let fields = fields.validated().map_err(CalibrationError::Invalid)?;
    let mut tx = pool.begin().await?;

    let existing = instruments::find_by_id(&mut tx, tenant_id, instrument_id)
        .await?
        .ok_or_else(|| CalibrationError::NotFound("Instrument".to_string()))?;

    if fields.code != existing.fields.code
        && instruments::find_by_code(&mut tx, tenant_id, &fields.code)
            .await?
            .is_some()
    {
        return Err(CalibrationError::DuplicateInstrumentCode(fields.code));
    }

    let updated = existing.with_fields(fields);
    instruments::update(&mut tx, &updated)
        .await
        .map_err(|e| instrument_write_error(e, &updated.fields.code))?;
    tx.commit().await?;

    info!(instrument_id = %updated.id, "Updated instrument");
    Ok(updated)
}

/// Soft-delete an instrument, its calibrations and (hard) its schedule
pub async fn delete_instrument(
    pool: &SqlitePool,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<InstrumentRemoval, CalibrationError> {
    let mut tx = pool.begin().await?;

    if !instruments::soft_delete(&mut tx, tenant_id, instrument_id).await? {
        return Err(CalibrationError::NotFound("Instrument".to_string()));
    }

    let schedule_entries_removed = schedule::delete_for_instrument(&mut tx, instrument_id).await?;
    let calibrations_removed = calibrations::soft_delete_for_instrument(&mut tx, instrument_id).await?;
    tx.commit().await?;

    info!(
        instrument_id = %instrument_id,
        calibrations_removed,
        schedule_entries_removed,
        "Deleted instrument"
    );

    Ok(InstrumentRemoval {
        calibrations_removed,
        schedule_entries_removed,
    })
}

pub async fn get_instrument(
    pool: &SqlitePool,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<Instrument, CalibrationError> {
    let mut conn = pool.acquire().await?;
    instruments::find_by_id(&mut conn, tenant_id, instrument_id)
        .await?
        .ok_or_else(|| CalibrationError::NotFound("Instrument".to_string()))
}

/// Schedule entries of a live instrument, earliest first
pub async fn instrument_schedule(
    pool: &SqlitePool,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<Vec<ScheduleEntry>, CalibrationError> {
    let mut conn = pool.acquire().await?;

    if instruments::find_by_id(&mut conn, tenant_id, instrument_id)
        .await?
        .is_none()
    {
        return Err(CalibrationError::NotFound("Instrument".to_string()));
    }

    Ok(schedule::list_for_instrument(&mut conn, tenant_id, instrument_id).await?)
}

pub async fn get_calibration(
    pool: &SqlitePool,
    tenant_id: Uuid,
    calibration_id: Uuid,
) -> Result<Calibration, CalibrationError> {
    let mut conn = pool.acquire().await?;
    calibrations::find_by_id(&mut conn, tenant_id, calibration_id)
        .await?
        .ok_or_else(|| CalibrationError::NotFound("Calibration".to_string()))
}

/// Filtered history, newest first, one page at a time
pub async fn calibration_history(
    pool: &SqlitePool,
    tenant_id: Uuid,
    filter: &CalibrationFilter,
    requested_page: i64,
) -> Result<HistoryPage, CalibrationError> {
    let mut conn = pool.acquire().await?;

    let total_results = calibrations::count_filtered(&mut conn, tenant_id, filter).await?;
    let Pagination {
        page,
        total_pages,
        offset,
    } = calculate_pagination(total_results, requested_page);

    let rows = calibrations::list_filtered(&mut conn, tenant_id, filter, PAGE_SIZE, offset).await?;

    Ok(HistoryPage {
        rows,
        total_results,
        page,
        total_pages,
        page_size: PAGE_SIZE,
    })
}

/// Unique index on the calibration certificate is the last word on duplicates
fn certificate_write_error(err: metro_common::Error, certificate: &str) -> CalibrationError {
    if err.is_unique_violation() {
        CalibrationError::DuplicateCertificate {
            certificate: certificate.to_string(),
        }
    } else {
        err.into()
    }
}

fn instrument_write_error(err: metro_common::Error, code: &str) -> CalibrationError {
    if err.is_unique_violation() {
        CalibrationError::DuplicateInstrumentCode(code.to_string())
    } else {
        err.into()
    }
}
