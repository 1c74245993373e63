//! Integration tests for the calibration lifecycle engine
//!
//! Recording rules (duplicate certificate, repetition ceiling, schedule
//! creation), corrections, soft-delete cascade and the history listing.

mod helpers;

use helpers::{d, fields, setup, submission, FAIL, PASS};
use metro_cal::db::{instruments, schedule};
use chrono::NaiveDate;
use metro_cal::models::{
    CalibrationCorrection, CalibrationFilter, Measurement, Outcome, MAX_FREQUENCY,
};
use metro_cal::services::lifecycle;
use metro_cal::services::CalibrationError;
use uuid::Uuid;

// =============================================================================
// Recording
// =============================================================================

#[tokio::test]
async fn test_end_to_end_recording_scenario() {
    let fx = setup().await;
    let instrument = fields("PAQ-01", 1, 1);

    let first = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();

    assert_eq!(first.calibration.outcome, Outcome::Approved);
    assert_eq!(first.calibration_count, 1);
    let entry = first.schedule_entry.expect("first calibration schedules a due date");
    assert_eq!(entry.due_date, d(2024, 1, 31));

    let duplicate = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-1", PASS, d(2024, 1, 20)),
    )
    .await;
    assert_eq!(
        duplicate.unwrap_err(),
        CalibrationError::DuplicateCertificate {
            certificate: "C-1".to_string()
        }
    );

    let second = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-2", PASS, d(2024, 1, 25)),
    )
    .await
    .unwrap();
    assert_eq!(second.calibration_count, 2);
    assert!(second.schedule_entry.is_none());
    assert_eq!(second.instrument.id, first.instrument.id);

    let third = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "C-3", PASS, d(2024, 2, 25)),
    )
    .await;
    assert!(matches!(
        third.unwrap_err(),
        CalibrationError::RepetitionExceeded { ceiling: 1, .. }
    ));

    let mut conn = fx.pool.acquire().await.unwrap();
    let entries = schedule::list_for_instrument(&mut conn, fx.tenant_id, first.instrument.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_zero_ceiling_allows_baseline_only() {
    let fx = setup().await;
    let instrument = fields("TERM-02", 6, 0);

    let baseline = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "B-1", PASS, d(2024, 5, 1)),
    )
    .await
    .unwrap();
    assert!(baseline.schedule_entry.is_none());

    let next = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "B-2", PASS, d(2024, 6, 1)),
    )
    .await;
    assert!(matches!(
        next.unwrap_err(),
        CalibrationError::RepetitionExceeded { ceiling: 0, .. }
    ));
}

#[tokio::test]
async fn test_same_due_date_is_scheduled_once() {
    let fx = setup().await;
    let instrument = fields("MAN-3", 2, 5);

    let first = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "M-1", PASS, d(2024, 3, 1)),
    )
    .await
    .unwrap();
    let second = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "M-2", FAIL, d(2024, 3, 1)),
    )
    .await
    .unwrap();

    assert_eq!(first.schedule_entry.map(|e| e.due_date), Some(d(2024, 4, 30)));
    assert!(second.schedule_entry.is_none());
    assert_eq!(second.calibration.outcome, Outcome::Rejected);

    let mut conn = fx.pool.acquire().await.unwrap();
    let entries = schedule::list_for_instrument(&mut conn, fx.tenant_id, first.instrument.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_submission_refreshes_instrument_attributes() {
    let fx = setup().await;

    lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("PAQ-01", 1, 3), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();

    let mut renamed = fields("PAQ-01", 2, 3);
    renamed.name = "Digital caliper".to_string();
    let recorded = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(renamed, "C-2", PASS, d(2024, 2, 1)),
    )
    .await
    .unwrap();

    assert_eq!(recorded.instrument.fields.name, "Digital caliper");
    // New frequency applies to the next due date
    assert_eq!(recorded.schedule_entry.map(|e| e.due_date), Some(d(2024, 4, 1)));

    let stored = lifecycle::get_instrument(&fx.pool, fx.tenant_id, recorded.instrument.id)
        .await
        .unwrap();
    assert_eq!(stored.fields.frequency, 2);
}

#[tokio::test]
async fn test_certificate_is_unique_per_instrument_only() {
    let fx = setup().await;

    lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("A-1", 1, 1), "SHARED", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();

    let other = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("B-1", 1, 1), "SHARED", PASS, d(2024, 1, 1)),
    )
    .await;
    assert!(other.is_ok());
}

#[tokio::test]
async fn test_deleted_calibration_frees_certificate() {
    let fx = setup().await;
    let instrument = fields("PAQ-09", 1, 3);

    let recorded = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-1", FAIL, d(2024, 1, 1)),
    )
    .await
    .unwrap();
    lifecycle::delete_calibration(&fx.pool, fx.tenant_id, recorded.calibration.id)
        .await
        .unwrap();

    let again = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "C-1", PASS, d(2024, 1, 2)),
    )
    .await
    .unwrap();
    assert_eq!(again.calibration_count, 1);
}

#[tokio::test]
async fn test_blank_certificate_rejected() {
    let fx = setup().await;

    let result = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("PAQ-01", 1, 1), "   ", PASS, d(2024, 1, 1)),
    )
    .await;
    assert!(matches!(result.unwrap_err(), CalibrationError::Invalid(_)));
}

// =============================================================================
// Corrections
// =============================================================================

#[tokio::test]
async fn test_correction_recomputes_outcome_without_scheduling() {
    let fx = setup().await;

    let recorded = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("PAQ-01", 1, 3), "C-1", FAIL, d(2024, 1, 1)),
    )
    .await
    .unwrap();
    assert_eq!(recorded.calibration.outcome, Outcome::Rejected);

    let corrected = lifecycle::correct_calibration(
        &fx.pool,
        fx.tenant_id,
        recorded.calibration.id,
        CalibrationCorrection {
            tolerance: Some(Measurement::parse_field("tolerance", "0,8").unwrap()),
            observation: Some("Re-read certificate".to_string()),
            performed_at: Some(d(2024, 1, 3)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Error and uncertainty keep their recorded values
    assert_eq!(corrected.outcome, Outcome::Approved);
    assert_eq!(corrected.certificate_number, "C-1");
    assert_eq!(
        corrected.measurement,
        Measurement::parse(FAIL.0, FAIL.1, "0.8").unwrap()
    );

    let stored = lifecycle::get_calibration(&fx.pool, fx.tenant_id, recorded.calibration.id)
        .await
        .unwrap();
    assert_eq!(stored, corrected);

    let entries = lifecycle::instrument_schedule(&fx.pool, fx.tenant_id, recorded.instrument.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].due_date, d(2024, 1, 31));
}

#[tokio::test]
async fn test_correction_to_existing_certificate_rejected() {
    let fx = setup().await;
    let instrument = fields("PAQ-01", 1, 3);

    lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();
    let second = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "C-2", PASS, d(2024, 2, 1)),
    )
    .await
    .unwrap();

    let result = lifecycle::correct_calibration(
        &fx.pool,
        fx.tenant_id,
        second.calibration.id,
        CalibrationCorrection {
            certificate_number: Some("C-1".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(
        result.unwrap_err(),
        CalibrationError::DuplicateCertificate { .. }
    ));
}

#[tokio::test]
async fn test_correction_of_unknown_calibration() {
    let fx = setup().await;

    let result = lifecycle::correct_calibration(
        &fx.pool,
        fx.tenant_id,
        Uuid::new_v4(),
        CalibrationCorrection::default(),
    )
    .await;
    assert_eq!(
        result.unwrap_err(),
        CalibrationError::NotFound("Calibration".to_string())
    );
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_instrument_delete_cascades() {
    let fx = setup().await;
    let instrument = fields("PAQ-01", 1, 3);

    let first = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();
    lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument.clone(), "C-2", PASS, d(2024, 2, 1)),
    )
    .await
    .unwrap();

    let removal = lifecycle::delete_instrument(&fx.pool, fx.tenant_id, first.instrument.id)
        .await
        .unwrap();
    assert_eq!(removal.calibrations_removed, 2);
    assert_eq!(removal.schedule_entries_removed, 2);

    assert_eq!(
        lifecycle::get_calibration(&fx.pool, fx.tenant_id, first.calibration.id)
            .await
            .unwrap_err(),
        CalibrationError::NotFound("Calibration".to_string())
    );
    assert!(lifecycle::instrument_schedule(&fx.pool, fx.tenant_id, first.instrument.id)
        .await
        .is_err());

    let history =
        lifecycle::calibration_history(&fx.pool, fx.tenant_id, &CalibrationFilter::default(), 1)
            .await
            .unwrap();
    assert_eq!(history.total_results, 0);

    // Code is free again and the new instrument starts from scratch
    let fresh = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(instrument, "C-1", PASS, d(2024, 3, 1)),
    )
    .await
    .unwrap();
    assert_ne!(fresh.instrument.id, first.instrument.id);
    assert_eq!(fresh.calibration_count, 1);

    let again = lifecycle::delete_instrument(&fx.pool, fx.tenant_id, first.instrument.id).await;
    assert_eq!(
        again.unwrap_err(),
        CalibrationError::NotFound("Instrument".to_string())
    );
}

#[tokio::test]
async fn test_records_are_tenant_scoped() {
    let fx = setup().await;
    let other_tenant = helpers::add_tenant(&fx.pool, "Other").await;

    let recorded = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("PAQ-01", 1, 1), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();

    assert!(lifecycle::get_calibration(&fx.pool, other_tenant, recorded.calibration.id)
        .await
        .is_err());
    assert!(lifecycle::delete_instrument(&fx.pool, other_tenant, recorded.instrument.id)
        .await
        .is_err());

    // Same code is a different instrument in another tenant
    let elsewhere = lifecycle::record_calibration(
        &fx.pool,
        other_tenant,
        submission(fields("PAQ-01", 1, 1), "C-1", PASS, d(2024, 1, 1)),
    )
    .await
    .unwrap();
    assert_ne!(elsewhere.instrument.id, recorded.instrument.id);
}

// =============================================================================
// Instrument administration
// =============================================================================

#[tokio::test]
async fn test_instrument_codes_stay_unique() {
    let fx = setup().await;

    let first = lifecycle::create_instrument(&fx.pool, fx.tenant_id, fields("A-1", 1, 1))
        .await
        .unwrap();
    lifecycle::create_instrument(&fx.pool, fx.tenant_id, fields("B-1", 1, 1))
        .await
        .unwrap();

    let duplicate = lifecycle::create_instrument(&fx.pool, fx.tenant_id, fields("A-1", 3, 1)).await;
    assert_eq!(
        duplicate.unwrap_err(),
        CalibrationError::DuplicateInstrumentCode("A-1".to_string())
    );

    let clash = lifecycle::update_instrument(&fx.pool, fx.tenant_id, first.id, fields("B-1", 1, 1)).await;
    assert!(matches!(
        clash.unwrap_err(),
        CalibrationError::DuplicateInstrumentCode(_)
    ));

    let updated = lifecycle::update_instrument(&fx.pool, fx.tenant_id, first.id, fields("A-2", 4, 2))
        .await
        .unwrap();
    assert_eq!(updated.id, first.id);
    assert_eq!(updated.fields.code, "A-2");
}

#[tokio::test]
async fn test_invalid_instrument_fields_rejected() {
    let fx = setup().await;

    let result = lifecycle::create_instrument(&fx.pool, fx.tenant_id, fields("A-1", 0, 1)).await;
    assert!(matches!(result.unwrap_err(), CalibrationError::Invalid(_)));
}

#[tokio::test]
async fn test_oversized_frequency_rejected() {
    let fx = setup().await;

    let recorded = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("BIG-1", 100_000_000, 1), "C-1", PASS, d(2024, 1, 1)),
    )
    .await;
    assert!(matches!(recorded.unwrap_err(), CalibrationError::Invalid(_)));

    let created = lifecycle::create_instrument(&fx.pool, fx.tenant_id, fields("A-1", 1, 1))
        .await
        .unwrap();
    let edited = lifecycle::update_instrument(
        &fx.pool,
        fx.tenant_id,
        created.id,
        fields("A-1", MAX_FREQUENCY + 1, 1),
    )
    .await;
    assert!(matches!(edited.unwrap_err(), CalibrationError::Invalid(_)));

    let stored = lifecycle::get_instrument(&fx.pool, fx.tenant_id, created.id)
        .await
        .unwrap();
    assert_eq!(stored.fields.frequency, 1);
}

#[tokio::test]
async fn test_due_date_past_calendar_range_rejected() {
    let fx = setup().await;

    let result = lifecycle::record_calibration(
        &fx.pool,
        fx.tenant_id,
        submission(fields("END-1", MAX_FREQUENCY, 1), "C-1", PASS, NaiveDate::MAX),
    )
    .await;
    assert!(matches!(result.unwrap_err(), CalibrationError::Invalid(_)));

    // Rejected before the instrument upsert
    let mut conn = fx.pool.acquire().await.unwrap();
    assert!(instruments::list(&mut conn, fx.tenant_id)
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_filters_are_conjunctive() {
    let fx = setup().await;

    let mut warehouse = fields("W-1", 12, 5);
    warehouse.location = Some("Warehouse".to_string());

    for (instrument, cert, measurement, performed) in [
        (fields("L-1", 12, 5), "L-A", PASS, d(2024, 1, 10)),
        (fields("L-1", 12, 5), "L-B", FAIL, d(2024, 2, 10)),
        (warehouse.clone(), "W-A", FAIL, d(2024, 3, 10)),
        (warehouse, "W-B", PASS, d(2024, 4, 10)),
    ] {
        lifecycle::record_calibration(
            &fx.pool,
            fx.tenant_id,
            submission(instrument, cert, measurement, performed),
        )
        .await
        .unwrap();
    }

    let all = lifecycle::calibration_history(&fx.pool, fx.tenant_id, &CalibrationFilter::default(), 1)
        .await
        .unwrap();
    let certificates: Vec<_> = all
        .rows
        .iter()
        .map(|r| r.calibration.certificate_number.as_str())
        .collect();
    assert_eq!(certificates, vec!["W-B", "W-A", "L-B", "L-A"]);
    assert_eq!(all.total_pages, 1);

    let rejected = CalibrationFilter {
        outcome: Some(Outcome::Rejected),
        ..Default::default()
    };
    let page = lifecycle::calibration_history(&fx.pool, fx.tenant_id, &rejected, 1)
        .await
        .unwrap();
    assert_eq!(page.total_results, 2);

    let rejected_in_warehouse = CalibrationFilter {
        outcome: Some(Outcome::Rejected),
        location: Some("Warehouse".to_string()),
        ..Default::default()
    };
    let page = lifecycle::calibration_history(&fx.pool, fx.tenant_id, &rejected_in_warehouse, 1)
        .await
        .unwrap();
    assert_eq!(page.total_results, 1);
    assert_eq!(page.rows[0].calibration.certificate_number, "W-A");
    assert_eq!(page.rows[0].instrument_code, "W-1");

    let date_range = CalibrationFilter {
        performed_from: Some(d(2024, 2, 10)),
        performed_to: Some(d(2024, 3, 10)),
        instrument_code: Some("L-1".to_string()),
        ..Default::default()
    };
    let page = lifecycle::calibration_history(&fx.pool, fx.tenant_id, &date_range, 1)
        .await
        .unwrap();
    assert_eq!(page.total_results, 1);
    assert_eq!(page.rows[0].calibration.certificate_number, "L-B");
}
