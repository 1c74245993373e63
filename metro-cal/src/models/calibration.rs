//! Calibration records and outcome determination

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::instrument::{Instrument, InstrumentFields};

/// Pass/fail result of a calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    /// `approved` iff `error + uncertainty <= tolerance`
    pub fn determine(measurement: &Measurement) -> Self {
        if measurement.error + measurement.uncertainty <= measurement.tolerance {
            Outcome::Approved
        } else {
            Outcome::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Outcome::Approved),
            "rejected" => Ok(Outcome::Rejected),
            other => Err(format!("Unknown outcome '{}'", other)),
        }
    }
}

/// A measurement field that is not a decimal number
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {field}: '{value}' is not a decimal number")]
pub struct MeasurementError {
    pub field: &'static str,
    pub value: String,
}

/// Measured error, uncertainty and declared tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Measurement {
    pub error: Decimal,
    pub uncertainty: Decimal,
    pub tolerance: Decimal,
}

impl Measurement {
    /// Parse the three decimal-string fields (`.` or `,` as separator)
    pub fn parse(error: &str, uncertainty: &str, tolerance: &str) -> Result<Self, MeasurementError> {
        Ok(Self {
            error: parse_decimal("error", error)?,
            uncertainty: parse_decimal("uncertainty", uncertainty)?,
            tolerance: parse_decimal("tolerance", tolerance)?,
        })
    }

    /// Parse a single named field, same rules as [`Measurement::parse`]
    pub fn parse_field(field: &'static str, raw: &str) -> Result<Decimal, MeasurementError> {
        parse_decimal(field, raw)
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, MeasurementError> {
    let normalized = raw.trim().replace(',', ".");
    Decimal::from_str(&normalized).map_err(|_| MeasurementError {
        field,
        value: raw.to_string(),
    })
}

/// Certificate data supplied with a calibration
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDetails {
    pub certificate_number: String,
    pub measurement: Measurement,
    pub observation: Option<String>,
    pub certificate_ref: Option<String>,
    pub performed_at: NaiveDate,
}

/// Everything needed to record a calibration, instrument included
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSubmission {
    pub instrument: InstrumentFields,
    pub details: CalibrationDetails,
    pub recorded_by: Option<Uuid>,
}

/// Fields a correction may change; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationCorrection {
    pub certificate_number: Option<String>,
    pub error: Option<Decimal>,
    pub uncertainty: Option<Decimal>,
    pub tolerance: Option<Decimal>,
    pub observation: Option<String>,
    pub certificate_ref: Option<String>,
    pub performed_at: Option<NaiveDate>,
}

/// A persisted calibration event
///
/// Only [`Calibration::record`], [`Calibration::corrected`] and the store
/// produce values, so the outcome always matches the measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub tenant_id: Uuid,
    pub certificate_number: String,
    #[serde(flatten)]
    pub measurement: Measurement,
    pub observation: Option<String>,
    pub certificate_ref: Option<String>,
    pub outcome: Outcome,
    pub performed_at: NaiveDate,
    pub recorded_by: Option<Uuid>,
}

impl Calibration {
    /// New calibration for `instrument` with derived outcome
    pub fn record(
        instrument: &Instrument,
        details: CalibrationDetails,
        recorded_by: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument_id: instrument.id,
            tenant_id: instrument.tenant_id,
            outcome: Outcome::determine(&details.measurement),
            certificate_number: details.certificate_number,
            measurement: details.measurement,
            observation: details.observation,
            certificate_ref: details.certificate_ref,
            performed_at: details.performed_at,
            recorded_by,
        }
    }

    /// Apply a correction and re-derive the outcome
    pub fn corrected(&self, correction: CalibrationCorrection) -> Self {
        let measurement = Measurement {
            error: correction.error.unwrap_or(self.measurement.error),
            uncertainty: correction.uncertainty.unwrap_or(self.measurement.uncertainty),
            tolerance: correction.tolerance.unwrap_or(self.measurement.tolerance),
        };

        Self {
            id: self.id,
            instrument_id: self.instrument_id,
            tenant_id: self.tenant_id,
            certificate_number: correction
                .certificate_number
                .unwrap_or_else(|| self.certificate_number.clone()),
            outcome: Outcome::determine(&measurement),
            measurement,
            observation: correction.observation.or_else(|| self.observation.clone()),
            certificate_ref: correction
                .certificate_ref
                .or_else(|| self.certificate_ref.clone()),
            performed_at: correction.performed_at.unwrap_or(self.performed_at),
            recorded_by: self.recorded_by,
        }
    }
}

/// Optional, conjunctive filters for the calibration history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationFilter {
    pub outcome: Option<Outcome>,
    /// Inclusive lower bound on `performed_at`
    pub performed_from: Option<NaiveDate>,
    /// Inclusive upper bound on `performed_at`
    pub performed_to: Option<NaiveDate>,
    pub instrument_code: Option<String>,
    pub location: Option<String>,
}

/// History row: calibration plus the instrument attributes it is filtered by
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationListing {
    #[serde(flatten)]
    pub calibration: Calibration,
    pub instrument_code: String,
    pub instrument_name: String,
    pub location: Option<String>,
}
