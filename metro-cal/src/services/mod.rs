//! Calibration services
//!
//! The lifecycle engine, compliance classification and the monthly
//! reminder job, plus the client that delivers reminder batches.

pub mod compliance;
pub mod dispatch_client;
pub mod lifecycle;
pub mod notification;

pub use compliance::{
    classify, evaluate_tenant, ClassifiedEntry, ComplianceBucket, ComplianceReport,
    ComplianceSummary, UPCOMING_WINDOW_DAYS,
};
pub use dispatch_client::{
    DispatchBatch, DispatchError, DispatchReceipt, HttpDispatcher, MessageDispatcher,
    OutboundMessage,
};
pub use lifecycle::{HistoryPage, InstrumentRemoval, RecordedCalibration};
pub use notification::{
    next_run_after, DispatchStatus, NotificationJob, SenderIdentity, SweepOutcome, SweepReport,
};

use metro_common::api::OperationResult;
use thiserror::Error;
use tracing::error;

use crate::models::MeasurementError;

/// Failure descriptor of the calibration engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Certificate {certificate} is already registered for this instrument")]
    DuplicateCertificate { certificate: String },

    #[error(
        "Instrument {instrument_code} reached its repetition ceiling of {ceiling}; \
         review the calibration frequency"
    )]
    RepetitionExceeded { instrument_code: String, ceiling: u32 },

    #[error("Instrument code {0} is already in use")]
    DuplicateInstrumentCode(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    InvalidMeasurement(#[from] MeasurementError),

    #[error("{0}")]
    Storage(String),
}

/// Coarse category used to pick an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BusinessRule,
    Validation,
    Storage,
}

impl CalibrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalibrationError::NotFound(_) => ErrorKind::NotFound,
            CalibrationError::DuplicateCertificate { .. }
            | CalibrationError::RepetitionExceeded { .. }
            | CalibrationError::DuplicateInstrumentCode(_) => ErrorKind::BusinessRule,
            CalibrationError::Invalid(_) | CalibrationError::InvalidMeasurement(_) => {
                ErrorKind::Validation
            }
            CalibrationError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// `{status: false, message}` form of this error
    pub fn to_result(&self) -> OperationResult {
        OperationResult::failure(self.to_string())
    }
}

impl From<metro_common::Error> for CalibrationError {
    fn from(err: metro_common::Error) -> Self {
        match err {
            metro_common::Error::NotFound(what) => CalibrationError::NotFound(what),
            metro_common::Error::Database(sqlx::Error::Database(db_err)) => {
                error!(error = %db_err, "Database rejected calibration operation");
                CalibrationError::Storage(db_err.message().to_string())
            }
            other => {
                error!(error = %other, "Calibration storage failure");
                CalibrationError::Storage("Unexpected storage failure".to_string())
            }
        }
    }
}

impl From<sqlx::Error> for CalibrationError {
    fn from(err: sqlx::Error) -> Self {
        metro_common::Error::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_messages() {
        let err = CalibrationError::RepetitionExceeded {
            instrument_code: "PAQ-01".to_string(),
            ceiling: 1,
        };
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert!(err.to_string().contains("PAQ-01"));

        let result = err.to_result();
        assert!(!result.status);
        assert!(result.message.contains("repetition ceiling"));
    }

    #[test]
    fn test_unknown_storage_error_is_generic() {
        let err: CalibrationError = metro_common::Error::Internal("disk on fire".to_string()).into();
        assert_eq!(
            err,
            CalibrationError::Storage("Unexpected storage failure".to_string())
        );
    }

    #[test]
    fn test_not_found_passes_through() {
        let err: CalibrationError = metro_common::Error::NotFound("Instrument".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Instrument not found");
    }
}
