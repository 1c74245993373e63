//! Domain records for the calibration service

pub mod calibration;
pub mod instrument;
pub mod schedule;
pub mod tenant;

pub use calibration::{
    Calibration, CalibrationCorrection, CalibrationDetails, CalibrationFilter,
    CalibrationListing, CalibrationSubmission, Measurement, MeasurementError, Outcome,
};
pub use instrument::{Instrument, InstrumentFields, MAX_FREQUENCY};
pub use schedule::ScheduleEntry;
pub use tenant::{Profile, Tenant, User};
