//! Instrument records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted calibration frequency (100 years of 30-day units)
pub const MAX_FREQUENCY: u32 = 1200;

/// Attributes of an instrument
///
/// Embedded by value in [`Instrument`] and in calibration submissions, which
/// upsert the instrument they refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentFields {
    /// Business code, unique per tenant among live instruments
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Calibration frequency in 30-day units
    pub frequency: u32,
    /// Calibrations allowed after the initial baseline before the
    /// frequency must be reassessed
    pub repetition_ceiling: u32,
}

impl InstrumentFields {
    /// Trim identifiers and check the numeric bounds
    pub fn validated(self) -> Result<Self, String> {
        let code = self.code.trim().to_string();
        let name = self.name.trim().to_string();

        if code.is_empty() {
            return Err("Instrument code is required".to_string());
        }
        if name.is_empty() {
            return Err("Instrument name is required".to_string());
        }
        if self.frequency == 0 {
            return Err("Calibration frequency must be at least 1".to_string());
        }
        if self.frequency > MAX_FREQUENCY {
            return Err(format!(
                "Calibration frequency must be at most {}",
                MAX_FREQUENCY
            ));
        }

        Ok(Self {
            code,
            name,
            location: non_blank(self.location),
            manufacturer: non_blank(self.manufacturer),
            resolution: non_blank(self.resolution),
            ..self
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A persisted instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(flatten)]
    pub fields: InstrumentFields,
}

impl Instrument {
    /// New instrument with a fresh id
    pub fn new(tenant_id: Uuid, fields: InstrumentFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            fields,
        }
    }

    /// Same identity, replaced attributes
    pub fn with_fields(&self, fields: InstrumentFields) -> Self {
        Self {
            id: self.id,
            tenant_id: self.tenant_id,
            fields,
        }
    }

    /// Number of live calibrations at which new submissions are refused
    pub fn calibration_limit(&self) -> i64 {
        i64::from(self.fields.repetition_ceiling) + 1
    }

    /// Whether an instrument holding `total` live calibrations still gets a
    /// next due date
    pub fn schedules_after(&self, total: i64) -> bool {
        total <= i64::from(self.fields.repetition_ceiling)
    }
}
