//! Schedule (agenda) entries

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::instrument::Instrument;

/// A computed due date for an instrument's next calibration
///
/// Entries are never updated; the next recorded calibration adds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub tenant_id: Uuid,
    pub due_date: NaiveDate,
}

impl ScheduleEntry {
    pub fn new(instrument: &Instrument, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument_id: instrument.id,
            tenant_id: instrument.tenant_id,
            due_date,
        }
    }
}
