// libs/doctor-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::services::availability::{RawWeeklySchedule, TimeWindow, WeeklyAvailability};

// ==============================================================================
// CORE DOCTOR MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorSchedule {
    Valid(WeeklyAvailability),
    /// Stored schedule data that could not be parsed.
    Malformed(ScheduleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub schedule: DoctorSchedule,
}

impl Doctor {
    /// Availability windows on `date`. A malformed stored schedule is an error
    /// rather than an empty day so callers can tell the two apart.
    pub fn windows_on(&self, date: NaiveDate) -> Result<&[TimeWindow], ScheduleError> {
        match &self.schedule {
            DoctorSchedule::Valid(availability) => Ok(availability.resolve(date)),
            DoctorSchedule::Malformed(err) => Err(err.clone()),
        }
    }

    pub fn availability(&self) -> Option<&WeeklyAvailability> {
        match &self.schedule {
            DoctorSchedule::Valid(availability) => Some(availability),
            DoctorSchedule::Malformed(_) => None,
        }
    }

    pub fn summary(&self) -> DoctorSummary {
        DoctorSummary {
            id: self.id,
            full_name: self.full_name.clone(),
            specialty: self.specialty.clone(),
            working_hours: self.availability().map(WeeklyAvailability::to_raw),
            schedule_error: match &self.schedule {
                DoctorSchedule::Malformed(err) => Some(err.to_string()),
                DoctorSchedule::Valid(_) => None,
            },
        }
    }
}

/// Row shape of the `doctors` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    #[serde(default)]
    pub working_hours: Value,
}

impl From<DoctorRecord> for Doctor {
    fn from(record: DoctorRecord) -> Self {
        let schedule = match WeeklyAvailability::from_json(&record.working_hours) {
            Ok(availability) => DoctorSchedule::Valid(availability),
            Err(err) => {
                warn!("Doctor {} has malformed working hours: {}", record.id, err);
                DoctorSchedule::Malformed(err)
            }
        };

        Self {
            id: record.id,
            full_name: record.full_name,
            specialty: record.specialty,
            schedule,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub full_name: String,
    pub specialty: String,
    pub working_hours: Value,
}

impl RegisterDoctorRequest {
    /// Validates every field, parsing the schedule eagerly.
    pub fn validate(&self) -> Result<WeeklyAvailability, DoctorError> {
        if self.full_name.trim().is_empty() {
            return Err(DoctorError::ValidationError("full_name is required".to_string()));
        }
        if self.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError("specialty is required".to_string()));
        }
        Ok(WeeklyAvailability::from_json(&self.working_hours)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub working_hours: Option<RawWeeklySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_error: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule must map weekday names to lists of \"HH:MM-HH:MM\" ranges: {0}")]
    Structure(String),

    #[error("unknown weekday '{0}'")]
    UnknownWeekday(String),

    #[error("weekday '{0}' is listed more than once")]
    DuplicateWeekday(String),

    #[error("invalid time range '{0}', expected HH:MM-HH:MM")]
    BadRange(String),

    #[error("time range '{0}' must start before it ends")]
    EmptyRange(String),

    #[error("ranges {first} and {second} overlap on {weekday}")]
    OverlappingWindows {
        weekday: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Invalid working hours: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
