// libs/appointment-cell/src/models.rs
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::error::ErrorKind;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const MAX_DURATION_MINUTES: i32 = 480;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// Naive local time; the clinic runs in a single timezone.
    pub start_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub patient_notes: String,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn end_time(&self) -> NaiveDateTime {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Validated appointment ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub patient_notes: String,
}

impl NewAppointment {
    pub fn end_time(&self) -> NaiveDateTime {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }
}

/// Appointment enriched with the doctor's public details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentWithDoctor {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: Option<String>,
    pub doctor_specialty: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// ISO-8601 local date-time, e.g. `2024-06-03T09:00`.
    pub start: String,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Only honoured for admins; patients always book for themselves.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub start: String,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid appointment request: {0}")]
    InvalidFormat(String),

    #[error("Appointments cannot be scheduled in the past")]
    PastDate,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment is outside the doctor's working hours: {0}")]
    OutsideWorkingHours(String),

    #[error("{}", slot_conflict_message(.conflicting_id))]
    SlotConflict { conflicting_id: Option<Uuid> },

    #[error("Appointment not found")]
    NotFound,

    #[error("The doctor's working hours are misconfigured: {0}")]
    MalformedSchedule(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

fn slot_conflict_message(conflicting_id: &Option<Uuid>) -> String {
    match conflicting_id {
        Some(id) => format!("The doctor already has an appointment at that time (appointment {})", id),
        None => "The doctor already has an appointment at that time".to_string(),
    }
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            AppointmentError::PastDate => ErrorKind::PastDate,
            AppointmentError::DoctorNotFound => ErrorKind::DoctorNotFound,
            AppointmentError::PatientNotFound => ErrorKind::PatientNotFound,
            AppointmentError::OutsideWorkingHours(_) => ErrorKind::OutsideWorkingHours,
            AppointmentError::SlotConflict { .. } => ErrorKind::SlotConflict,
            AppointmentError::NotFound => ErrorKind::NotFound,
            AppointmentError::MalformedSchedule(_) => ErrorKind::MalformedSchedule,
            AppointmentError::InvalidStatusTransition(_) => ErrorKind::InvalidStatusTransition,
            AppointmentError::DatabaseError(_) => ErrorKind::ToolExecutionError,
        }
    }
}

/// Failures reported by an `AppointmentStore`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The (doctor, start time) uniqueness guarantee rejected the insert.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Referenced record does not exist: {0}")]
    ForeignKeyViolation(String),

    #[error("Record not found")]
    NotFound,

    #[error("Storage backend error: {0}")]
    Backend(String),
}
