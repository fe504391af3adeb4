// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::caller_patient_id;

use crate::models::{Appointment, AppointmentError, BookAppointmentRequest, ScheduleAppointmentRequest};
use crate::router::AppointmentCellState;

pub fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::InvalidFormat(_)
        | AppointmentError::PastDate
        | AppointmentError::OutsideWorkingHours(_)
        | AppointmentError::InvalidStatusTransition(_) => AppError::BadRequest(e.to_string()),
        AppointmentError::DoctorNotFound
        | AppointmentError::PatientNotFound
        | AppointmentError::NotFound => AppError::NotFound(e.to_string()),
        AppointmentError::SlotConflict { .. } => AppError::Conflict(e.to_string()),
        AppointmentError::MalformedSchedule(_) => AppError::Internal(e.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn ensure_can_access(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    let is_patient = appointment.patient_id.to_string() == user.id;
    let is_doctor = appointment.doctor_id.to_string() == user.id;

    if !is_patient && !is_doctor && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized to access this appointment".to_string()));
    }
    Ok(())
}

/// Books for the caller. Admins may book on behalf of a patient.
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = match request.patient_id {
        Some(patient_id) if user.is_admin() => patient_id,
        Some(patient_id) if patient_id.to_string() != user.id => {
            return Err(AppError::Forbidden("Not authorized to book appointment for this patient".to_string()));
        }
        _ => caller_patient_id(&user)?,
    };

    let appointment = state
        .booking
        .book_appointment(ScheduleAppointmentRequest {
            patient_id,
            doctor_id: request.doctor_id,
            start: request.start,
            duration_minutes: request.duration_minutes,
            notes: request.notes,
        })
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = caller_patient_id(&user)?;

    let appointments = state
        .booking
        .list_patient_appointments(patient_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .booking
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    ensure_can_access(&user, &appointment)?;

    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    ensure_can_access(&user, &appointment)?;

    let cancelled = state
        .booking
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled successfully"
    })))
}
