// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorError, DoctorSummary, RegisterDoctorRequest};
use crate::router::DoctorCellState;

#[derive(Debug, Deserialize)]
pub struct DoctorListQuery {
    pub specialty: Option<String>,
}

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::InvalidSchedule(err) => AppError::ValidationError(err.to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

pub async fn list_doctors(
    State(state): State<Arc<DoctorCellState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = state
        .directory
        .list_doctors(query.specialty.as_deref())
        .await
        .map_err(map_doctor_error)?;

    let doctors: Vec<DoctorSummary> = doctors.iter().map(|d| d.summary()).collect();

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

pub async fn get_doctor(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorSummary>, AppError> {
    let doctor = state
        .directory
        .find_doctor(doctor_id)
        .await
        .map_err(map_doctor_error)?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(doctor.summary()))
}

/// Admin-only doctor registration. Working hours are validated here, before
/// any booking can depend on them.
pub async fn register_doctor(
    State(state): State<Arc<DoctorCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Only administrators can register doctors".to_string()));
    }

    let doctor = state
        .directory
        .register_doctor(request)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor.summary(),
        "message": "Doctor registered successfully"
    })))
}
