// libs/appointment-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentStatus, NewAppointment, StoreError};
use crate::services::store::AppointmentStore;

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// Appointment store backed by the `appointments` table.
///
/// The table must carry a unique index on `(doctor_id, start_time)` for rows
/// with `status = 'scheduled'`, and should carry an exclusion constraint over
/// `(doctor_id WITH =, tsrange(start_time, end_time) WITH &&)` for the same
/// rows. PostgREST reports violations as HTTP 409 with SQLSTATE 23505 or
/// 23P01, both of which surface here as `StoreError::UniqueViolation`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn query(&self, query: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", APPOINTMENTS_PATH, query);
        debug!("Querying appointments: {}", query);

        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_supabase_error)
    }
}

fn map_supabase_error(e: SupabaseError) -> StoreError {
    match e {
        SupabaseError::Conflict(detail) => StoreError::UniqueViolation(detail),
        SupabaseError::ForeignKey(detail) => StoreError::ForeignKeyViolation(detail),
        SupabaseError::NotFound(_) => StoreError::NotFound,
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn scheduled_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.query(&format!(
            "doctor_id=eq.{}&status=eq.{}&order=start_time.asc",
            doctor_id,
            AppointmentStatus::Scheduled
        ))
        .await
    }

    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "start_time": appointment.start_time,
            "duration_minutes": appointment.duration_minutes,
            "status": AppointmentStatus::Scheduled,
            "patient_notes": appointment.patient_notes,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_returning(Method::POST, APPOINTMENTS_PATH, None, Some(body))
            .await
            .map_err(map_supabase_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Insert returned no rows".to_string()))
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.query(&format!("id=eq.{}&limit=1", appointment_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);

        let rows: Vec<Appointment> = self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(json!({ "status": status })))
            .await
            .map_err(map_supabase_error)?;

        rows.into_iter().next().ok_or_else(|| {
            warn!("Status update matched no appointment {}", appointment_id);
            StoreError::NotFound
        })
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.query(&format!("patient_id=eq.{}&order=start_time.desc", patient_id))
            .await
    }
}
