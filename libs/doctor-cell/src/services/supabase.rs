// libs/doctor-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Doctor, DoctorError, DoctorRecord, DoctorSchedule, RegisterDoctorRequest};
use crate::services::directory::{matches_specialty, DoctorDirectory};

const DOCTORS_PATH: &str = "/rest/v1/doctors";

/// Doctor directory backed by the `doctors` table.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("{}?{}", DOCTORS_PATH, query);
        let records: Vec<DoctorRecord> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(records.into_iter().map(Doctor::from).collect())
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        let doctors = self.fetch(&format!("id=eq.{}&limit=1", doctor_id)).await?;
        Ok(doctors.into_iter().next())
    }

    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let mut query = String::from("order=full_name.asc");
        if let Some(specialty) = specialty {
            query.push_str(&format!("&specialty=ilike.{}", urlencoding::encode(specialty.trim())));
        }

        let doctors = self.fetch(&query).await?;
        Ok(doctors
            .into_iter()
            .filter(|doctor| matches_specialty(doctor, specialty))
            .collect())
    }

    async fn register_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DoctorError> {
        let availability = request.validate()?;
        let id = Uuid::new_v4();

        let body = json!({
            "id": id,
            "full_name": request.full_name.trim(),
            "specialty": request.specialty.trim(),
            "working_hours": availability.to_raw(),
        });

        let rows: Vec<DoctorRecord> = self
            .supabase
            .request_returning(Method::POST, DOCTORS_PATH, None, Some(body))
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(detail) => {
                    DoctorError::ValidationError(format!("doctor already exists: {}", detail))
                }
                other => DoctorError::DatabaseError(other.to_string()),
            })?;

        let record = rows
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to register doctor".to_string()))?;

        info!("Registered doctor {} ({})", record.id, record.specialty);
        Ok(Doctor {
            id: record.id,
            full_name: record.full_name,
            specialty: record.specialty,
            schedule: DoctorSchedule::Valid(availability),
        })
    }
}
