// libs/doctor-cell/src/services/directory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Doctor, DoctorError, DoctorRecord, DoctorSchedule, RegisterDoctorRequest};

/// Read access to doctors for the scheduling engine, plus registration.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    /// Doctors ordered by name, optionally restricted to one specialty
    /// (case-insensitive).
    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError>;

    /// Registers a doctor. The schedule is validated before anything is stored.
    async fn register_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DoctorError>;
}

pub(crate) fn matches_specialty(doctor: &Doctor, specialty: Option<&str>) -> bool {
    specialty.map_or(true, |wanted| doctor.specialty.eq_ignore_ascii_case(wanted.trim()))
}

#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw record without registration-time validation, the way rows
    /// written by other tools would appear.
    pub async fn insert_record(&self, record: DoctorRecord) -> Doctor {
        let doctor = Doctor::from(record);
        self.doctors.write().await.insert(doctor.id, doctor.clone());
        doctor
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors with specialty filter {:?}", specialty);

        let mut doctors: Vec<Doctor> = self
            .doctors
            .read()
            .await
            .values()
            .filter(|doctor| matches_specialty(doctor, specialty))
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(doctors)
    }

    async fn register_doctor(&self, request: RegisterDoctorRequest) -> Result<Doctor, DoctorError> {
        let availability = request.validate()?;

        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: request.full_name.trim().to_string(),
            specialty: request.specialty.trim().to_string(),
            schedule: DoctorSchedule::Valid(availability),
        };

        self.doctors.write().await.insert(doctor.id, doctor.clone());
        info!("Registered doctor {} ({})", doctor.id, doctor.specialty);
        Ok(doctor)
    }
}
