// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::Local;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, NewAppointment, StoreError};
use crate::services::conflict::intervals_overlap;

/// Persistence for appointments.
///
/// Implementations must reject an insert, returning
/// `StoreError::UniqueViolation`, when it would double-book the doctor: at
/// minimum a scheduled appointment with the same doctor and start time, and
/// where the backend can check it atomically, any overlapping scheduled
/// appointment. The scheduling engine's overlap pre-check is not atomic with
/// the insert, so this is what actually prevents two writers from booking
/// the same time.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Scheduled appointments for a doctor, ordered by start time.
    async fn scheduled_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;

    /// Every appointment of a patient regardless of status, latest start first.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn scheduled_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut scheduled: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .iter()
            .filter(|apt| apt.doctor_id == doctor_id && apt.status == AppointmentStatus::Scheduled)
            .cloned()
            .collect();
        scheduled.sort_by_key(|apt| apt.start_time);
        Ok(scheduled)
    }

    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        // Check and insert under one write lock.
        let mut appointments = self.appointments.write().await;

        let end_time = appointment.end_time();
        let clash = appointments.iter().find(|apt| {
            apt.doctor_id == appointment.doctor_id
                && apt.status == AppointmentStatus::Scheduled
                && intervals_overlap(apt.start_time, apt.end_time(), appointment.start_time, end_time)
        });
        if let Some(existing) = clash {
            return Err(StoreError::UniqueViolation(format!(
                "doctor {} already booked {} - {}",
                appointment.doctor_id,
                existing.start_time.format("%Y-%m-%d %H:%M"),
                existing.end_time().format("%H:%M")
            )));
        }

        let stored = Appointment {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            start_time: appointment.start_time,
            duration_minutes: appointment.duration_minutes,
            status: AppointmentStatus::Scheduled,
            patient_notes: appointment.patient_notes,
            created_at: Local::now().naive_local(),
        };
        appointments.push(stored.clone());
        debug!("Stored appointment {}", stored.id);
        Ok(stored)
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .appointments
            .read()
            .await
            .iter()
            .find(|apt| apt.id == appointment_id)
            .cloned())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .iter_mut()
            .find(|apt| apt.id == appointment_id)
            .ok_or(StoreError::NotFound)?;
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .iter()
            .filter(|apt| apt.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(appointments)
    }
}
