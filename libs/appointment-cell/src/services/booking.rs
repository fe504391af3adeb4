// libs/appointment-cell/src/services/booking.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDateTime};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::availability::weekday_name;
use doctor_cell::DoctorDirectory;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentWithDoctor, NewAppointment,
    ScheduleAppointmentRequest, StoreError, DEFAULT_DURATION_MINUTES, MAX_DURATION_MINUTES,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, CancelAction};
use crate::services::store::AppointmentStore;

const ACCEPTED_START_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parses a naive local ISO-8601 date-time.
pub fn parse_start_time(raw: &str) -> Result<NaiveDateTime, AppointmentError> {
    let trimmed = raw.trim();
    ACCEPTED_START_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            AppointmentError::InvalidFormat(format!(
                "'{}' is not a valid date and time, use YYYY-MM-DDTHH:MM",
                raw
            ))
        })
}

/// The scheduling engine: validates, books, cancels and lists appointments.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&store)),
            lifecycle_service: AppointmentLifecycleService::new(),
            store,
            doctors,
        }
    }

    /// Books an appointment, checking against the current local time.
    pub async fn book_appointment(
        &self,
        request: ScheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.book_appointment_at(request, Local::now().naive_local()).await
    }

    /// Books an appointment as of `current_time`.
    ///
    /// Steps run in order and the first failure wins: format, past date,
    /// doctor lookup, working hours, overlap pre-check, insert.
    pub async fn book_appointment_at(
        &self,
        request: ScheduleAppointmentRequest,
        current_time: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {} at {}",
              request.patient_id, request.doctor_id, request.start);

        // **Step 1: Format**
        let start_time = parse_start_time(&request.start)?;
        let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if !(1..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(AppointmentError::InvalidFormat(format!(
                "duration must be between 1 and {} minutes",
                MAX_DURATION_MINUTES
            )));
        }
        let end_time = start_time + Duration::minutes(duration_minutes as i64);

        // **Step 2: Temporal sanity**
        if start_time < current_time {
            warn!("Rejected booking in the past: {} < {}", start_time, current_time);
            return Err(AppointmentError::PastDate);
        }

        // **Step 3: Doctor**
        let doctor = self
            .doctors
            .find_doctor(request.doctor_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;

        // **Step 4 & 5: Availability containment**
        self.validate_working_hours(&doctor, start_time, end_time)?;

        // **Step 6: Overlap pre-check**
        if let Some(conflicting_id) = self
            .conflict_service
            .check_conflicts(doctor.id, start_time, end_time)
            .await?
        {
            return Err(AppointmentError::SlotConflict { conflicting_id: Some(conflicting_id) });
        }

        // **Step 7: Commit; the store's uniqueness guarantee settles races**
        let new_appointment = NewAppointment {
            patient_id: request.patient_id,
            doctor_id: doctor.id,
            start_time,
            duration_minutes,
            patient_notes: request.notes.unwrap_or_default(),
        };

        match self.store.insert(new_appointment).await {
            Ok(appointment) => {
                info!("Appointment {} booked for doctor {} at {}",
                      appointment.id, appointment.doctor_id, appointment.start_time);
                Ok(appointment)
            }
            Err(StoreError::UniqueViolation(detail)) => {
                warn!("Lost booking race for doctor {} at {}: {}", doctor.id, start_time, detail);
                let conflicting_id = self
                    .conflict_service
                    .check_conflicts(doctor.id, start_time, end_time)
                    .await
                    .unwrap_or(None);
                Err(AppointmentError::SlotConflict { conflicting_id })
            }
            Err(StoreError::ForeignKeyViolation(detail)) => {
                warn!("Booking referenced a missing record: {}", detail);
                Err(AppointmentError::PatientNotFound)
            }
            Err(e) => Err(AppointmentError::DatabaseError(e.to_string())),
        }
    }

    fn validate_working_hours(
        &self,
        doctor: &Doctor,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        let day = weekday_name(start_time.date().weekday());
        let windows = doctor
            .windows_on(start_time.date())
            .map_err(|e| AppointmentError::MalformedSchedule(e.to_string()))?;

        if windows.is_empty() {
            return Err(AppointmentError::OutsideWorkingHours(format!(
                "the doctor does not work on {}",
                day
            )));
        }

        if !windows.iter().any(|window| window.contains(start_time, end_time)) {
            let hours: Vec<String> = windows.iter().map(ToString::to_string).collect();
            return Err(AppointmentError::OutsideWorkingHours(format!(
                "{} to {} is not within the doctor's hours on {} ({})",
                start_time.format("%H:%M"),
                end_time.format("%H:%M"),
                day,
                hours.join(", ")
            )));
        }

        Ok(())
    }

    /// Cancels a scheduled appointment. Cancelling an already-cancelled
    /// appointment succeeds without changing it.
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;

        match self.lifecycle_service.plan_cancellation(appointment.status)? {
            CancelAction::AlreadyCancelled => {
                debug!("Appointment {} already cancelled", appointment_id);
                Ok(appointment)
            }
            CancelAction::Cancel => {
                let cancelled = self
                    .store
                    .update_status(appointment_id, AppointmentStatus::Cancelled)
                    .await
                    .map_err(|e| match e {
                        StoreError::NotFound => AppointmentError::NotFound,
                        other => AppointmentError::DatabaseError(other.to_string()),
                    })?;
                info!("Appointment {} cancelled", appointment_id);
                Ok(cancelled)
            }
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find(appointment_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::NotFound)
    }

    /// All of a patient's appointments, latest first, with doctor details.
    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<AppointmentWithDoctor>, AppointmentError> {
        let appointments = self
            .store
            .list_for_patient(patient_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let doctor_ids: HashSet<Uuid> = appointments.iter().map(|apt| apt.doctor_id).collect();
        let lookups = join_all(doctor_ids.into_iter().map(|id| self.doctors.find_doctor(id))).await;

        let doctors: HashMap<Uuid, Doctor> = lookups
            .into_iter()
            .filter_map(|result| match result {
                Ok(doctor) => doctor,
                Err(e) => {
                    warn!("Doctor lookup failed while listing appointments: {}", e);
                    None
                }
            })
            .map(|doctor| (doctor.id, doctor))
            .collect();

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let doctor = doctors.get(&appointment.doctor_id);
                AppointmentWithDoctor {
                    doctor_name: doctor.map(|d| d.full_name.clone()),
                    doctor_specialty: doctor.map(|d| d.specialty.clone()),
                    appointment,
                }
            })
            .collect())
    }
}
