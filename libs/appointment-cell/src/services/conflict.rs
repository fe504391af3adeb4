// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

/// Half-open interval overlap: touching endpoints do not conflict.
pub fn intervals_overlap(
    start1: NaiveDateTime,
    end1: NaiveDateTime,
    start2: NaiveDateTime,
    end2: NaiveDateTime,
) -> bool {
    start1 < end2 && start2 < end1
}

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Id of the earliest scheduled appointment of `doctor_id` overlapping
    /// `[start_time, end_time)`, if any.
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<Option<Uuid>, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}",
               doctor_id, start_time, end_time);

        let existing = self
            .store
            .scheduled_for_doctor(doctor_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let conflict = first_conflict(&existing, start_time, end_time);

        if let Some(conflicting_id) = conflict {
            warn!("Conflict detected for doctor {} with appointment {}", doctor_id, conflicting_id);
        }

        Ok(conflict)
    }
}

fn first_conflict(
    existing: &[Appointment],
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
) -> Option<Uuid> {
    existing
        .iter()
        .filter(|apt| intervals_overlap(apt.start_time, apt.end_time(), start_time, end_time))
        .min_by_key(|apt| apt.start_time)
        .map(|apt| apt.id)
}
