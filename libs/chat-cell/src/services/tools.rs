// libs/chat-cell/src/services/tools.rs
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::{AppointmentBookingService, AppointmentError, ScheduleAppointmentRequest};
use doctor_cell::{DoctorDirectory, DoctorSummary};
use shared_models::error::ErrorKind;

use crate::models::{
    ListDoctorsArgs, ListMyAppointmentsArgs, ScheduleAppointmentArgs, ToolCall, ToolName,
    ToolResponse, ToolSchema,
};

const PATIENT_ID_ARG: &str = "patient_id";
const PATIENT_ID_ALIAS: &str = "patientId";

/// Executes the agent's tool calls against the scheduling engine.
pub struct ToolRegistry {
    booking: Arc<AppointmentBookingService>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl ToolRegistry {
    pub fn new(booking: Arc<AppointmentBookingService>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self { booking, doctors }
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        ToolName::ALL.iter().map(ToolName::schema).collect()
    }

    /// Runs one tool call for `caller_patient_id`. Never fails: unknown
    /// tools, bad arguments and engine errors all come back as error
    /// responses for the agent to explain.
    pub async fn execute(&self, call: &ToolCall, caller_patient_id: Uuid) -> ToolResponse {
        let Some(tool) = ToolName::parse(&call.name) else {
            warn!("Agent requested unknown tool '{}'", call.name);
            return ToolResponse::error(ErrorKind::UnknownTool, "unknown tool");
        };

        let mut arguments = call.arguments.clone();
        if tool.requires_patient_id() {
            bind_caller(&mut arguments, caller_patient_id, tool);
        }

        debug!("Executing tool {} (call {})", tool.as_str(), call.id);

        match tool {
            ToolName::ListAvailableDoctors => match decode::<ListDoctorsArgs>(arguments) {
                Ok(args) => self.list_available_doctors(args).await,
                Err(response) => response,
            },
            ToolName::ScheduleAppointment => match decode::<ScheduleAppointmentArgs>(arguments) {
                Ok(args) => self.schedule_appointment(args).await,
                Err(response) => response,
            },
            ToolName::ListMyAppointments => match decode::<ListMyAppointmentsArgs>(arguments) {
                Ok(args) => self.list_my_appointments(args).await,
                Err(response) => response,
            },
        }
    }

    async fn list_available_doctors(&self, args: ListDoctorsArgs) -> ToolResponse {
        let specialty = args.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match self.doctors.list_doctors(specialty).await {
            Ok(doctors) => {
                let doctors: Vec<DoctorSummary> = doctors.iter().map(|d| d.summary()).collect();
                ToolResponse::success(json!({ "doctors": doctors, "total": doctors.len() }))
            }
            Err(e) => ToolResponse::error(ErrorKind::ToolExecutionError, e.to_string()),
        }
    }

    async fn schedule_appointment(&self, args: ScheduleAppointmentArgs) -> ToolResponse {
        let request = ScheduleAppointmentRequest {
            patient_id: args.patient_id,
            doctor_id: args.doctor_id,
            start: args.start_iso,
            duration_minutes: args.duration_minutes,
            notes: args.notes,
        };

        match self.booking.book_appointment(request).await {
            Ok(appointment) => {
                info!("Assistant booked appointment {} for patient {}", appointment.id, appointment.patient_id);
                ToolResponse::success(json!({
                    "appointmentId": appointment.id,
                    "appointment": appointment,
                    "message": format!(
                        "Appointment booked for {}",
                        appointment.start_time.format("%A %Y-%m-%d at %H:%M")
                    ),
                }))
            }
            Err(e) => engine_error(e),
        }
    }

    async fn list_my_appointments(&self, args: ListMyAppointmentsArgs) -> ToolResponse {
        match self.booking.list_patient_appointments(args.patient_id).await {
            Ok(appointments) => ToolResponse::success(json!({
                "appointments": appointments,
                "total": appointments.len(),
            })),
            Err(e) => engine_error(e),
        }
    }
}

/// Forces `patient_id` to the authenticated caller, whichever spelling the
/// agent used.
fn bind_caller(arguments: &mut Map<String, Value>, caller_patient_id: Uuid, tool: ToolName) {
    let caller = caller_patient_id.to_string();

    for key in [PATIENT_ID_ARG, PATIENT_ID_ALIAS] {
        if let Some(supplied) = arguments.remove(key) {
            if supplied.as_str() != Some(caller.as_str()) {
                warn!(
                    "Overriding {} {} supplied to {} with caller {}",
                    key,
                    supplied,
                    tool.as_str(),
                    caller
                );
            }
        }
    }

    arguments.insert(PATIENT_ID_ARG.to_string(), Value::String(caller));
}

fn decode<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolResponse> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolResponse::error(ErrorKind::InvalidFormat, format!("invalid arguments: {}", e)))
}

fn engine_error(e: AppointmentError) -> ToolResponse {
    ToolResponse::error(e.kind(), e.to_string())
}
