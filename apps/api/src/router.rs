use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::{info, warn};

use appointment_cell::router::{appointment_routes, AppointmentCellState};
use appointment_cell::{
    AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use chat_cell::router::{chat_routes, ChatCellState};
use chat_cell::{ChatDispatcher, ConversationStore, OpenAiAgent, ToolRegistry};
use doctor_cell::router::{doctor_routes, DoctorCellState};
use doctor_cell::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

/// Supabase-backed stores when configured, in-memory ones otherwise.
fn build_stores(config: &AppConfig) -> (Arc<dyn DoctorDirectory>, Arc<dyn AppointmentStore>) {
    if config.is_configured() {
        info!("Using Supabase at {}", config.supabase_url);
        let supabase = Arc::new(SupabaseClient::new(config));
        (
            Arc::new(SupabaseDoctorDirectory::new(supabase.clone())),
            Arc::new(SupabaseAppointmentStore::new(supabase)),
        )
    } else {
        warn!("Supabase not configured; doctors and appointments are kept in memory");
        (
            Arc::new(InMemoryDoctorDirectory::new()),
            Arc::new(InMemoryAppointmentStore::new()),
        )
    }
}

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let (doctors, appointments) = build_stores(&config);
    let booking = Arc::new(AppointmentBookingService::new(appointments, doctors.clone()));

    let dispatcher = match OpenAiAgent::from_config(&config) {
        Some(agent) => {
            info!("Chat assistant enabled with model {}", config.openai_model);
            Some(Arc::new(ChatDispatcher::new(
                Arc::new(agent),
                ToolRegistry::new(booking.clone(), doctors.clone()),
                config.max_tool_iterations,
            )))
        }
        None => {
            warn!("OPENAI_API_KEY not set; the chat assistant is disabled");
            None
        }
    };

    let doctor_state = Arc::new(DoctorCellState {
        config: config.clone(),
        directory: doctors,
    });
    let appointment_state = Arc::new(AppointmentCellState {
        config: config.clone(),
        booking,
    });
    let chat_state = Arc::new(ChatCellState {
        conversations: Arc::new(ConversationStore::with_max_turns(config.max_history_turns)),
        config,
        dispatcher,
    });

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
        .nest("/chat", chat_routes(chat_state))
}
