pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Doctor, DoctorError, DoctorSchedule, DoctorSummary, RegisterDoctorRequest, ScheduleError};
pub use services::availability::{TimeWindow, WeeklyAvailability};
pub use services::directory::{DoctorDirectory, InMemoryDoctorDirectory};
pub use services::supabase::SupabaseDoctorDirectory;
