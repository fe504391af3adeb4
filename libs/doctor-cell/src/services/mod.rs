pub mod availability;
pub mod directory;
pub mod supabase;
