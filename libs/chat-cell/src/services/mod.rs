pub mod agent;
pub mod conversation;
pub mod dispatch;
pub mod prompt;
pub mod tools;
