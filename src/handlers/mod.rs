pub mod admin;
pub mod billing;
pub mod content;
pub mod email_tracking;
pub mod insights;
pub mod users;
