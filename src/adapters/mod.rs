pub mod content;
pub mod email;
pub mod stripe;
