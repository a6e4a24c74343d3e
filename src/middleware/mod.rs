pub mod auth;
pub mod policy;
pub mod response;

pub use auth::AuthUser;
pub use response::{ApiResponse, ApiResult};
