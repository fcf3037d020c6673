pub mod assessment;
pub mod auth;
pub mod error;
pub mod suggestion;
