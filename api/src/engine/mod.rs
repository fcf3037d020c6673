//! The classification and suggestion engine behind the prediction routes.

pub mod classifier;
pub mod service;
pub mod suggestion;
