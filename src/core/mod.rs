// Domain layer: error taxonomy, request-scoped models, resilience

pub mod errors;
pub mod models;
pub mod resilience;
