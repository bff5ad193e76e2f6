//! Domain layer: correlation IDs, the pending-call registry, configuration
//! and errors.

pub mod config;
pub mod correlation;
pub mod error;
pub mod pending;
