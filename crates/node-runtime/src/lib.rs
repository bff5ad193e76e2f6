//! # Node Runtime Library
//!
//! Wires both sides of the API-key bridge into one process. The `main.rs`
//! binary is a thin wrapper around [`NodeRuntime`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (environment)
//! 2. Create the event bus
//! 3. Seed the merchant directory and start the responder
//! 4. Start the gateway (reply listener, sweeper, resolver)
//! 5. Signal ready

pub mod config;
pub mod runtime;

pub use config::{parse_seed_merchants, NodeConfig, NodeConfigError};
pub use runtime::NodeRuntime;
