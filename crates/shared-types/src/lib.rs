//! # Shared Types Crate
//!
//! Domain entities and bus wire messages for the API-key validation bridge.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the request/reply schema used on the bus is
//!   defined here and nowhere else.
//! - **Redacted Secrets**: `ApiKey` never prints its full value.
//! - **Strings on the Wire**: correlation IDs travel as strings so that a
//!   malformed ID is detectable by the receiver instead of failing the whole
//!   deserialisation.

pub mod entities;
pub mod errors;
pub mod ipc;
pub mod topics;

pub use entities::*;
pub use errors::*;
pub use ipc::*;
pub use topics::*;
