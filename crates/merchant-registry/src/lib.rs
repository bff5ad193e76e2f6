//! # Merchant Registry - Lookup Responder
//!
//! The owning side of the API-key bridge. Consumes lookup requests from the
//! shared request topic, resolves them against the authoritative merchant
//! directory and answers on the requester's private reply topic.
//!
//! ```text
//! merchant.api_key.lookup ──→ LookupResponder ──→ MerchantDirectory
//!                                   │
//!                                   └──→ merchant.api_key.reply.<instance>
//! ```
//!
//! Every well-formed request gets exactly one reply; a directory failure is
//! answered as "not found" rather than left silent.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod ports;
pub mod responder;

pub use adapters::memory::InMemoryMerchantDirectory;
pub use ports::outbound::{DirectoryError, MerchantDirectory};
pub use responder::{LookupResponder, ResponderOutcome};
