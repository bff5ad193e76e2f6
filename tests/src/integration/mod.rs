//! Integration flows over the in-memory bus.

pub mod harness;

mod bridge_flows;
mod failure_modes;
