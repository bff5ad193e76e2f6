//! Ports (trait seams) used by the gateway.

pub mod outbound;
