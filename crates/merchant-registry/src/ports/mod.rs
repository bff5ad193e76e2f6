//! Ports (trait seams) used by the responder.

pub mod outbound;
