//! Bus-facing side of the bridge.

pub mod handler;
pub mod listener;
pub mod publisher;
