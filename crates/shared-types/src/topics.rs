//! # Bus Topic Names
//!
//! The request channel is shared by every gateway instance; each gateway
//! instance owns a private reply channel so that replies are never fanned out
//! to instances that did not issue the request.

/// Shared request channel consumed by the merchant registry.
pub const LOOKUP_REQUEST_TOPIC: &str = "merchant.api_key.lookup";

/// Prefix of per-instance reply channels.
pub const LOOKUP_REPLY_TOPIC_PREFIX: &str = "merchant.api_key.reply";

/// Reply channel for a gateway instance.
#[must_use]
pub fn reply_topic(instance_id: &str) -> String {
    format!("{LOOKUP_REPLY_TOPIC_PREFIX}.{instance_id}")
}

/// Whether `topic` is a reply channel.
#[must_use]
pub fn is_reply_topic(topic: &str) -> bool {
    topic
        .strip_prefix(LOOKUP_REPLY_TOPIC_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|instance| !instance.is_empty())
}
