//! Subscription types.

use serde::{Deserialize, Serialize};

/// Configuration for a subscription engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capacity of the shared outbound queue. A full queue stalls the
    /// subscription tasks feeding it until the transport catches up.
    /// Default: 256
    pub outbound_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
        }
    }
}

/// Protocol messages sent to the client transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One result from a subscribed query.
    Data {
        id: String,
        payload: serde_json::Value,
    },

    /// One failed evaluation of a subscribed query.
    Error { id: String, message: String },

    /// The subscription is over; nothing more will arrive for `id`.
    Complete { id: String },
}

impl OutboundMessage {
    /// Subscription this message belongs to.
    pub fn id(&self) -> &str {
        match self {
            OutboundMessage::Data { id, .. }
            | OutboundMessage::Error { id, .. }
            | OutboundMessage::Complete { id } => id,
        }
    }
}

/// Observable state of a registered subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// The background task is still running.
    Active,
    /// The task ended on its own (stream exhausted, outbound closed, or
    /// panic) and the entry awaits `remove` or `reap_finished`.
    Finished,
}
