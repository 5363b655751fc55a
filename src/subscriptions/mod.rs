//! Live query subscriptions.
//!
//! A [`SubscriptionEngine`] owns the subscriptions of one client
//! connection. Each subscription is an upstream stream of query results,
//! typically re-evaluated whenever the store publishes an edit, drained by
//! its own background task into a single outbound queue.
//!
//! Subscriptions support:
//! - Per-subscription FIFO delivery, tagged with the client's id
//! - Error items forwarded as `Error` messages without ending the stream
//! - Cooperative stop plus forced abort on `remove` and `terminate`
//!
//! # Example
//!
//! ```ignore
//! let (engine, mut outbound) = SubscriptionEngine::channel(&EngineConfig::default());
//!
//! engine.add("q1", query_results).await;
//!
//! while let Some(message) = outbound.recv().await {
//!     match message {
//!         OutboundMessage::Data { id, payload } => send_data(&id, payload).await,
//!         OutboundMessage::Error { id, message } => send_error(&id, &message).await,
//!         OutboundMessage::Complete { id } => send_complete(&id).await,
//!     }
//! }
//! ```

mod engine;
mod types;

pub use engine::SubscriptionEngine;
pub use types::{EngineConfig, OutboundMessage, SubscriptionStatus};
