//! Feed of committed edits.
//!
//! Every transition the store accepts is published here as an
//! [`Event`](crate::types::Event). Listeners get a bounded buffer and an
//! optional filter on entity kind or edit type; a listener that falls a
//! full buffer behind is dropped rather than stalling writers.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.listen(ListenerConfig {
//!     filter: EventFilter::kinds(vec![EntityKind::Observation]),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(FeedEvent::Edit { event }) => println!("{:?} {:?}", event.sequence, event.edit_type),
//!         Ok(FeedEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{DropReason, EventFilter, FeedEvent, ListenerConfig, ListenerHandle, ListenerId};
