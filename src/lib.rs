//! # Observation Store
//!
//! An in-memory, versioned store of programs, observations, targets and
//! asterisms, with live query subscriptions on top.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: Immutable values of the whole store, swapped in whole
//! - **Transitions**: Validated edits that turn one snapshot into the next
//! - **Relations**: Program/asterism and program/target many-to-many indices
//! - **Events**: One globally sequenced record per committed edit
//! - **Subscriptions**: Per-client query streams multiplexed onto one queue
//!
//! ## Example
//!
//! ```ignore
//! use obsstore::{Store, StoreConfig, Transition};
//!
//! let store = Store::new(StoreConfig::default())?;
//!
//! let commit = store.apply(&Transition::CreateProgram {
//!     name: Some("Deep field".into()),
//! })?;
//!
//! // Readers hold a consistent view for as long as they like.
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.programs().len(), 1);
//! ```

pub mod error;
pub mod events;
pub mod relations;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{ParseIdError, Result, StoreError, ValidationError, ValidationErrors};
pub use events::{
    DropReason, EventBus, EventFilter, FeedEvent, ListenerConfig, ListenerHandle, ListenerId,
};
pub use relations::ManyToMany;
pub use state::{apply_transition, Snapshot, DEFAULT_ID_LIMIT};
pub use store::{Commit, Store, StoreConfig};
pub use subscriptions::{EngineConfig, OutboundMessage, SubscriptionEngine, SubscriptionStatus};
pub use types::*;
