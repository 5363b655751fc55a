//! Snapshot state and the transitions that move it forward.
//!
//! A [`Snapshot`] is an immutable value. [`apply_transition`] validates a
//! [`Transition`](crate::types::Transition) against one snapshot and, only
//! if every check passes, returns the next snapshot plus the event that
//! describes the change.

mod operations;
mod snapshot;
mod validation;

pub use operations::apply_transition;
pub use snapshot::{Snapshot, DEFAULT_ID_LIMIT};
