//! Many-to-many relation indices.
//!
//! Each index keeps a forward and a reverse multimap. Every mutating
//! operation touches both sides, so a pairing is always visible from
//! either end.

mod index;

pub use index::ManyToMany;
