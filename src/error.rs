//! Error types for the observation store.

use crate::types::{EntityId, EntityKind, Sequence};
use std::fmt;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A candidate snapshot or event would not advance the event sequence.
    #[error("Sequence regression: current {current}, candidate {candidate}")]
    SequenceRegression {
        current: Sequence,
        candidate: Sequence,
    },
}

/// A single reason a transition was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A referenced id is not in the snapshot.
    #[error("{id} does not exist")]
    Missing { id: EntityId },

    /// A new reference points at a deleted entity.
    #[error("{id} is deleted")]
    Deleted { id: EntityId },

    /// Every id of this kind up to the id limit is taken.
    #[error("no free {kind} id remains")]
    IdSpaceExhausted { kind: EntityKind },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Non-empty collection of validation errors for one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Returns `None` for an empty vector.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Failure to parse the display form of an id.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid {kind} id: {input:?}")]
pub struct ParseIdError {
    pub kind: EntityKind,
    pub input: String,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gid, ProgramId, TargetId};

    #[test]
    fn test_empty_collection_is_rejected() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn test_display_lists_every_error() {
        let errors = ValidationErrors::from_vec(vec![
            ValidationError::Missing {
                id: ProgramId::from_u64(2).unwrap().into(),
            },
            ValidationError::Deleted {
                id: TargetId::from_u64(10).unwrap().into(),
            },
        ])
        .unwrap();

        assert_eq!(errors.to_string(), "p-2 does not exist; t-a is deleted");
    }
}
