//! Error-accumulating checks against a snapshot.

use super::Snapshot;
use crate::error::{ValidationError, ValidationErrors};
use crate::types::{EntityId, Existence, Gid};

/// Collects every problem with a transition before anything is written.
pub(crate) struct Validation<'a> {
    snapshot: &'a Snapshot,
    errors: Vec<ValidationError>,
}

impl<'a> Validation<'a> {
    pub(crate) fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            errors: Vec::new(),
        }
    }

    /// The id must exist, deleted or not.
    pub(crate) fn exists(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        if self.snapshot.contains(id) {
            true
        } else {
            self.errors.push(ValidationError::Missing { id });
            false
        }
    }

    /// The id must exist and be present. Used for new references.
    pub(crate) fn present(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        match self.snapshot.existence(id) {
            Some(Existence::Present) => true,
            Some(Existence::Deleted) => {
                self.errors.push(ValidationError::Deleted { id });
                false
            }
            None => {
                self.errors.push(ValidationError::Missing { id });
                false
            }
        }
    }

    pub(crate) fn all_exist<I>(&mut self, ids: impl IntoIterator<Item = I>)
    where
        I: Into<EntityId>,
    {
        for id in ids {
            self.exists(id);
        }
    }

    pub(crate) fn all_present<I>(&mut self, ids: impl IntoIterator<Item = I>)
    where
        I: Into<EntityId>,
    {
        for id in ids {
            self.present(id);
        }
    }

    /// Optional names may be absent but not blank.
    pub(crate) fn non_blank(&mut self, field: &'static str, value: Option<&str>) {
        if value.is_some_and(|v| v.trim().is_empty()) {
            self.errors.push(ValidationError::EmptyField { field });
        }
    }

    /// A create must have an id left to hand out.
    pub(crate) fn id_available<T: Gid>(&mut self) {
        if let Err(e) = self.snapshot.peek_id::<T>() {
            self.errors.push(e);
        }
    }

    pub(crate) fn finish(self) -> Result<(), ValidationErrors> {
        match ValidationErrors::from_vec(self.errors) {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProgramId, TargetId};

    #[test]
    fn test_errors_accumulate() {
        let snapshot = Snapshot::default();
        let mut v = Validation::new(&snapshot);

        v.present(ProgramId::MIN);
        v.exists(TargetId::MIN);
        v.non_blank("name", Some("  "));

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_clean_validation_passes() {
        let snapshot = Snapshot::default();
        let mut v = Validation::new(&snapshot);

        v.non_blank("name", None);
        v.id_available::<ProgramId>();

        assert!(v.finish().is_ok());
    }
}
