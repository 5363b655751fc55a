//! Core types for the observation store.

use crate::error::ParseIdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Position in the global edit log.
///
/// One counter is shared by every entity kind, so sequences give a total
/// order over all accepted edits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sequence {
    /// Saturates at `u64::MAX`, after which sequences repeat. At a billion
    /// edits per second that is over five centuries away.
    pub fn next(self) -> Self {
        Sequence(self.0.saturating_add(1))
    }

    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Sequence(self.0 - 1))
        } else {
            None
        }
    }
}

/// The four kinds of entity held by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Program,
    Observation,
    Target,
    Asterism,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Program,
        EntityKind::Observation,
        EntityKind::Target,
        EntityKind::Asterism,
    ];

    /// One-character discriminator used in the display form of ids.
    pub fn tag(self) -> char {
        match self {
            EntityKind::Program => 'p',
            EntityKind::Observation => 'o',
            EntityKind::Target => 't',
            EntityKind::Asterism => 'a',
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Program => "program",
            EntityKind::Observation => "observation",
            EntityKind::Target => "target",
            EntityKind::Asterism => "asterism",
        };
        f.write_str(name)
    }
}

/// Typed entity identifiers.
///
/// Every id is a positive integer tagged with its kind. The display form is
/// `<tag>-<hex>`, e.g. `p-2a`.
pub trait Gid: Copy + Ord + fmt::Display + Into<EntityId> {
    const KIND: EntityKind;

    /// Wrap a raw value. Zero is not a valid id.
    fn from_u64(value: u64) -> Option<Self>;

    fn value(self) -> u64;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const MIN: $name = $name(1);
        }

        impl Gid for $name {
            const KIND: EntityKind = $kind;

            fn from_u64(value: u64) -> Option<Self> {
                (value > 0).then_some($name(value))
            }

            fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{:x}", <$name as Gid>::KIND.tag(), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_gid(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Program`].
    ProgramId,
    EntityKind::Program
);
entity_id!(
    /// Identifier of an [`Observation`].
    ObservationId,
    EntityKind::Observation
);
entity_id!(
    /// Identifier of a [`Target`].
    TargetId,
    EntityKind::Target
);
entity_id!(
    /// Identifier of an [`Asterism`].
    AsterismId,
    EntityKind::Asterism
);

fn parse_gid<T: Gid>(s: &str) -> Result<T, ParseIdError> {
    let invalid = || ParseIdError {
        kind: T::KIND,
        input: s.to_string(),
    };

    let mut chars = s.chars();
    if chars.next() != Some(T::KIND.tag()) || chars.next() != Some('-') {
        return Err(invalid());
    }
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let value = u64::from_str_radix(digits, 16).map_err(|_| invalid())?;
    T::from_u64(value).ok_or_else(invalid)
}

/// An id of any kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Program(ProgramId),
    Observation(ObservationId),
    Target(TargetId),
    Asterism(AsterismId),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Program(_) => EntityKind::Program,
            EntityId::Observation(_) => EntityKind::Observation,
            EntityId::Target(_) => EntityKind::Target,
            EntityId::Asterism(_) => EntityKind::Asterism,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Program(id) => id.fmt(f),
            EntityId::Observation(id) => id.fmt(f),
            EntityId::Target(id) => id.fmt(f),
            EntityId::Asterism(id) => id.fmt(f),
        }
    }
}

impl FromStr for EntityId {
    type Err = ParseIdError;

    /// Dispatches on the leading tag character.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.chars().next() {
            Some('p') => s.parse().map(EntityId::Program),
            Some('o') => s.parse().map(EntityId::Observation),
            Some('t') => s.parse().map(EntityId::Target),
            Some('a') => s.parse().map(EntityId::Asterism),
            _ => Err(ParseIdError {
                kind: EntityKind::Program,
                input: s.to_string(),
            }),
        }
    }
}

impl From<ProgramId> for EntityId {
    fn from(id: ProgramId) -> Self {
        EntityId::Program(id)
    }
}

impl From<ObservationId> for EntityId {
    fn from(id: ObservationId) -> Self {
        EntityId::Observation(id)
    }
}

impl From<TargetId> for EntityId {
    fn from(id: TargetId) -> Self {
        EntityId::Target(id)
    }
}

impl From<AsterismId> for EntityId {
    fn from(id: AsterismId) -> Self {
        EntityId::Asterism(id)
    }
}

/// Soft-delete flag. Entities are never physically removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Existence {
    #[default]
    Present,
    Deleted,
}

impl Existence {
    pub fn is_present(self) -> bool {
        self == Existence::Present
    }
}

/// A science program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub existence: Existence,
    pub name: Option<String>,
}

/// A single observation within a program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub existence: Existence,
    pub program_id: ProgramId,
    pub name: Option<String>,
    /// The asterism being observed, if one has been chosen.
    pub asterism_id: Option<AsterismId>,
}

/// A science target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub existence: Existence,
    pub name: String,
}

/// A group of targets observed together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asterism {
    pub id: AsterismId,
    pub existence: Existence,
    pub name: Option<String>,
    pub target_ids: BTreeSet<TargetId>,
}

/// Any stored entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Program(Program),
    Observation(Observation),
    Target(Target),
    Asterism(Asterism),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Program(p) => p.id.into(),
            Entity::Observation(o) => o.id.into(),
            Entity::Target(t) => t.id.into(),
            Entity::Asterism(a) => a.id.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id().kind()
    }

    pub fn existence(&self) -> Existence {
        match self {
            Entity::Program(p) => p.existence,
            Entity::Observation(o) => o.existence,
            Entity::Target(t) => t.existence,
            Entity::Asterism(a) => a.existence,
        }
    }
}

/// What an accepted transition did to its payload entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    Created,
    Updated,
    Deleted,
}

/// Record of one accepted transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: Sequence,
    pub edit_type: EditType,
    /// The entity as it stands after the edit.
    pub payload: Entity,
}

/// A mutation request, validated and applied as one unit.
///
/// Edits replace every editable field of the target entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    CreateProgram {
        name: Option<String>,
    },

    /// Create a target and share it with each listed program.
    CreateTarget {
        program_ids: Vec<ProgramId>,
        name: String,
    },

    /// Create an asterism. The asterism and its targets are shared with
    /// each listed program.
    CreateAsterism {
        program_ids: Vec<ProgramId>,
        name: Option<String>,
        target_ids: BTreeSet<TargetId>,
    },

    /// Create an observation. A chosen asterism (and its targets) becomes
    /// shared with the observation's program.
    CreateObservation {
        program_id: ProgramId,
        name: Option<String>,
        asterism_id: Option<AsterismId>,
    },

    EditProgram {
        id: ProgramId,
        name: Option<String>,
    },

    EditTarget {
        id: TargetId,
        name: String,
    },

    /// Rewrite an asterism. New members are shared with every program the
    /// asterism is already shared with.
    EditAsterism {
        id: AsterismId,
        name: Option<String>,
        target_ids: BTreeSet<TargetId>,
    },

    EditObservation {
        id: ObservationId,
        name: Option<String>,
        asterism_id: Option<AsterismId>,
    },

    ShareTargets {
        program_id: ProgramId,
        target_ids: Vec<TargetId>,
    },

    UnshareTargets {
        program_id: ProgramId,
        target_ids: Vec<TargetId>,
    },

    ShareAsterisms {
        program_id: ProgramId,
        asterism_ids: Vec<AsterismId>,
    },

    UnshareAsterisms {
        program_id: ProgramId,
        asterism_ids: Vec<AsterismId>,
    },

    /// Mark an entity deleted. With `prune_associations` every relation
    /// entry naming it is dropped as part of the same transition.
    Delete {
        id: EntityId,
        prune_associations: bool,
    },

    Undelete {
        id: EntityId,
    },
}

impl Transition {
    /// Soft-delete without touching relations.
    pub fn delete(id: impl Into<EntityId>) -> Self {
        Transition::Delete {
            id: id.into(),
            prune_associations: false,
        }
    }

    /// Soft-delete and drop every relation entry naming the entity.
    pub fn delete_and_unshare(id: impl Into<EntityId>) -> Self {
        Transition::Delete {
            id: id.into(),
            prune_associations: true,
        }
    }

    pub fn undelete(id: impl Into<EntityId>) -> Self {
        Transition::Undelete { id: id.into() }
    }
}
