//! The immutable aggregate held by the store.

use crate::error::ValidationError;
use crate::relations::ManyToMany;
use crate::types::{
    Asterism, AsterismId, Entity, EntityId, EntityKind, Existence, Gid, Observation,
    ObservationId, Program, ProgramId, Sequence, Target, TargetId,
};
use std::collections::BTreeMap;

/// Default upper bound of every id space (the largest positive `i64`).
pub const DEFAULT_ID_LIMIT: u64 = i64::MAX as u64;

/// Next id to hand out, per entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IdCursors {
    program: u64,
    observation: u64,
    target: u64,
    asterism: u64,
}

impl Default for IdCursors {
    fn default() -> Self {
        Self {
            program: 1,
            observation: 1,
            target: 1,
            asterism: 1,
        }
    }
}

/// One consistent, point-in-time value of the whole store.
///
/// Snapshots are plain values: transitions clone, edit and return a new
/// one. Once published by the store they are never modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    id_limit: u64,
    cursors: IdCursors,
    last_sequence: Sequence,

    programs: BTreeMap<ProgramId, Program>,
    observations: BTreeMap<ObservationId, Observation>,
    targets: BTreeMap<TargetId, Target>,
    asterisms: BTreeMap<AsterismId, Asterism>,

    program_asterisms: ManyToMany<ProgramId, AsterismId>,
    program_targets: ManyToMany<ProgramId, TargetId>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty(DEFAULT_ID_LIMIT)
    }
}

impl Snapshot {
    /// An empty snapshot whose id spaces run from 1 to `id_limit`.
    ///
    /// A zero limit is treated as 1.
    pub fn empty(id_limit: u64) -> Self {
        Self {
            id_limit: id_limit.max(1),
            cursors: IdCursors::default(),
            last_sequence: Sequence::default(),
            programs: BTreeMap::new(),
            observations: BTreeMap::new(),
            targets: BTreeMap::new(),
            asterisms: BTreeMap::new(),
            program_asterisms: ManyToMany::new(),
            program_targets: ManyToMany::new(),
        }
    }

    // --- Reads ---

    pub fn id_limit(&self) -> u64 {
        self.id_limit
    }

    /// Sequence of the most recent event, `Seq(0)` before any edit.
    pub fn last_sequence(&self) -> Sequence {
        self.last_sequence
    }

    pub fn programs(&self) -> &BTreeMap<ProgramId, Program> {
        &self.programs
    }

    pub fn observations(&self) -> &BTreeMap<ObservationId, Observation> {
        &self.observations
    }

    pub fn targets(&self) -> &BTreeMap<TargetId, Target> {
        &self.targets
    }

    pub fn asterisms(&self) -> &BTreeMap<AsterismId, Asterism> {
        &self.asterisms
    }

    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(&id)
    }

    pub fn observation(&self, id: ObservationId) -> Option<&Observation> {
        self.observations.get(&id)
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn asterism(&self, id: AsterismId) -> Option<&Asterism> {
        self.asterisms.get(&id)
    }

    pub fn program_asterisms(&self) -> &ManyToMany<ProgramId, AsterismId> {
        &self.program_asterisms
    }

    pub fn program_targets(&self) -> &ManyToMany<ProgramId, TargetId> {
        &self.program_targets
    }

    /// Existence of any entity, `None` if the id was never allocated.
    pub fn existence(&self, id: EntityId) -> Option<Existence> {
        match id {
            EntityId::Program(id) => self.programs.get(&id).map(|p| p.existence),
            EntityId::Observation(id) => self.observations.get(&id).map(|o| o.existence),
            EntityId::Target(id) => self.targets.get(&id).map(|t| t.existence),
            EntityId::Asterism(id) => self.asterisms.get(&id).map(|a| a.existence),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.existence(id).is_some()
    }

    /// Owned copy of any entity.
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        match id {
            EntityId::Program(id) => self.programs.get(&id).cloned().map(Entity::Program),
            EntityId::Observation(id) => {
                self.observations.get(&id).cloned().map(Entity::Observation)
            }
            EntityId::Target(id) => self.targets.get(&id).cloned().map(Entity::Target),
            EntityId::Asterism(id) => self.asterisms.get(&id).cloned().map(Entity::Asterism),
        }
    }

    /// Observations belonging to a program, in id order.
    pub fn observations_for(&self, program_id: ProgramId) -> impl Iterator<Item = &Observation> {
        self.observations
            .values()
            .filter(move |o| o.program_id == program_id)
    }

    /// Number of entities of one kind, deleted ones included.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Program => self.programs.len(),
            EntityKind::Observation => self.observations.len(),
            EntityKind::Target => self.targets.len(),
            EntityKind::Asterism => self.asterisms.len(),
        }
    }

    /// Describe every broken invariant. Empty when the snapshot is sound.
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if !self.program_asterisms.is_consistent() {
            violations.push("program/asterism index sides disagree".to_string());
        }
        if !self.program_targets.is_consistent() {
            violations.push("program/target index sides disagree".to_string());
        }

        for (p, a) in self.program_asterisms.pairs() {
            if !self.programs.contains_key(&p) || !self.asterisms.contains_key(&a) {
                violations.push(format!("dangling program/asterism pair ({p}, {a})"));
            }
        }
        for (p, t) in self.program_targets.pairs() {
            if !self.programs.contains_key(&p) || !self.targets.contains_key(&t) {
                violations.push(format!("dangling program/target pair ({p}, {t})"));
            }
        }

        for o in self.observations.values() {
            if !self.programs.contains_key(&o.program_id) {
                violations.push(format!("{} references missing {}", o.id, o.program_id));
            }
            if let Some(a) = o.asterism_id {
                if !self.asterisms.contains_key(&a) {
                    violations.push(format!("{} references missing {a}", o.id));
                }
            }
        }
        for a in self.asterisms.values() {
            for t in &a.target_ids {
                if !self.targets.contains_key(t) {
                    violations.push(format!("{} references missing {t}", a.id));
                }
            }
        }

        violations
    }

    // --- Id allocation ---

    /// The id the next create of `T` would receive.
    ///
    /// Walks the cyclic id space from the cursor, skipping ids still in
    /// use after a wraparound.
    pub(crate) fn peek_id<T: Gid>(&self) -> Result<T, ValidationError> {
        let exhausted = ValidationError::IdSpaceExhausted { kind: T::KIND };
        let used = self.count(T::KIND) as u64;
        if used >= self.id_limit {
            return Err(exhausted);
        }

        let mut candidate = self.cursor(T::KIND);
        // At most `used` ids can be taken, so a free one turns up within
        // `used + 1` candidates.
        for _ in 0..=used {
            let id = T::from_u64(candidate).ok_or_else(|| exhausted.clone())?;
            if !self.contains(id.into()) {
                return Ok(id);
            }
            candidate = cycle(candidate, self.id_limit);
        }
        Err(exhausted)
    }

    /// Allocate the next id of `T`, advancing its cursor past it.
    pub(crate) fn allocate_id<T: Gid>(&mut self) -> Result<T, ValidationError> {
        let id = self.peek_id::<T>()?;
        let next = cycle(id.value(), self.id_limit);
        *self.cursor_mut(T::KIND) = next;
        Ok(id)
    }

    pub(crate) fn next_sequence(&mut self) -> Sequence {
        self.last_sequence = self.last_sequence.next();
        self.last_sequence
    }

    fn cursor(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Program => self.cursors.program,
            EntityKind::Observation => self.cursors.observation,
            EntityKind::Target => self.cursors.target,
            EntityKind::Asterism => self.cursors.asterism,
        }
    }

    fn cursor_mut(&mut self, kind: EntityKind) -> &mut u64 {
        match kind {
            EntityKind::Program => &mut self.cursors.program,
            EntityKind::Observation => &mut self.cursors.observation,
            EntityKind::Target => &mut self.cursors.target,
            EntityKind::Asterism => &mut self.cursors.asterism,
        }
    }

    // --- Writes (only reachable through transitions) ---

    pub(crate) fn programs_mut(&mut self) -> &mut BTreeMap<ProgramId, Program> {
        &mut self.programs
    }

    pub(crate) fn observations_mut(&mut self) -> &mut BTreeMap<ObservationId, Observation> {
        &mut self.observations
    }

    pub(crate) fn targets_mut(&mut self) -> &mut BTreeMap<TargetId, Target> {
        &mut self.targets
    }

    pub(crate) fn asterisms_mut(&mut self) -> &mut BTreeMap<AsterismId, Asterism> {
        &mut self.asterisms
    }

    pub(crate) fn program_asterisms_mut(&mut self) -> &mut ManyToMany<ProgramId, AsterismId> {
        &mut self.program_asterisms
    }

    pub(crate) fn program_targets_mut(&mut self) -> &mut ManyToMany<ProgramId, TargetId> {
        &mut self.program_targets
    }

    /// Set the existence flag of an entity. Returns false if absent.
    pub(crate) fn set_existence(&mut self, id: EntityId, existence: Existence) -> bool {
        let slot = match id {
            EntityId::Program(id) => self.programs.get_mut(&id).map(|p| &mut p.existence),
            EntityId::Observation(id) => {
                self.observations.get_mut(&id).map(|o| &mut o.existence)
            }
            EntityId::Target(id) => self.targets.get_mut(&id).map(|t| &mut t.existence),
            EntityId::Asterism(id) => self.asterisms.get_mut(&id).map(|a| &mut a.existence),
        };
        match slot {
            Some(slot) => {
                *slot = existence;
                true
            }
            None => false,
        }
    }

    /// Drop every relation entry naming `id`, across both indices.
    pub(crate) fn remove_all_associations_for(&mut self, id: EntityId) -> bool {
        match id {
            EntityId::Program(p) => {
                let asterisms = self.program_asterisms.remove_left(p);
                let targets = self.program_targets.remove_left(p);
                asterisms || targets
            }
            EntityId::Asterism(a) => self.program_asterisms.remove_right(a),
            EntityId::Target(t) => self.program_targets.remove_right(t),
            EntityId::Observation(_) => false,
        }
    }
}

/// Successor of `value` in `[1, limit]`, wrapping to 1.
fn cycle(value: u64, limit: u64) -> u64 {
    if value >= limit {
        1
    } else {
        value + 1
    }
}
