//! Transition application.

use super::validation::Validation;
use super::Snapshot;
use crate::error::{ValidationError, ValidationErrors};
use crate::types::{
    Asterism, AsterismId, EditType, EntityId, Event, Existence, Observation, ObservationId,
    Program, ProgramId, Target, TargetId, Transition,
};

/// Apply a transition to a snapshot.
///
/// Validation runs against `snapshot` first and reports every problem it
/// finds. Only a fully valid transition is committed, onto a copy, so the
/// input is never touched. The event is `None` when the transition was
/// accepted but changed nothing (e.g. deleting an already-deleted entity).
pub fn apply_transition(
    snapshot: &Snapshot,
    transition: &Transition,
) -> Result<(Snapshot, Option<Event>), ValidationErrors> {
    validate(snapshot, transition)?;

    let mut next = snapshot.clone();
    let change = commit(&mut next, transition).map_err(ValidationErrors::single)?;

    let event = match change {
        Some((edit_type, id)) => match next.entity(id) {
            Some(payload) => Some(Event {
                sequence: next.next_sequence(),
                edit_type,
                payload,
            }),
            None => return Err(ValidationErrors::single(ValidationError::Missing { id })),
        },
        None => None,
    };

    Ok((next, event))
}

fn validate(snapshot: &Snapshot, transition: &Transition) -> Result<(), ValidationErrors> {
    let mut v = Validation::new(snapshot);

    match transition {
        Transition::CreateProgram { name } => {
            v.non_blank("name", name.as_deref());
            v.id_available::<ProgramId>();
        }

        Transition::CreateTarget { program_ids, name } => {
            v.all_present(program_ids.iter().copied());
            v.non_blank("name", Some(name));
            v.id_available::<TargetId>();
        }

        Transition::CreateAsterism {
            program_ids,
            name,
            target_ids,
        } => {
            v.all_present(program_ids.iter().copied());
            v.all_present(target_ids.iter().copied());
            v.non_blank("name", name.as_deref());
            v.id_available::<AsterismId>();
        }

        Transition::CreateObservation {
            program_id,
            name,
            asterism_id,
        } => {
            v.present(*program_id);
            if let Some(a) = asterism_id {
                v.present(*a);
            }
            v.non_blank("name", name.as_deref());
            v.id_available::<ObservationId>();
        }

        Transition::EditProgram { id, name } => {
            v.exists(*id);
            v.non_blank("name", name.as_deref());
        }

        Transition::EditTarget { id, name } => {
            v.exists(*id);
            v.non_blank("name", Some(name));
        }

        Transition::EditAsterism {
            id,
            name,
            target_ids,
        } => {
            let current = snapshot.asterism(*id).map(|a| &a.target_ids);
            if v.exists(*id) {
                // Existing members may have been deleted since; only new
                // members must be present.
                for t in target_ids {
                    if current.is_some_and(|c| c.contains(t)) {
                        v.exists(*t);
                    } else {
                        v.present(*t);
                    }
                }
            } else {
                v.all_present(target_ids.iter().copied());
            }
            v.non_blank("name", name.as_deref());
        }

        Transition::EditObservation {
            id,
            name,
            asterism_id,
        } => {
            let current = snapshot.observation(*id).and_then(|o| o.asterism_id);
            v.exists(*id);
            if let Some(a) = asterism_id {
                if current == Some(*a) {
                    v.exists(*a);
                } else {
                    v.present(*a);
                }
            }
            v.non_blank("name", name.as_deref());
        }

        Transition::ShareTargets {
            program_id,
            target_ids,
        } => {
            v.present(*program_id);
            v.all_present(target_ids.iter().copied());
        }

        Transition::UnshareTargets {
            program_id,
            target_ids,
        } => {
            v.exists(*program_id);
            v.all_exist(target_ids.iter().copied());
        }

        Transition::ShareAsterisms {
            program_id,
            asterism_ids,
        } => {
            v.present(*program_id);
            v.all_present(asterism_ids.iter().copied());
        }

        Transition::UnshareAsterisms {
            program_id,
            asterism_ids,
        } => {
            v.exists(*program_id);
            v.all_exist(asterism_ids.iter().copied());
        }

        Transition::Delete { id, .. } | Transition::Undelete { id } => {
            v.exists(*id);
        }
    }

    v.finish()
}

type Change = Option<(EditType, EntityId)>;

/// Write a validated transition into `s`.
fn commit(s: &mut Snapshot, transition: &Transition) -> Result<Change, ValidationError> {
    match transition {
        Transition::CreateProgram { name } => {
            let id = s.allocate_id::<ProgramId>()?;
            s.programs_mut().insert(
                id,
                Program {
                    id,
                    existence: Existence::Present,
                    name: name.clone(),
                },
            );
            Ok(Some((EditType::Created, id.into())))
        }

        Transition::CreateTarget { program_ids, name } => {
            let id = s.allocate_id::<TargetId>()?;
            s.targets_mut().insert(
                id,
                Target {
                    id,
                    existence: Existence::Present,
                    name: name.clone(),
                },
            );
            for p in program_ids {
                s.program_targets_mut().share(*p, [id]);
            }
            Ok(Some((EditType::Created, id.into())))
        }

        Transition::CreateAsterism {
            program_ids,
            name,
            target_ids,
        } => {
            let id = s.allocate_id::<AsterismId>()?;
            s.asterisms_mut().insert(
                id,
                Asterism {
                    id,
                    existence: Existence::Present,
                    name: name.clone(),
                    target_ids: target_ids.clone(),
                },
            );
            for p in program_ids {
                link_asterism(s, *p, id);
            }
            Ok(Some((EditType::Created, id.into())))
        }

        Transition::CreateObservation {
            program_id,
            name,
            asterism_id,
        } => {
            let id = s.allocate_id::<ObservationId>()?;
            s.observations_mut().insert(
                id,
                Observation {
                    id,
                    existence: Existence::Present,
                    program_id: *program_id,
                    name: name.clone(),
                    asterism_id: *asterism_id,
                },
            );
            if let Some(a) = asterism_id {
                link_asterism(s, *program_id, *a);
            }
            Ok(Some((EditType::Created, id.into())))
        }

        Transition::EditProgram { id, name } => {
            let program = s.programs_mut().get_mut(id).ok_or_else(|| missing(*id))?;
            program.name = name.clone();
            Ok(Some((EditType::Updated, (*id).into())))
        }

        Transition::EditTarget { id, name } => {
            let target = s.targets_mut().get_mut(id).ok_or_else(|| missing(*id))?;
            target.name = name.clone();
            Ok(Some((EditType::Updated, (*id).into())))
        }

        Transition::EditAsterism {
            id,
            name,
            target_ids,
        } => {
            let asterism = s.asterisms_mut().get_mut(id).ok_or_else(|| missing(*id))?;
            asterism.name = name.clone();
            asterism.target_ids = target_ids.clone();

            let programs: Vec<ProgramId> = s.program_asterisms().lefts_of(*id).collect();
            for p in programs {
                s.program_targets_mut().share(p, target_ids.iter().copied());
            }
            Ok(Some((EditType::Updated, (*id).into())))
        }

        Transition::EditObservation {
            id,
            name,
            asterism_id,
        } => {
            let observation = s.observations_mut().get_mut(id).ok_or_else(|| missing(*id))?;
            observation.name = name.clone();
            observation.asterism_id = *asterism_id;
            let program_id = observation.program_id;

            if let Some(a) = asterism_id {
                link_asterism(s, program_id, *a);
            }
            Ok(Some((EditType::Updated, (*id).into())))
        }

        Transition::ShareTargets {
            program_id,
            target_ids,
        } => {
            s.program_targets_mut()
                .share(*program_id, target_ids.iter().copied());
            Ok(Some((EditType::Updated, (*program_id).into())))
        }

        Transition::UnshareTargets {
            program_id,
            target_ids,
        } => {
            s.program_targets_mut()
                .unshare(*program_id, target_ids.iter().copied());
            Ok(Some((EditType::Updated, (*program_id).into())))
        }

        Transition::ShareAsterisms {
            program_id,
            asterism_ids,
        } => {
            for a in asterism_ids {
                link_asterism(s, *program_id, *a);
            }
            Ok(Some((EditType::Updated, (*program_id).into())))
        }

        Transition::UnshareAsterisms {
            program_id,
            asterism_ids,
        } => {
            s.program_asterisms_mut()
                .unshare(*program_id, asterism_ids.iter().copied());
            Ok(Some((EditType::Updated, (*program_id).into())))
        }

        Transition::Delete {
            id,
            prune_associations,
        } => {
            let existence = s.existence(*id).ok_or(ValidationError::Missing { id: *id })?;
            let pruned = *prune_associations && s.remove_all_associations_for(*id);
            if existence == Existence::Deleted && !pruned {
                return Ok(None);
            }
            s.set_existence(*id, Existence::Deleted);
            Ok(Some((EditType::Deleted, *id)))
        }

        Transition::Undelete { id } => {
            let existence = s.existence(*id).ok_or(ValidationError::Missing { id: *id })?;
            if existence == Existence::Present {
                return Ok(None);
            }
            s.set_existence(*id, Existence::Present);
            Ok(Some((EditType::Updated, *id)))
        }
    }
}

/// Share an asterism, and every target in it, with a program.
fn link_asterism(s: &mut Snapshot, program_id: ProgramId, asterism_id: AsterismId) {
    s.program_asterisms_mut().share(program_id, [asterism_id]);

    let targets: Vec<TargetId> = s
        .asterism(asterism_id)
        .map(|a| a.target_ids.iter().copied().collect())
        .unwrap_or_default();
    s.program_targets_mut().share(program_id, targets);
}

fn missing(id: impl Into<EntityId>) -> ValidationError {
    ValidationError::Missing { id: id.into() }
}
