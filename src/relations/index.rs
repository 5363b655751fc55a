//! Bidirectional multimap.

use std::collections::{BTreeMap, BTreeSet};

/// Many-to-many association between `L` and `R` ids.
///
/// Empty sets are never stored, so two indices holding the same pairings
/// compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManyToMany<L: Ord, R: Ord> {
    /// left -> rights paired with it.
    forward: BTreeMap<L, BTreeSet<R>>,
    /// right -> lefts paired with it.
    reverse: BTreeMap<R, BTreeSet<L>>,
}

impl<L: Ord, R: Ord> Default for ManyToMany<L, R> {
    fn default() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }
}

impl<L: Ord + Copy, R: Ord + Copy> ManyToMany<L, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `left` with each of `rights`. Existing pairings are kept.
    pub fn share(&mut self, left: L, rights: impl IntoIterator<Item = R>) {
        for right in rights {
            self.forward.entry(left).or_default().insert(right);
            self.reverse.entry(right).or_default().insert(left);
        }
    }

    /// Remove the pairing of `left` with each of `rights`. Absent pairings
    /// are ignored.
    pub fn unshare(&mut self, left: L, rights: impl IntoIterator<Item = R>) {
        for right in rights {
            remove_pair(&mut self.forward, left, right);
            remove_pair(&mut self.reverse, right, left);
        }
    }

    /// Drop every pairing naming `left`. Returns whether any existed.
    pub fn remove_left(&mut self, left: L) -> bool {
        match self.forward.remove(&left) {
            Some(rights) => {
                for right in rights {
                    remove_pair(&mut self.reverse, right, left);
                }
                true
            }
            None => false,
        }
    }

    /// Drop every pairing naming `right`. Returns whether any existed.
    pub fn remove_right(&mut self, right: R) -> bool {
        match self.reverse.remove(&right) {
            Some(lefts) => {
                for left in lefts {
                    remove_pair(&mut self.forward, left, right);
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, left: L, right: R) -> bool {
        self.forward
            .get(&left)
            .is_some_and(|rights| rights.contains(&right))
    }

    /// Rights paired with `left`, in id order.
    pub fn rights_of(&self, left: L) -> impl Iterator<Item = R> + '_ {
        self.forward.get(&left).into_iter().flatten().copied()
    }

    /// Lefts paired with `right`, in id order.
    pub fn lefts_of(&self, right: R) -> impl Iterator<Item = L> + '_ {
        self.reverse.get(&right).into_iter().flatten().copied()
    }

    /// Every pairing, ordered by left then right.
    pub fn pairs(&self) -> impl Iterator<Item = (L, R)> + '_ {
        self.forward
            .iter()
            .flat_map(|(left, rights)| rights.iter().map(move |right| (*left, *right)))
    }

    /// Number of pairings.
    pub fn len(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Check that both sides describe exactly the same pairings.
    pub fn is_consistent(&self) -> bool {
        let forward_matches = self.forward.iter().all(|(left, rights)| {
            !rights.is_empty()
                && rights.iter().all(|right| {
                    self.reverse
                        .get(right)
                        .is_some_and(|lefts| lefts.contains(left))
                })
        });
        let reverse_matches = self.reverse.iter().all(|(right, lefts)| {
            !lefts.is_empty()
                && lefts.iter().all(|left| {
                    self.forward
                        .get(left)
                        .is_some_and(|rights| rights.contains(right))
                })
        });
        forward_matches && reverse_matches
    }
}

fn remove_pair<K: Ord, V: Ord>(map: &mut BTreeMap<K, BTreeSet<V>>, key: K, value: V) {
    if let Some(values) = map.get_mut(&key) {
        values.remove(&value);
        if values.is_empty() {
            map.remove(&key);
        }
    }
}
