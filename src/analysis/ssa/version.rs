//! Variable versions and the sparse version map.

use std::{collections::BTreeMap, fmt};

use crate::utils::BitSet;

/// A `(slot, version)` pair naming one SSA value.
///
/// Negative slots are pseudo-slots for field-access sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarVersion {
    /// Local variable slot, or a negative field pseudo-slot
    pub slot: i32,
    /// Version number, never `0` once handed out
    pub version: u32,
}

impl VarVersion {
    /// Creates a pair.
    #[must_use]
    pub const fn new(slot: i32, version: u32) -> Self {
        VarVersion { slot, version }
    }
}

impl fmt::Display for VarVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.slot, self.version)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_version(index: usize) -> u32 {
    index as u32
}

/// Versions of each variable slot that may reach a program point.
///
/// A slot is either absent or maps to a non-empty set; removing the last
/// version of a slot removes the slot. Equality is therefore plain set equality.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VersionMap {
    slots: BTreeMap<i32, BitSet>,
}

impl VersionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        VersionMap {
            slots: BTreeMap::new(),
        }
    }

    /// Returns `true` if no slot has a version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots with at least one version.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Version set of `slot`, `None` if the slot is absent.
    #[must_use]
    pub fn get(&self, slot: i32) -> Option<&BitSet> {
        self.slots.get(&slot)
    }

    /// Returns `true` if `version` of `slot` is in the map.
    #[must_use]
    pub fn contains(&self, slot: i32, version: u32) -> bool {
        self.slots
            .get(&slot)
            .is_some_and(|set| set.contains(version as usize))
    }

    /// Versions of `slot` in ascending order.
    #[must_use]
    pub fn versions(&self, slot: i32) -> Vec<u32> {
        self.slots
            .get(&slot)
            .map(|set| set.iter().map(to_version).collect())
            .unwrap_or_default()
    }

    /// The version of `slot` if exactly one reaches.
    #[must_use]
    pub fn single(&self, slot: i32) -> Option<u32> {
        let set = self.slots.get(&slot)?;
        if set.count() == 1 {
            set.first().map(to_version)
        } else {
            None
        }
    }

    /// Makes `version` the only version of `slot`.
    pub fn set_current(&mut self, slot: i32, version: u32) {
        self.slots.insert(slot, BitSet::singleton(version as usize));
    }

    /// Adds `version` to the versions of `slot`.
    pub fn insert(&mut self, slot: i32, version: u32) {
        self.slots.entry(slot).or_default().insert(version as usize);
    }

    /// Removes `version` from `slot`, dropping the slot if it becomes empty.
    pub fn remove(&mut self, slot: i32, version: u32) {
        if let Some(set) = self.slots.get_mut(&slot) {
            set.remove(version as usize);
            if set.is_empty() {
                self.slots.remove(&slot);
            }
        }
    }

    /// Per-slot union.
    pub fn union_with(&mut self, other: &VersionMap) {
        for (slot, set) in &other.slots {
            self.slots.entry(*slot).or_default().union_with(set);
        }
    }

    /// Per-slot difference. Slots missing from `other` are untouched.
    pub fn complement(&mut self, other: &VersionMap) {
        for (slot, set) in &other.slots {
            if let Some(own) = self.slots.get_mut(slot) {
                own.difference_with(set);
                if own.is_empty() {
                    self.slots.remove(slot);
                }
            }
        }
    }

    /// Per-slot intersection. Slots missing from either side are dropped.
    pub fn intersect_with(&mut self, other: &VersionMap) {
        self.slots.retain(|slot, own| match other.slots.get(slot) {
            Some(set) => {
                own.intersect_with(set);
                !own.is_empty()
            }
            None => false,
        });
    }

    /// Drops every field pseudo-slot.
    pub fn remove_fields(&mut self) {
        self.slots.retain(|slot, _| *slot >= 0);
    }

    /// Slots and their version sets, ascending by slot.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &BitSet)> {
        self.slots.iter().map(|(slot, set)| (*slot, set))
    }

    /// All `(slot, version)` pairs, ascending.
    pub fn pairs(&self) -> impl Iterator<Item = VarVersion> + '_ {
        self.slots.iter().flat_map(|(slot, set)| {
            set.iter()
                .map(move |version| VarVersion::new(*slot, to_version(version)))
        })
    }
}

impl FromIterator<VarVersion> for VersionMap {
    fn from_iter<I: IntoIterator<Item = VarVersion>>(iter: I) -> Self {
        let mut map = VersionMap::new();
        for pair in iter {
            map.insert(pair.slot, pair.version);
        }
        map
    }
}

impl fmt::Debug for VersionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slots.iter()).finish()
    }
}
