//! Sets of modes as bitmasks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ModeType;

/// A set of modes, one bit per [`ModeType`].
///
/// Membership, subset and union are single integer operations, which keeps
/// result-cache compatibility checks cheap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeTypeGroup(u16);

impl ModeTypeGroup {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every mode including `Tunnel`.
    pub const fn all() -> Self {
        Self(0xFF)
    }

    /// Every mode that produces in-region moves.
    pub const fn movement() -> Self {
        Self(0xFF & !ModeType::Tunnel.bit())
    }

    /// Builds a group from a slice of modes.
    pub fn of(modes: &[ModeType]) -> Self {
        modes.iter().copied().collect()
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, mode: ModeType) -> bool {
        self.0 & mode.bit() != 0
    }

    /// Returns a copy with `mode` added.
    pub const fn with(self, mode: ModeType) -> Self {
        Self(self.0 | mode.bit())
    }

    /// Returns a copy with `mode` removed.
    pub const fn without(self, mode: ModeType) -> Self {
        Self(self.0 & !mode.bit())
    }

    pub fn insert(&mut self, mode: ModeType) {
        self.0 |= mode.bit();
    }

    pub fn remove(&mut self, mode: ModeType) {
        self.0 &= !mode.bit();
    }

    /// Returns true if every mode in `self` is also in `other`.
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the members in bit order.
    pub fn iter(self) -> impl Iterator<Item = ModeType> {
        ModeType::ALL.into_iter().filter(move |m| self.contains(*m))
    }

    /// Returns true if at least one member produces in-region moves.
    pub fn has_movement(self) -> bool {
        self.iter().any(ModeType::generates_moves)
    }
}

impl FromIterator<ModeType> for ModeTypeGroup {
    fn from_iter<I: IntoIterator<Item = ModeType>>(iter: I) -> Self {
        let mut group = Self::empty();
        for mode in iter {
            group.insert(mode);
        }
        group
    }
}

impl fmt::Debug for ModeTypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ModeTypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(ModeType::name).collect();
        write!(f, "{{{}}}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let group = ModeTypeGroup::of(&[ModeType::Walk, ModeType::Swim]);
        assert!(group.contains(ModeType::Walk));
        assert!(group.contains(ModeType::Swim));
        assert!(!group.contains(ModeType::Dig));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn subset() {
        let narrow = ModeTypeGroup::of(&[ModeType::Walk]);
        let broad = ModeTypeGroup::of(&[ModeType::Walk, ModeType::Jump]);
        assert!(narrow.is_subset_of(broad));
        assert!(!broad.is_subset_of(narrow));
        assert!(ModeTypeGroup::empty().is_subset_of(narrow));
        assert!(broad.is_subset_of(broad));
    }

    #[test]
    fn movement_excludes_tunnel() {
        let movement = ModeTypeGroup::movement();
        assert!(!movement.contains(ModeType::Tunnel));
        assert_eq!(movement.len(), 7);
        assert!(movement.has_movement());
        assert!(!ModeTypeGroup::of(&[ModeType::Tunnel]).has_movement());
    }

    #[test]
    fn with_and_without() {
        let group = ModeTypeGroup::empty().with(ModeType::Dig);
        assert!(group.contains(ModeType::Dig));
        assert!(group.without(ModeType::Dig).is_empty());
    }

    #[test]
    fn display_lists_names() {
        let group = ModeTypeGroup::of(&[ModeType::Jump, ModeType::Walk]);
        assert_eq!(group.to_string(), "{walk,jump}");
    }
}
