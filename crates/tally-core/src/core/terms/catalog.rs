use super::kind::InteractionKind;
use std::collections::HashMap;

/// Topology-derived presence counts per interaction kind.
///
/// The catalog answers "does this system contain any X" questions during term
/// selection; it carries no per-step values. Constraint and SETTLE counts are
/// tracked separately because they influence the layout (constraint rmsd slot)
/// without ever becoming reported terms themselves.
#[derive(Debug, Clone, Default)]
pub struct InteractionCatalog {
    counts: HashMap<InteractionKind, usize>,
    constraint_count: usize,
    settle_count: usize,
}

impl InteractionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&mut self, kind: InteractionKind, count: usize) {
        if count == 0 {
            self.counts.remove(&kind);
        } else {
            self.counts.insert(kind, count);
        }
    }

    pub fn with_count(mut self, kind: InteractionKind, count: usize) -> Self {
        self.set_count(kind, count);
        self
    }

    pub fn with_constraints(mut self, constraints: usize, settles: usize) -> Self {
        self.constraint_count = constraints;
        self.settle_count = settles;
        self
    }

    pub fn count(&self, kind: InteractionKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn contains(&self, kind: InteractionKind) -> bool {
        self.count(kind) > 0
    }

    /// Buckingham and Lennard-Jones force-field families are mutually
    /// exclusive; the topology decides which one this system uses.
    pub fn uses_buckingham(&self) -> bool {
        self.contains(InteractionKind::Buckingham)
    }

    pub fn has_one_four_pairs(&self) -> bool {
        self.contains(InteractionKind::LennardJones14) || self.contains(InteractionKind::Coulomb14)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_count
    }

    pub fn settle_count(&self) -> usize {
        self.settle_count
    }

    pub fn has_constraints(&self) -> bool {
        self.constraint_count > 0 || self.settle_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_default_to_zero() {
        let catalog = InteractionCatalog::new();
        assert_eq!(catalog.count(InteractionKind::Bond), 0);
        assert!(!catalog.contains(InteractionKind::Bond));
        assert!(!catalog.has_constraints());
    }

    #[test]
    fn with_count_round_trips() {
        let catalog = InteractionCatalog::new()
            .with_count(InteractionKind::Bond, 12)
            .with_count(InteractionKind::Angle, 7);
        assert_eq!(catalog.count(InteractionKind::Bond), 12);
        assert!(catalog.contains(InteractionKind::Angle));
    }

    #[test]
    fn setting_zero_clears_presence() {
        let mut catalog = InteractionCatalog::new().with_count(InteractionKind::Bond, 3);
        catalog.set_count(InteractionKind::Bond, 0);
        assert!(!catalog.contains(InteractionKind::Bond));
    }

    #[test]
    fn one_four_pairs_from_either_kind() {
        let lj = InteractionCatalog::new().with_count(InteractionKind::LennardJones14, 1);
        let coul = InteractionCatalog::new().with_count(InteractionKind::Coulomb14, 1);
        assert!(lj.has_one_four_pairs());
        assert!(coul.has_one_four_pairs());
    }

    #[test]
    fn settles_count_as_constraints() {
        let catalog = InteractionCatalog::new().with_constraints(0, 4);
        assert!(catalog.has_constraints());
        assert_eq!(catalog.constraint_count(), 0);
    }
}
