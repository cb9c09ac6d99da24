use crate::core::terms::kind::InteractionKind;
use crate::engine::config::FepConfig;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// An alchemical coupling component with its own derivative column.
///
/// Declaration order is the canonical column order for dH/dλ output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LambdaComponent {
    Coupling,
    Mass,
    Coulomb,
    VanDerWaals,
    Bonded,
    Restraint,
}

impl LambdaComponent {
    pub const COUNT: usize = 6;

    pub const ALL: [LambdaComponent; Self::COUNT] = [
        LambdaComponent::Coupling,
        LambdaComponent::Mass,
        LambdaComponent::Coulomb,
        LambdaComponent::VanDerWaals,
        LambdaComponent::Bonded,
        LambdaComponent::Restraint,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LambdaComponent::Coupling => "coupling",
            LambdaComponent::Mass => "mass",
            LambdaComponent::Coulomb => "coul",
            LambdaComponent::VanDerWaals => "vdw",
            LambdaComponent::Bonded => "bonded",
            LambdaComponent::Restraint => "restraint",
        }
    }

    /// The energy term that carries this component's dH/dλ value.
    pub fn derivative_kind(&self) -> InteractionKind {
        match self {
            LambdaComponent::Coupling => InteractionKind::DvdlCoupling,
            LambdaComponent::Mass => InteractionKind::DvdlMass,
            LambdaComponent::Coulomb => InteractionKind::DvdlCoulomb,
            LambdaComponent::VanDerWaals => InteractionKind::DvdlVanDerWaals,
            LambdaComponent::Bonded => InteractionKind::DvdlBonded,
            LambdaComponent::Restraint => InteractionKind::DvdlRestraint,
        }
    }
}

/// The discretized alchemical path: an ordered list of lambda states, each a
/// vector over the active components, with a mutable current index (expanded
/// ensemble) and an optional simulated-tempering temperature ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaPath {
    components: Vec<LambdaComponent>,
    states: Vec<Vec<f64>>,
    current: usize,
    foreign_start: usize,
    foreign_stop: usize,
    temperatures: Option<Vec<f64>>,
}

impl LambdaPath {
    /// Builds the path from an already-validated free-energy configuration.
    pub(crate) fn from_config(fep: &FepConfig) -> Self {
        Self {
            components: fep.components.clone(),
            states: fep.states.clone(),
            current: fep.initial_state,
            foreign_start: fep.foreign_window.start,
            foreign_stop: fep.foreign_window.stop,
            temperatures: fep.tempering_temperatures.clone(),
        }
    }

    pub fn components(&self) -> &[LambdaComponent] {
        &self.components
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> &[f64] {
        &self.states[index]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Moves the current state; only the expanded-ensemble sampler does this
    /// during a run.
    pub fn set_current_index(&mut self, index: usize) {
        assert!(
            index < self.states.len().max(1),
            "lambda state index {index} out of range ({} states)",
            self.states.len()
        );
        self.current = index;
    }

    /// Half-open window of foreign states tracked for ΔH output.
    pub fn foreign_window(&self) -> Range<usize> {
        self.foreign_start..self.foreign_stop
    }

    pub fn foreign_count(&self) -> usize {
        self.foreign_stop - self.foreign_start
    }

    pub fn is_tempered(&self) -> bool {
        self.temperatures.is_some()
    }

    pub fn temperature(&self, index: usize) -> Option<f64> {
        self.temperatures.as_ref().map(|ladder| ladder[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{FepConfig, ForeignWindow};

    fn single_component_path() -> LambdaPath {
        let fep = FepConfig {
            components: vec![LambdaComponent::Coupling],
            states: vec![vec![0.0], vec![0.5], vec![1.0]],
            initial_state: 1,
            foreign_window: ForeignWindow { start: 0, stop: 3 },
            ..FepConfig::default()
        };
        LambdaPath::from_config(&fep)
    }

    #[test]
    fn from_config_carries_states_and_window() {
        let path = single_component_path();
        assert_eq!(path.state_count(), 3);
        assert_eq!(path.current_index(), 1);
        assert_eq!(path.state(2), &[1.0]);
        assert_eq!(path.foreign_window(), 0..3);
        assert_eq!(path.foreign_count(), 3);
        assert!(!path.is_tempered());
    }

    #[test]
    fn set_current_index_moves_the_state() {
        let mut path = single_component_path();
        path.set_current_index(2);
        assert_eq!(path.current_index(), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_current_index_rejects_out_of_range() {
        let mut path = single_component_path();
        path.set_current_index(3);
    }

    #[test]
    fn derivative_kinds_follow_component_order() {
        assert_eq!(
            LambdaComponent::Coupling.derivative_kind(),
            InteractionKind::DvdlCoupling
        );
        assert_eq!(
            LambdaComponent::Restraint.derivative_kind(),
            InteractionKind::DvdlRestraint
        );
    }
}
