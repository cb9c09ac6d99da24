use crate::core::terms::kind::{InteractionKind, NonBondedKind};
use crate::engine::report::RestraintDiagnostics;
use nalgebra::{Matrix3, Vector3};

/// Per-kind energy values for one step, indexed by [`InteractionKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyVector {
    values: [f64; InteractionKind::COUNT],
}

impl Default for EnergyVector {
    fn default() -> Self {
        Self {
            values: [0.0; InteractionKind::COUNT],
        }
    }
}

impl EnergyVector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, kind: InteractionKind) -> f64 {
        self.values[kind.index()]
    }

    #[inline]
    pub fn set(&mut self, kind: InteractionKind, value: f64) {
        self.values[kind.index()] = value;
    }

    pub fn with(mut self, kind: InteractionKind, value: f64) -> Self {
        self.set(kind, value);
        self
    }
}

/// Non-bonded interaction energies per energy-group pair, upper-triangular
/// row-major: pair (i, j) with i <= j.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupPairEnergies {
    n_groups: usize,
    values: Vec<[f64; NonBondedKind::COUNT]>,
}

impl GroupPairEnergies {
    pub fn new(n_groups: usize) -> Self {
        Self {
            n_groups,
            values: vec![[0.0; NonBondedKind::COUNT]; n_groups * (n_groups + 1) / 2],
        }
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    pub fn pair_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn pair_index(&self, i: usize, j: usize) -> usize {
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        assert!(
            b < self.n_groups,
            "energy group index {b} out of range ({} groups)",
            self.n_groups
        );
        a * self.n_groups - a * (a + 1) / 2 + b
    }

    pub fn set(&mut self, i: usize, j: usize, kind: NonBondedKind, value: f64) {
        let pair = self.pair_index(i, j);
        self.values[pair][kind.index()] = value;
    }

    pub fn get(&self, i: usize, j: usize, kind: NonBondedKind) -> f64 {
        self.values[self.pair_index(i, j)][kind.index()]
    }
}

/// Per-temperature-group data for one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureGroupInput {
    pub temperature: f64,
    /// Velocity-scaling factor of weak-coupling thermostats.
    pub scaling: f64,
}

/// Thermostat (and MTTK barostat) chain variables, flattened as
/// `group * chain_length + link`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainVariables {
    pub xi: Vec<f64>,
    pub v_xi: Vec<f64>,
    pub barostat_xi: Vec<f64>,
    pub barostat_v_xi: Vec<f64>,
}

/// Raw per-step physical inputs, already globally reduced across any
/// distributed decomposition. The engine trusts these values; it performs no
/// physical-plausibility checking.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInputs {
    pub time: f64,
    /// Total system mass, u.
    pub total_mass: f64,
    pub energies: EnergyVector,
    pub group_pairs: GroupPairEnergies,
    /// Box matrix, nm. Row-major with diagonal lengths on the diagonal.
    pub cell: Matrix3<f64>,
    pub cell_velocities: Matrix3<f64>,
    pub virial: Matrix3<f64>,
    /// Pressure tensor, bar.
    pub pressure: Matrix3<f64>,
    pub constraint_virial: Matrix3<f64>,
    pub force_virial: Matrix3<f64>,
    /// Total dipole moment, D.
    pub dipole: Vector3<f64>,
    pub constraint_rmsd: f64,
    pub temperature_groups: Vec<TemperatureGroupInput>,
    pub chains: ChainVariables,
    /// Mean velocity per acceleration group, nm/ps.
    pub group_velocities: Vec<Vector3<f64>>,
    /// Amplitude of the cosine-profile velocity response, nm/ps.
    pub profile_velocity: f64,
    /// Potential energy evaluated at every lambda-path state, current state
    /// included. Empty when the step carries no foreign-lambda data.
    pub lambda_energies: Vec<f64>,
    pub restraint_diagnostics: Option<RestraintDiagnostics>,
}

impl Default for StepInputs {
    fn default() -> Self {
        Self {
            time: 0.0,
            total_mass: 0.0,
            energies: EnergyVector::default(),
            group_pairs: GroupPairEnergies::default(),
            cell: Matrix3::zeros(),
            cell_velocities: Matrix3::zeros(),
            virial: Matrix3::zeros(),
            pressure: Matrix3::zeros(),
            constraint_virial: Matrix3::zeros(),
            force_virial: Matrix3::zeros(),
            dipole: Vector3::zeros(),
            constraint_rmsd: 0.0,
            temperature_groups: Vec::new(),
            chains: ChainVariables::default(),
            group_velocities: Vec::new(),
            profile_velocity: 0.0,
            lambda_energies: Vec::new(),
            restraint_diagnostics: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_vector_round_trips_by_kind() {
        let mut energies = EnergyVector::new();
        energies.set(InteractionKind::Potential, -512.25);
        assert_eq!(energies.get(InteractionKind::Potential), -512.25);
        assert_eq!(energies.get(InteractionKind::KineticEnergy), 0.0);
    }

    #[test]
    fn pair_index_covers_the_upper_triangle() {
        let mut pairs = GroupPairEnergies::new(3);
        assert_eq!(pairs.pair_count(), 6);
        pairs.set(0, 2, NonBondedKind::CoulombShortRange, 1.5);
        pairs.set(2, 2, NonBondedKind::CoulombShortRange, -4.0);
        assert_eq!(pairs.get(2, 0, NonBondedKind::CoulombShortRange), 1.5);
        assert_eq!(pairs.get(2, 2, NonBondedKind::CoulombShortRange), -4.0);
        assert_eq!(pairs.get(1, 1, NonBondedKind::CoulombShortRange), 0.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn pair_index_rejects_unknown_groups() {
        let pairs = GroupPairEnergies::new(2);
        pairs.get(0, 2, NonBondedKind::CoulombShortRange);
    }
}
