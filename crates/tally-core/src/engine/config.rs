use super::fep::lambda::LambdaComponent;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("At least one energy group must be configured")]
    NoEnergyGroups,

    #[error("Duplicate lambda component: {0:?}")]
    DuplicateLambdaComponent(LambdaComponent),

    #[error("Lambda state {index} has {found} components, expected {expected}")]
    LambdaStateShape {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("Initial lambda state {index} is out of range ({count} states)")]
    InitialStateOutOfRange { index: usize, count: usize },

    #[error("Foreign-lambda window {start}..{stop} exceeds the path length {count}")]
    ForeignWindowOutOfRange {
        start: usize,
        stop: usize,
        count: usize,
    },

    #[error("Tempering ladder has {found} temperatures, expected {expected}")]
    TemperingLadderLength { found: usize, expected: usize },

    #[error("Histogram spacing must be positive, got {0}")]
    HistogramSpacing(f64),
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnsembleKind {
    #[default]
    MolecularDynamics,
    StochasticDynamics,
    Minimization,
}

impl EnsembleKind {
    pub fn is_dynamical(&self) -> bool {
        !matches!(self, EnsembleKind::Minimization)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThermostatKind {
    #[default]
    None,
    Berendsen,
    VRescale,
    NoseHoover,
}

impl ThermostatKind {
    /// Whether the coupling scheme admits a conserved energy quantity.
    pub fn conserves_energy(&self) -> bool {
        !matches!(self, ThermostatKind::Berendsen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarostatKind {
    #[default]
    None,
    Berendsen,
    ParrinelloRahman,
    Mttk,
}

impl BarostatKind {
    pub fn conserves_energy(&self) -> bool {
        !matches!(self, BarostatKind::Berendsen)
    }

    /// Integrators with box equations of motion report box velocities.
    pub fn reports_box_velocities(&self) -> bool {
        matches!(self, BarostatKind::ParrinelloRahman | BarostatKind::Mttk)
    }

    pub fn has_chain(&self) -> bool {
        matches!(self, BarostatKind::Mttk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElectrostaticsKind {
    #[default]
    CutOff,
    ReactionField,
    Ewald,
    Pme,
}

impl ElectrostaticsKind {
    pub fn is_full_range(&self) -> bool {
        matches!(self, ElectrostaticsKind::Ewald | ElectrostaticsKind::Pme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispersionKind {
    #[default]
    CutOff,
    Pme,
}

impl DispersionKind {
    pub fn is_full_range(&self) -> bool {
        matches!(self, DispersionKind::Pme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintAlgorithm {
    #[default]
    Lincs,
    Shake,
}

impl ConstraintAlgorithm {
    pub fn reports_rmsd(&self) -> bool {
        matches!(self, ConstraintAlgorithm::Lincs)
    }
}

/// Reference pressure of the barostat. Only a diagonal (isotropic) reference
/// admits the pV and enthalpy slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferencePressure {
    Isotropic { bar: f64 },
    Anisotropic { tensor: [[f64; 3]; 3] },
}

impl ReferencePressure {
    pub fn is_isotropic(&self) -> bool {
        matches!(self, ReferencePressure::Isotropic { .. })
    }

    /// Mean of the diagonal, used for the pV term.
    pub fn diagonal_mean_bar(&self) -> f64 {
        match self {
            ReferencePressure::Isotropic { bar } => *bar,
            ReferencePressure::Anisotropic { tensor } => {
                (tensor[0][0] + tensor[1][1] + tensor[2][2]) / 3.0
            }
        }
    }
}

impl Default for ReferencePressure {
    fn default() -> Self {
        ReferencePressure::Isotropic { bar: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    pub thermostat: ThermostatKind,
    pub barostat: BarostatKind,
    /// Nose-Hoover chain length; 1 means an un-chained thermostat.
    pub chain_length: usize,
    pub print_chain_variables: bool,
    pub reference_pressure: ReferencePressure,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            thermostat: ThermostatKind::None,
            barostat: BarostatKind::None,
            chain_length: 1,
            print_chain_variables: false,
            reference_pressure: ReferencePressure::default(),
        }
    }
}

impl CouplingConfig {
    pub fn chained_thermostat(&self) -> bool {
        self.thermostat == ThermostatKind::NoseHoover && self.chain_length > 1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxConfig {
    pub dynamic: bool,
    pub triclinic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub energy_groups: Vec<String>,
    pub temperature_groups: Vec<String>,
    pub acceleration_groups: Vec<String>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            energy_groups: vec!["System".to_string()],
            temperature_groups: vec!["System".to_string()],
            acceleration_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservableConfig {
    pub dipole: bool,
    /// Cosine acceleration amplitude, nm ps^-2; zero disables the viscous
    /// response slots.
    pub cosine_acceleration: f64,
    pub quantum_region: bool,
    pub pulling: bool,
    pub dispersion_correction: bool,
    pub constraint_virial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceEnergyKind {
    #[default]
    None,
    Potential,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignWindow {
    pub start: usize,
    pub stop: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    pub spacing: f64,
    pub max_bins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FepConfig {
    /// Active derivative components, in output order.
    pub components: Vec<LambdaComponent>,
    /// Lambda states along the path; each vector runs over `components`.
    /// Empty means derivative-only sampling at the native lambda.
    pub states: Vec<Vec<f64>>,
    pub initial_state: usize,
    /// A fixed native coupling value; set when the run never evaluates
    /// foreign states on its own behalf (legacy single-lambda output).
    pub pinned_lambda: Option<f64>,
    /// Half-open range of path states tracked for ΔH output.
    pub foreign_window: ForeignWindow,
    pub derivatives: bool,
    pub reference_energy: ReferenceEnergyKind,
    pub expanded_ensemble: bool,
    /// Simulated-tempering temperature ladder, one entry per path state.
    pub tempering_temperatures: Option<Vec<f64>>,
    /// Compress flushed samples into fixed-width histograms.
    pub histogram: Option<HistogramConfig>,
}

impl Default for FepConfig {
    fn default() -> Self {
        Self {
            components: vec![LambdaComponent::Coupling],
            states: Vec::new(),
            initial_state: 0,
            pinned_lambda: None,
            foreign_window: ForeignWindow::default(),
            derivatives: true,
            reference_energy: ReferenceEnergyKind::None,
            expanded_ensemble: false,
            tempering_temperatures: None,
            histogram: None,
        }
    }
}

impl FepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, component) in self.components.iter().enumerate() {
            if self.components[..i].contains(component) {
                return Err(ConfigError::DuplicateLambdaComponent(*component));
            }
        }
        for (index, state) in self.states.iter().enumerate() {
            if state.len() != self.components.len() {
                return Err(ConfigError::LambdaStateShape {
                    index,
                    found: state.len(),
                    expected: self.components.len(),
                });
            }
        }
        if !self.states.is_empty() && self.initial_state >= self.states.len() {
            return Err(ConfigError::InitialStateOutOfRange {
                index: self.initial_state,
                count: self.states.len(),
            });
        }
        if self.foreign_window.start > self.foreign_window.stop
            || self.foreign_window.stop > self.states.len()
        {
            return Err(ConfigError::ForeignWindowOutOfRange {
                start: self.foreign_window.start,
                stop: self.foreign_window.stop,
                count: self.states.len(),
            });
        }
        if let Some(ladder) = &self.tempering_temperatures {
            if ladder.len() != self.states.len() {
                return Err(ConfigError::TemperingLadderLength {
                    found: ladder.len(),
                    expected: self.states.len(),
                });
            }
        }
        if let Some(histogram) = &self.histogram {
            if histogram.spacing <= 0.0 {
                return Err(ConfigError::HistogramSpacing(histogram.spacing));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub ensemble: EnsembleKind,
    pub time_step_ps: f64,
    /// Reprocessing previously generated trajectory frames: kinetic,
    /// pressure, and coupling quantities are meaningless and stay
    /// unregistered.
    pub reprocessing: bool,
    pub electrostatics: ElectrostaticsKind,
    pub dispersion: DispersionKind,
    pub constraint_algorithm: ConstraintAlgorithm,
    pub coupling: CouplingConfig,
    pub cell: BoxConfig,
    pub groups: GroupConfig,
    pub observables: ObservableConfig,
    pub free_energy: Option<FepConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ensemble: EnsembleKind::default(),
            time_step_ps: 0.001,
            reprocessing: false,
            electrostatics: ElectrostaticsKind::default(),
            dispersion: DispersionKind::default(),
            constraint_algorithm: ConstraintAlgorithm::default(),
            coupling: CouplingConfig::default(),
            cell: BoxConfig::default(),
            groups: GroupConfig::default(),
            observables: ObservableConfig::default(),
            free_energy: None,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: RunConfig = toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.energy_groups.is_empty() {
            return Err(ConfigError::NoEnergyGroups);
        }
        if let Some(fep) = &self.free_energy {
            fep.validate()?;
        }
        Ok(())
    }

    pub fn has_conserved_quantity(&self) -> bool {
        self.ensemble.is_dynamical()
            && self.coupling.thermostat.conserves_energy()
            && self.coupling.barostat.conserves_energy()
    }
}

#[derive(Default)]
pub struct RunConfigBuilder {
    ensemble: Option<EnsembleKind>,
    time_step_ps: Option<f64>,
    reprocessing: Option<bool>,
    electrostatics: Option<ElectrostaticsKind>,
    dispersion: Option<DispersionKind>,
    constraint_algorithm: Option<ConstraintAlgorithm>,
    coupling: Option<CouplingConfig>,
    cell: Option<BoxConfig>,
    energy_groups: Option<Vec<String>>,
    temperature_groups: Option<Vec<String>>,
    acceleration_groups: Option<Vec<String>>,
    observables: Option<ObservableConfig>,
    free_energy: Option<FepConfig>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensemble(mut self, kind: EnsembleKind) -> Self {
        self.ensemble = Some(kind);
        self
    }
    pub fn time_step_ps(mut self, dt: f64) -> Self {
        self.time_step_ps = Some(dt);
        self
    }
    pub fn reprocessing(mut self, rerun: bool) -> Self {
        self.reprocessing = Some(rerun);
        self
    }
    pub fn electrostatics(mut self, kind: ElectrostaticsKind) -> Self {
        self.electrostatics = Some(kind);
        self
    }
    pub fn dispersion(mut self, kind: DispersionKind) -> Self {
        self.dispersion = Some(kind);
        self
    }
    pub fn constraint_algorithm(mut self, algorithm: ConstraintAlgorithm) -> Self {
        self.constraint_algorithm = Some(algorithm);
        self
    }
    pub fn coupling(mut self, coupling: CouplingConfig) -> Self {
        self.coupling = Some(coupling);
        self
    }
    pub fn cell(mut self, cell: BoxConfig) -> Self {
        self.cell = Some(cell);
        self
    }
    pub fn energy_groups<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.energy_groups = Some(names.into_iter().map(Into::into).collect());
        self
    }
    pub fn temperature_groups<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.temperature_groups = Some(names.into_iter().map(Into::into).collect());
        self
    }
    pub fn acceleration_groups<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.acceleration_groups = Some(names.into_iter().map(Into::into).collect());
        self
    }
    pub fn observables(mut self, observables: ObservableConfig) -> Self {
        self.observables = Some(observables);
        self
    }
    pub fn free_energy(mut self, fep: FepConfig) -> Self {
        self.free_energy = Some(fep);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let config = RunConfig {
            ensemble: self.ensemble.unwrap_or_default(),
            time_step_ps: self
                .time_step_ps
                .ok_or(ConfigError::MissingParameter("time_step_ps"))?,
            reprocessing: self.reprocessing.unwrap_or(false),
            electrostatics: self.electrostatics.unwrap_or_default(),
            dispersion: self.dispersion.unwrap_or_default(),
            constraint_algorithm: self.constraint_algorithm.unwrap_or_default(),
            coupling: self.coupling.unwrap_or_default(),
            cell: self.cell.unwrap_or_default(),
            groups: GroupConfig {
                energy_groups: self
                    .energy_groups
                    .ok_or(ConfigError::MissingParameter("energy_groups"))?,
                temperature_groups: self
                    .temperature_groups
                    .ok_or(ConfigError::MissingParameter("temperature_groups"))?,
                acceleration_groups: self.acceleration_groups.unwrap_or_default(),
            },
            observables: self.observables.unwrap_or_default(),
            free_energy: self.free_energy,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn minimal_builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
            .time_step_ps(0.002)
            .energy_groups(["System"])
            .temperature_groups(["System"])
    }

    #[test]
    fn build_fails_without_time_step() {
        let err = RunConfigBuilder::new()
            .energy_groups(["System"])
            .temperature_groups(["System"])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("time_step_ps"));
    }

    #[test]
    fn build_fails_without_groups() {
        let err = RunConfigBuilder::new().time_step_ps(0.002).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("energy_groups"));
    }

    #[test]
    fn build_applies_defaults() {
        let config = minimal_builder().build().unwrap();
        assert_eq!(config.ensemble, EnsembleKind::MolecularDynamics);
        assert_eq!(config.coupling.thermostat, ThermostatKind::None);
        assert!(config.free_energy.is_none());
        assert!(config.has_conserved_quantity());
    }

    #[test]
    fn berendsen_coupling_loses_the_conserved_quantity() {
        let config = minimal_builder()
            .coupling(CouplingConfig {
                thermostat: ThermostatKind::Berendsen,
                ..CouplingConfig::default()
            })
            .build()
            .unwrap();
        assert!(!config.has_conserved_quantity());
    }

    #[test]
    fn fep_validation_rejects_ragged_states() {
        let err = minimal_builder()
            .free_energy(FepConfig {
                components: vec![LambdaComponent::Coulomb, LambdaComponent::VanDerWaals],
                states: vec![vec![0.0, 0.0], vec![1.0]],
                ..FepConfig::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::LambdaStateShape {
                index: 1,
                found: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn fep_validation_rejects_bad_window() {
        let err = minimal_builder()
            .free_energy(FepConfig {
                states: vec![vec![0.0], vec![1.0]],
                foreign_window: ForeignWindow { start: 0, stop: 3 },
                ..FepConfig::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ForeignWindowOutOfRange {
                start: 0,
                stop: 3,
                count: 2
            }
        );
    }

    #[test]
    fn fep_validation_rejects_short_tempering_ladder() {
        let err = minimal_builder()
            .free_energy(FepConfig {
                states: vec![vec![0.0], vec![1.0]],
                tempering_temperatures: Some(vec![300.0]),
                ..FepConfig::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TemperingLadderLength {
                found: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn load_reads_a_toml_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
            time_step_ps = 0.002
            electrostatics = "pme"

            [coupling]
            thermostat = "v-rescale"
            barostat = "parrinello-rahman"

            [cell]
            dynamic = true

            [groups]
            energy_groups = ["Protein", "Solvent"]
            temperature_groups = ["System"]

            [free_energy]
            components = ["coulomb", "van-der-waals"]
            states = [[0.0, 0.0], [0.5, 0.0], [1.0, 1.0]]
            initial_state = 0
            foreign_window = { start = 0, stop = 3 }
            "#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.electrostatics, ElectrostaticsKind::Pme);
        assert_eq!(config.coupling.thermostat, ThermostatKind::VRescale);
        assert_eq!(config.groups.energy_groups.len(), 2);
        let fep = config.free_energy.unwrap();
        assert_eq!(fep.states.len(), 3);
        assert_eq!(
            fep.components,
            vec![LambdaComponent::Coulomb, LambdaComponent::VanDerWaals]
        );
    }

    #[test]
    fn load_surfaces_missing_file_as_io_error() {
        let err = RunConfig::load(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io { .. }));
    }

    #[test]
    fn load_surfaces_bad_toml_as_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "time_step_ps = [not toml").unwrap();
        let err = RunConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Toml { .. }));
    }
}
