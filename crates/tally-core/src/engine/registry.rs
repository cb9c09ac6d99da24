use crate::core::stats::bin::{BlockHandle, StatBin};
use crate::core::terms::catalog::InteractionCatalog;
use crate::core::terms::kind::{InteractionKind, NonBondedKind};
use crate::core::units::Unit;
use crate::engine::config::{RunConfig, ThermostatKind};
use itertools::Itertools;
use tracing::info;

const BOX_NAMES: [&str; 3] = ["Box-X", "Box-Y", "Box-Z"];

const TRICLINIC_BOX_NAMES: [&str; 6] = [
    "Box-XX", "Box-YY", "Box-ZZ", "Box-YX", "Box-ZX", "Box-ZY",
];

const BOX_VELOCITY_NAMES: [&str; 6] = [
    "Box-Vel-XX",
    "Box-Vel-YY",
    "Box-Vel-ZZ",
    "Box-Vel-YX",
    "Box-Vel-ZX",
    "Box-Vel-ZY",
];

const TENSOR_SUFFIXES: [&str; 9] = ["XX", "XY", "XZ", "YX", "YY", "YZ", "ZX", "ZY", "ZZ"];

fn tensor_names(prefix: &str) -> Vec<String> {
    TENSOR_SUFFIXES
        .iter()
        .map(|suffix| format!("{prefix}-{suffix}"))
        .collect()
}

/// The immutable slot layout of a run.
///
/// Built exactly once at setup from the run configuration and the topology
/// catalog; every block the configuration enables gets a contiguous slot
/// range in a fixed registration order, so column positions are identical
/// across runs with the same configuration.
#[derive(Debug, Clone)]
pub struct TermRegistry {
    enabled: Vec<InteractionKind>,
    energy: BlockHandle,
    constraint_rmsd: Option<BlockHandle>,
    box_dimensions: Option<BlockHandle>,
    volume: Option<BlockHandle>,
    density: Option<BlockHandle>,
    pressure_volume: Option<BlockHandle>,
    enthalpy: Option<BlockHandle>,
    constraint_virial: Option<BlockHandle>,
    force_virial: Option<BlockHandle>,
    virial: Option<BlockHandle>,
    pressure_tensor: Option<BlockHandle>,
    surface_tension: Option<BlockHandle>,
    box_velocities: Option<BlockHandle>,
    dipole: Option<BlockHandle>,
    profile_velocity: Option<BlockHandle>,
    reciprocal_viscosity: Option<BlockHandle>,
    group_pairs: Vec<BlockHandle>,
    pair_kinds: Vec<NonBondedKind>,
    group_temperature: Option<BlockHandle>,
    coupling_variables: Option<BlockHandle>,
    barostat_chain: Option<BlockHandle>,
    group_velocity: Option<BlockHandle>,
    energy_group_names: Vec<String>,
    temperature_group_names: Vec<String>,
    acceleration_group_names: Vec<String>,
    chain_length: usize,
    chained_thermostat: bool,
    triclinic: bool,
}

impl TermRegistry {
    /// Derives the active term set and registers its slot layout into `bin`.
    pub fn build(config: &RunConfig, catalog: &InteractionCatalog, bin: &mut StatBin) -> Self {
        let rerun = config.reprocessing;
        let dynamical = config.ensemble.is_dynamical();
        let fep = config.free_energy.as_ref();

        let separated = |component| fep.is_some_and(|f| f.components.contains(&component));

        use crate::engine::fep::lambda::LambdaComponent;
        use InteractionKind as K;

        let mut enabled = Vec::new();
        for kind in InteractionKind::ALL {
            let active = match kind {
                K::LennardJones => !catalog.uses_buckingham(),
                K::Buckingham => catalog.uses_buckingham(),
                K::LennardJones14 | K::Coulomb14 => catalog.has_one_four_pairs(),
                K::CoulombShortRange | K::Potential => true,
                K::CoulombReciprocal => config.electrostatics.is_full_range(),
                K::LennardJonesReciprocal => config.dispersion.is_full_range(),
                K::DispersionCorrection => config.observables.dispersion_correction,
                K::PressureDispersionCorrection => {
                    config.observables.dispersion_correction && !rerun
                }
                K::QuantumEnergy => config.observables.quantum_region,
                K::PullPotential => config.observables.pulling,
                K::KineticEnergy | K::TotalEnergy | K::Temperature => dynamical && !rerun,
                K::Pressure => !rerun,
                K::ConservedEnergy => config.has_conserved_quantity() && !rerun,
                K::DistanceRestraintViolation => catalog.contains(K::DistanceRestraint),
                K::OrientationRestraintDeviation => catalog.contains(K::OrientationRestraint),
                K::DvdlCoupling => separated(LambdaComponent::Coupling),
                K::DvdlMass => separated(LambdaComponent::Mass),
                K::DvdlCoulomb => separated(LambdaComponent::Coulomb),
                K::DvdlVanDerWaals => separated(LambdaComponent::VanDerWaals),
                K::DvdlBonded => separated(LambdaComponent::Bonded),
                K::DvdlRestraint => separated(LambdaComponent::Restraint),
                _ => catalog.contains(kind),
            };
            if active {
                enabled.push(kind);
            }
        }

        let energy = bin.register_block_with_units(
            enabled
                .iter()
                .map(|kind| (kind.name().to_string(), kind.unit())),
        );

        let constraint_rmsd = (!rerun
            && catalog.constraint_count() > 0
            && config.constraint_algorithm.reports_rmsd())
        .then(|| bin.register_block(["Constr. rmsd"], Unit::Dimensionless));

        let triclinic = config.cell.triclinic;
        let isotropic_reference =
            config.coupling.reference_pressure.is_isotropic() && !rerun;

        let mut box_dimensions = None;
        let mut volume = None;
        let mut density = None;
        let mut pressure_volume = None;
        let mut enthalpy = None;
        if config.cell.dynamic {
            box_dimensions = Some(if triclinic {
                bin.register_block(TRICLINIC_BOX_NAMES, Unit::Nanometer)
            } else {
                bin.register_block(BOX_NAMES, Unit::Nanometer)
            });
            volume = Some(bin.register_block(["Volume"], Unit::CubicNanometer));
            density = Some(bin.register_block(["Density"], Unit::KilogramPerCubicMeter));
            if isotropic_reference {
                pressure_volume = Some(bin.register_block(["pV"], Unit::KiloJoulePerMole));
                enthalpy = Some(bin.register_block(["Enthalpy"], Unit::KiloJoulePerMole));
            }
        }

        let mut constraint_virial = None;
        let mut force_virial = None;
        if config.observables.constraint_virial {
            constraint_virial =
                Some(bin.register_block(tensor_names("Constr-Vir"), Unit::KiloJoulePerMole));
            force_virial =
                Some(bin.register_block(tensor_names("Force-Vir"), Unit::KiloJoulePerMole));
        }

        let mut virial = None;
        let mut pressure_tensor = None;
        let mut surface_tension = None;
        if !rerun {
            virial = Some(bin.register_block(tensor_names("Vir"), Unit::KiloJoulePerMole));
            pressure_tensor = Some(bin.register_block(tensor_names("Pres"), Unit::Bar));
            surface_tension = Some(bin.register_block(["Surf*SurfTen"], Unit::BarNanometer));
        }

        let box_velocities = config.coupling.barostat.reports_box_velocities().then(|| {
            let count = if triclinic { 6 } else { 3 };
            let names = &BOX_VELOCITY_NAMES[..count];
            bin.register_block(names.iter().copied(), Unit::NanometerPerPicosecond)
        });

        let dipole = config
            .observables
            .dipole
            .then(|| bin.register_block(["Mu-X", "Mu-Y", "Mu-Z"], Unit::Debye));

        let mut profile_velocity = None;
        let mut reciprocal_viscosity = None;
        if config.observables.cosine_acceleration != 0.0 {
            profile_velocity =
                Some(bin.register_block(["2CosZ*Vel-X"], Unit::NanometerPerPicosecond));
            reciprocal_viscosity =
                Some(bin.register_block(["1/Viscosity"], Unit::PerPascalSecond));
        }

        let pair_kinds: Vec<NonBondedKind> = NonBondedKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                NonBondedKind::CoulombShortRange => true,
                NonBondedKind::LennardJonesShortRange => !catalog.uses_buckingham(),
                NonBondedKind::BuckinghamShortRange => catalog.uses_buckingham(),
                NonBondedKind::Coulomb14 | NonBondedKind::LennardJones14 => {
                    catalog.has_one_four_pairs()
                }
            })
            .collect();

        let energy_group_names = config.groups.energy_groups.clone();
        let n_groups = energy_group_names.len();
        let mut group_pairs = Vec::new();
        if n_groups > 1 {
            for pair in (0..n_groups).combinations_with_replacement(2) {
                let (i, j) = (pair[0], pair[1]);
                let names = pair_kinds.iter().map(|kind| {
                    format!(
                        "{}:{}-{}",
                        kind.label(),
                        energy_group_names[i],
                        energy_group_names[j]
                    )
                });
                group_pairs.push(bin.register_block(names, Unit::KiloJoulePerMole));
            }
            assert_eq!(
                group_pairs.len(),
                n_groups * (n_groups + 1) / 2,
                "energy-group pair block count diverged from the configured layout"
            );
        }

        let temperature_group_names = if rerun {
            Vec::new()
        } else {
            config.groups.temperature_groups.clone()
        };
        let n_tc = temperature_group_names.len();
        let group_temperature = (n_tc > 0).then(|| {
            bin.register_block(
                temperature_group_names
                    .iter()
                    .map(|name| format!("T-{name}")),
                Unit::Kelvin,
            )
        });

        let chain_length = config.coupling.chain_length.max(1);
        let chained_thermostat = config.coupling.chained_thermostat();
        let mut coupling_variables = None;
        let mut barostat_chain = None;
        if n_tc > 0 {
            match config.coupling.thermostat {
                ThermostatKind::NoseHoover if config.coupling.print_chain_variables => {
                    if chained_thermostat {
                        let mut names = Vec::with_capacity(2 * chain_length * n_tc);
                        for name in &temperature_group_names {
                            for link in 0..chain_length {
                                names.push(format!("Xi-{link}-{name}"));
                                names.push(format!("vXi-{link}-{name}"));
                            }
                        }
                        coupling_variables =
                            Some(bin.register_block(names, Unit::PerPicosecond));
                        if config.coupling.barostat.has_chain() {
                            let mut names = Vec::with_capacity(2 * chain_length);
                            for link in 0..chain_length {
                                names.push(format!("Xi-{link}-Barostat"));
                                names.push(format!("vXi-{link}-Barostat"));
                            }
                            barostat_chain =
                                Some(bin.register_block(names, Unit::PerPicosecond));
                        }
                    } else {
                        let mut names = Vec::with_capacity(2 * n_tc);
                        for name in &temperature_group_names {
                            names.push(format!("Xi-{name}"));
                            names.push(format!("vXi-{name}"));
                        }
                        coupling_variables =
                            Some(bin.register_block(names, Unit::PerPicosecond));
                    }
                }
                ThermostatKind::Berendsen | ThermostatKind::VRescale => {
                    coupling_variables = Some(bin.register_block(
                        temperature_group_names
                            .iter()
                            .map(|name| format!("Lamb-{name}")),
                        Unit::Dimensionless,
                    ));
                }
                _ => {}
            }
        }

        let acceleration_group_names = config.groups.acceleration_groups.clone();
        let n_accel = acceleration_group_names.len();
        let group_velocity = (n_accel > 1).then(|| {
            let mut names = Vec::with_capacity(3 * n_accel);
            for name in &acceleration_group_names {
                names.push(format!("Ux-{name}"));
                names.push(format!("Uy-{name}"));
                names.push(format!("Uz-{name}"));
            }
            bin.register_block(names, Unit::NanometerPerPicosecond)
        });

        info!(
            slots = bin.len(),
            energy_terms = enabled.len(),
            group_pair_blocks = group_pairs.len(),
            "term registry built"
        );

        Self {
            enabled,
            energy,
            constraint_rmsd,
            box_dimensions,
            volume,
            density,
            pressure_volume,
            enthalpy,
            constraint_virial,
            force_virial,
            virial,
            pressure_tensor,
            surface_tension,
            box_velocities,
            dipole,
            profile_velocity,
            reciprocal_viscosity,
            group_pairs,
            pair_kinds,
            group_temperature,
            coupling_variables,
            barostat_chain,
            group_velocity,
            energy_group_names,
            temperature_group_names,
            acceleration_group_names,
            chain_length,
            chained_thermostat,
            triclinic,
        }
    }

    pub fn enabled_kinds(&self) -> &[InteractionKind] {
        &self.enabled
    }

    pub fn energy_block(&self) -> BlockHandle {
        self.energy
    }

    pub fn constraint_rmsd_block(&self) -> Option<BlockHandle> {
        self.constraint_rmsd
    }

    pub fn box_block(&self) -> Option<BlockHandle> {
        self.box_dimensions
    }

    pub fn volume_block(&self) -> Option<BlockHandle> {
        self.volume
    }

    pub fn density_block(&self) -> Option<BlockHandle> {
        self.density
    }

    pub fn pressure_volume_block(&self) -> Option<BlockHandle> {
        self.pressure_volume
    }

    pub fn enthalpy_block(&self) -> Option<BlockHandle> {
        self.enthalpy
    }

    pub fn constraint_virial_block(&self) -> Option<BlockHandle> {
        self.constraint_virial
    }

    pub fn force_virial_block(&self) -> Option<BlockHandle> {
        self.force_virial
    }

    pub fn virial_block(&self) -> Option<BlockHandle> {
        self.virial
    }

    pub fn pressure_block(&self) -> Option<BlockHandle> {
        self.pressure_tensor
    }

    pub fn surface_tension_block(&self) -> Option<BlockHandle> {
        self.surface_tension
    }

    pub fn box_velocity_block(&self) -> Option<BlockHandle> {
        self.box_velocities
    }

    pub fn dipole_block(&self) -> Option<BlockHandle> {
        self.dipole
    }

    pub fn profile_velocity_block(&self) -> Option<BlockHandle> {
        self.profile_velocity
    }

    pub fn reciprocal_viscosity_block(&self) -> Option<BlockHandle> {
        self.reciprocal_viscosity
    }

    pub fn group_pair_blocks(&self) -> &[BlockHandle] {
        &self.group_pairs
    }

    pub fn pair_kinds(&self) -> &[NonBondedKind] {
        &self.pair_kinds
    }

    pub fn temperature_block(&self) -> Option<BlockHandle> {
        self.group_temperature
    }

    pub fn coupling_block(&self) -> Option<BlockHandle> {
        self.coupling_variables
    }

    pub fn barostat_chain_block(&self) -> Option<BlockHandle> {
        self.barostat_chain
    }

    pub fn velocity_block(&self) -> Option<BlockHandle> {
        self.group_velocity
    }

    pub fn energy_group_names(&self) -> &[String] {
        &self.energy_group_names
    }

    pub fn temperature_group_names(&self) -> &[String] {
        &self.temperature_group_names
    }

    pub fn acceleration_group_names(&self) -> &[String] {
        &self.acceleration_group_names
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length
    }

    pub fn chained_thermostat(&self) -> bool {
        self.chained_thermostat
    }

    pub fn triclinic(&self) -> bool {
        self.triclinic
    }
}
