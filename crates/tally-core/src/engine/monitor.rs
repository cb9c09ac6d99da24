use super::config::{RunConfig, ThermostatKind};
use super::error::EngineError;
use super::fep::collector::{FepCollector, FepRestoreError};
use super::history::{ENERGY_HISTORY_FORMAT, EnergyHistory};
use super::inputs::StepInputs;
use super::registry::TermRegistry;
use super::report::{
    EnergyFrame, FrameBlock, GroupPairRow, GroupPairSummary, RestraintDiagnostics, SlotAverages,
    SlotRecord, Summary, SummaryReport, SummaryRow, SummaryTable,
};
use super::sink::EnergySink;
use crate::core::stats::bin::{BlockHandle, StatBin};
use crate::core::terms::catalog::InteractionCatalog;
use crate::core::terms::kind::InteractionKind;
use crate::core::units::constants::{AMU_KG, NANO, PICO, PRESSURE_FACTOR_BAR};
use nalgebra::Matrix3;
use std::f64::consts::TAU;
use tracing::{info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Emit one frame with live values and flush the free-energy collector.
    Current,
    /// Emit cumulative mean/fluctuation tables over the whole-run window.
    Average,
}

fn tensor_row_major(tensor: &Matrix3<f64>) -> [f64; 9] {
    [
        tensor[(0, 0)],
        tensor[(0, 1)],
        tensor[(0, 2)],
        tensor[(1, 0)],
        tensor[(1, 1)],
        tensor[(1, 2)],
        tensor[(2, 0)],
        tensor[(2, 1)],
        tensor[(2, 2)],
    ]
}

/// The per-step driver: accumulates raw terms, computes derived scalars,
/// feeds the free-energy collector, and emits frames and summaries through
/// the sink. Performs no I/O of its own.
#[derive(Debug)]
pub struct EnergyMonitor {
    config: RunConfig,
    registry: TermRegistry,
    bin: StatBin,
    collector: FepCollector,
    scratch: Vec<f64>,
    last_restraints: Option<RestraintDiagnostics>,
}

impl EnergyMonitor {
    pub fn new(config: &RunConfig, catalog: &InteractionCatalog) -> Result<Self, EngineError> {
        config.validate()?;
        let mut bin = StatBin::new();
        let registry = TermRegistry::build(config, catalog, &mut bin);
        let collector = FepCollector::from_config(config);
        let capacity = bin.len();
        info!(slots = capacity, "energy monitor initialized");
        Ok(Self {
            config: config.clone(),
            registry,
            bin,
            collector,
            scratch: Vec::with_capacity(capacity),
            last_restraints: None,
        })
    }

    pub fn registry(&self) -> &TermRegistry {
        &self.registry
    }

    pub fn bin(&self) -> &StatBin {
        &self.bin
    }

    pub fn collector(&self) -> &FepCollector {
        &self.collector
    }

    /// Expanded-ensemble state move, effective for all subsequent steps.
    pub fn set_lambda_state(&mut self, index: usize) {
        self.collector.set_current_state(index);
    }

    /// Accumulates one step of already-reduced physical inputs. With
    /// `include_in_sum` the values enter both statistics windows; with
    /// `collect_free_energy` the step also contributes one ΔH sample.
    pub fn record_step(
        &mut self,
        inputs: &StepInputs,
        include_in_sum: bool,
        collect_free_energy: bool,
    ) {
        let sum = include_in_sum;

        self.scratch.clear();
        for kind in self.registry.enabled_kinds() {
            self.scratch.push(inputs.energies.get(*kind));
        }
        self.bin
            .accumulate(self.registry.energy_block(), &self.scratch, sum);

        // The constraint rmsd is a diagnostic, never a time average.
        if let Some(block) = self.registry.constraint_rmsd_block() {
            self.bin.accumulate(block, &[inputs.constraint_rmsd], false);
        }

        let volume = inputs.cell[(0, 0)] * inputs.cell[(1, 1)] * inputs.cell[(2, 2)];
        let density = inputs.total_mass * AMU_KG / (volume * NANO * NANO * NANO);
        let mut pv = 0.0;

        if let Some(block) = self.registry.box_block() {
            if self.registry.triclinic() {
                let values = [
                    inputs.cell[(0, 0)],
                    inputs.cell[(1, 1)],
                    inputs.cell[(2, 2)],
                    inputs.cell[(1, 0)],
                    inputs.cell[(2, 0)],
                    inputs.cell[(2, 1)],
                ];
                self.bin.accumulate(block, &values, sum);
            } else {
                let values = [
                    inputs.cell[(0, 0)],
                    inputs.cell[(1, 1)],
                    inputs.cell[(2, 2)],
                ];
                self.bin.accumulate(block, &values, sum);
            }
        }
        if let Some(block) = self.registry.volume_block() {
            self.bin.accumulate(block, &[volume], sum);
        }
        if let Some(block) = self.registry.density_block() {
            self.bin.accumulate(block, &[density], sum);
        }
        if let Some(block) = self.registry.pressure_volume_block() {
            // pV against the reference pressure, not the instantaneous one.
            pv = volume
                * self.config.coupling.reference_pressure.diagonal_mean_bar()
                / PRESSURE_FACTOR_BAR;
            self.bin.accumulate(block, &[pv], sum);
        }
        if let Some(block) = self.registry.enthalpy_block() {
            let enthalpy = pv + inputs.energies.get(InteractionKind::Potential);
            self.bin.accumulate(block, &[enthalpy], sum);
        }

        if let Some(block) = self.registry.constraint_virial_block() {
            self.bin
                .accumulate(block, &tensor_row_major(&inputs.constraint_virial), sum);
        }
        if let Some(block) = self.registry.force_virial_block() {
            self.bin
                .accumulate(block, &tensor_row_major(&inputs.force_virial), sum);
        }
        if let Some(block) = self.registry.virial_block() {
            self.bin
                .accumulate(block, &tensor_row_major(&inputs.virial), sum);
        }
        if let Some(block) = self.registry.pressure_block() {
            self.bin
                .accumulate(block, &tensor_row_major(&inputs.pressure), sum);
        }
        if let Some(block) = self.registry.surface_tension_block() {
            let tension = (inputs.pressure[(2, 2)]
                - 0.5 * (inputs.pressure[(0, 0)] + inputs.pressure[(1, 1)]))
                * inputs.cell[(2, 2)];
            self.bin.accumulate(block, &[tension], sum);
        }
        if let Some(block) = self.registry.box_velocity_block() {
            if self.registry.triclinic() {
                let values = [
                    inputs.cell_velocities[(0, 0)],
                    inputs.cell_velocities[(1, 1)],
                    inputs.cell_velocities[(2, 2)],
                    inputs.cell_velocities[(1, 0)],
                    inputs.cell_velocities[(2, 0)],
                    inputs.cell_velocities[(2, 1)],
                ];
                self.bin.accumulate(block, &values, sum);
            } else {
                let values = [
                    inputs.cell_velocities[(0, 0)],
                    inputs.cell_velocities[(1, 1)],
                    inputs.cell_velocities[(2, 2)],
                ];
                self.bin.accumulate(block, &values, sum);
            }
        }
        if let Some(block) = self.registry.dipole_block() {
            let values = [inputs.dipole.x, inputs.dipole.y, inputs.dipole.z];
            self.bin.accumulate(block, &values, sum);
        }
        if let Some(block) = self.registry.profile_velocity_block() {
            self.bin.accumulate(block, &[inputs.profile_velocity], sum);
        }
        if let Some(block) = self.registry.reciprocal_viscosity_block() {
            let response = if inputs.profile_velocity != 0.0 {
                1.0 / (self.config.observables.cosine_acceleration
                    / (inputs.profile_velocity * PICO)
                    * density
                    * (inputs.cell[(2, 2)] * NANO / TAU).powi(2))
            } else {
                0.0
            };
            self.bin.accumulate(block, &[response], sum);
        }

        if !self.registry.group_pair_blocks().is_empty() {
            let n_groups = self.registry.energy_group_names().len();
            assert_eq!(
                inputs.group_pairs.n_groups(),
                n_groups,
                "group-pair input shape does not match the registered energy groups"
            );
            let blocks = self.registry.group_pair_blocks().to_vec();
            let kinds = self.registry.pair_kinds().to_vec();
            let mut block_index = 0;
            for i in 0..n_groups {
                for j in i..n_groups {
                    self.scratch.clear();
                    for kind in &kinds {
                        self.scratch.push(inputs.group_pairs.get(i, j, *kind));
                    }
                    self.bin.accumulate(blocks[block_index], &self.scratch, sum);
                    block_index += 1;
                }
            }
        }

        if let Some(block) = self.registry.temperature_block() {
            assert_eq!(
                inputs.temperature_groups.len(),
                block.len(),
                "temperature-group input shape does not match the registered groups"
            );
            self.scratch.clear();
            for group in &inputs.temperature_groups {
                self.scratch.push(group.temperature);
            }
            self.bin.accumulate(block, &self.scratch, sum);
        }
        if let Some(block) = self.registry.coupling_block() {
            self.scratch.clear();
            match self.config.coupling.thermostat {
                ThermostatKind::NoseHoover => {
                    let links = block.len() / 2;
                    assert_eq!(
                        inputs.chains.xi.len(),
                        links,
                        "thermostat chain input shape does not match the registered layout"
                    );
                    for k in 0..links {
                        self.scratch.push(inputs.chains.xi[k]);
                        self.scratch.push(inputs.chains.v_xi[k]);
                    }
                }
                ThermostatKind::Berendsen | ThermostatKind::VRescale => {
                    for group in &inputs.temperature_groups {
                        self.scratch.push(group.scaling);
                    }
                }
                ThermostatKind::None => {}
            }
            self.bin.accumulate(block, &self.scratch, sum);
        }
        if let Some(block) = self.registry.barostat_chain_block() {
            let links = block.len() / 2;
            self.scratch.clear();
            for k in 0..links {
                self.scratch.push(inputs.chains.barostat_xi[k]);
                self.scratch.push(inputs.chains.barostat_v_xi[k]);
            }
            self.bin.accumulate(block, &self.scratch, sum);
        }
        if let Some(block) = self.registry.velocity_block() {
            self.scratch.clear();
            for velocity in &inputs.group_velocities {
                self.scratch.push(velocity.x);
                self.scratch.push(velocity.y);
                self.scratch.push(velocity.z);
            }
            self.bin.accumulate(block, &self.scratch, sum);
        }

        self.bin.advance_step(sum);
        if let Some(diagnostics) = &inputs.restraint_diagnostics {
            self.last_restraints = Some(diagnostics.clone());
        }

        if collect_free_energy && self.collector.is_collecting() {
            let derivatives: Vec<f64> = self
                .collector
                .path()
                .components()
                .iter()
                .map(|component| inputs.energies.get(component.derivative_kind()))
                .collect();
            self.collector.record(
                inputs.time,
                &derivatives,
                &inputs.lambda_energies,
                inputs.energies.get(InteractionKind::KineticEnergy),
                inputs.energies.get(InteractionKind::Potential),
                inputs.energies.get(InteractionKind::TotalEnergy),
                pv,
            );
        }
        trace!(time = inputs.time, "step accumulated");
    }

    /// Advances the step counters for a step that produced no accumulation.
    pub fn record_non_energy_step(&mut self) {
        self.bin.advance_step(false);
    }

    /// Emits the requested report through the sink. CURRENT mode also flushes
    /// the free-energy collector and starts a fresh interval window.
    pub fn print_step(
        &mut self,
        step: u64,
        time: f64,
        mode: ReportMode,
        sink: &mut dyn EnergySink,
    ) -> Result<(), EngineError> {
        match mode {
            ReportMode::Current => {
                let flush = self.collector.flush();
                let mut blocks = Vec::new();
                if let Some(diagnostics) = &self.last_restraints {
                    blocks.push(FrameBlock::RestraintDiagnostics(diagnostics.clone()));
                }
                if let Some(block) = flush.block {
                    blocks.push(FrameBlock::DeltaH(block));
                }
                let frame = EnergyFrame {
                    step,
                    time,
                    dt: self.config.time_step_ps,
                    steps_in_window: self.bin.interval_steps(),
                    samples_in_window: self.bin.interval_samples(),
                    slots: (0..self.bin.len())
                        .map(|slot| {
                            let window = self.bin.interval_window(slot);
                            SlotRecord {
                                value: self.bin.value(slot),
                                sum: window.sum,
                                sum_sq: window.sum_sq,
                                count: window.count,
                            }
                        })
                        .collect(),
                    blocks,
                };
                sink.write_frame(&frame)?;
                if let Some(line) = flush.line {
                    sink.write_free_energy_line(&line)?;
                }
                // The frame carried this window's sums; start a fresh one.
                self.bin.reset_interval_window();
            }
            ReportMode::Average => {
                let summary = self.build_summary();
                sink.write_summary(&summary)?;
            }
        }
        Ok(())
    }

    fn summary_row(&self, slot: usize) -> SummaryRow {
        let window = self.bin.run_window(slot);
        SummaryRow {
            label: self.bin.label(slot).to_string(),
            unit: self.bin.unit(slot),
            stats: window.mean().map(|mean| SlotAverages {
                mean,
                rmsd: window.fluctuation().unwrap_or(0.0),
            }),
        }
    }

    fn summary_table(&self, title: &str, block: BlockHandle) -> SummaryTable {
        SummaryTable {
            title: title.to_string(),
            rows: block.slots().map(|slot| self.summary_row(slot)).collect(),
        }
    }

    fn build_summary(&self) -> Summary {
        if self.bin.run_samples() == 0 {
            return Summary::InsufficientData {
                steps: self.bin.run_steps(),
            };
        }

        let mut energies = self.summary_table("Energies", self.registry.energy_block());
        if let Some(block) = self.registry.constraint_rmsd_block() {
            energies
                .rows
                .extend(block.slots().map(|slot| self.summary_row(slot)));
        }

        let group_pairs = (!self.registry.group_pair_blocks().is_empty()).then(|| {
            let names = self.registry.energy_group_names();
            let mut rows = Vec::with_capacity(self.registry.group_pair_blocks().len());
            let mut block_index = 0;
            for i in 0..names.len() {
                for j in i..names.len() {
                    let block = self.registry.group_pair_blocks()[block_index];
                    rows.push(GroupPairRow {
                        label: format!("{}-{}", names[i], names[j]),
                        cells: block
                            .slots()
                            .map(|slot| {
                                let window = self.bin.run_window(slot);
                                window.mean().map(|mean| SlotAverages {
                                    mean,
                                    rmsd: window.fluctuation().unwrap_or(0.0),
                                })
                            })
                            .collect(),
                    });
                    block_index += 1;
                }
            }
            GroupPairSummary {
                kinds: self.registry.pair_kinds().to_vec(),
                rows,
            }
        });

        let temperatures = self
            .registry
            .temperature_block()
            .filter(|block| block.len() > 1)
            .map(|block| self.summary_table("Temperature Coupling Groups", block));

        Summary::Report(SummaryReport {
            steps: self.bin.run_steps(),
            frames: self.bin.run_samples(),
            energies,
            box_dimensions: self
                .registry
                .box_block()
                .map(|block| self.summary_table("Box Dimensions", block)),
            constraint_virial: self
                .registry
                .constraint_virial_block()
                .map(|block| self.summary_table("Constraint Virial", block)),
            force_virial: self
                .registry
                .force_virial_block()
                .map(|block| self.summary_table("Force Virial", block)),
            virial: self
                .registry
                .virial_block()
                .map(|block| self.summary_table("Total Virial", block)),
            pressure: self
                .registry
                .pressure_block()
                .map(|block| self.summary_table("Pressure", block)),
            dipole: self
                .registry
                .dipole_block()
                .map(|block| self.summary_table("Total Dipole", block)),
            group_pairs,
            temperatures,
            group_velocities: self
                .registry
                .velocity_block()
                .map(|block| self.summary_table("Group Velocities", block)),
        })
    }

    /// Exports the accumulator state for a checkpoint write.
    pub fn capture_history(&self) -> EnergyHistory {
        EnergyHistory {
            version: ENERGY_HISTORY_FORMAT,
            bin: self.bin.snapshot(),
            free_energy: self.collector.snapshot(),
        }
    }

    /// Restores accumulator state at restart. Any shape mismatch against the
    /// live configuration is fatal: the run cannot safely continue.
    pub fn restore_history(&mut self, history: &EnergyHistory) -> Result<(), EngineError> {
        if history.version != ENERGY_HISTORY_FORMAT {
            return Err(EngineError::HistoryVersion {
                found: history.version,
                expected: ENERGY_HISTORY_FORMAT,
            });
        }
        self.bin.restore(&history.bin)?;
        match &history.free_energy {
            Some(snapshot) => self.collector.restore(snapshot)?,
            None => {
                if self.collector.is_collecting() {
                    return Err(EngineError::FreeEnergy {
                        source: FepRestoreError::SnapshotMissing,
                    });
                }
            }
        }
        info!(
            steps = self.bin.run_steps(),
            "accumulator state restored from checkpoint"
        );
        Ok(())
    }
}
