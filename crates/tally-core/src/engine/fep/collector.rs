use super::histogram::DeltaHHistogram;
use super::lambda::{LambdaComponent, LambdaPath};
use crate::engine::config::{BarostatKind, HistogramConfig, ReferenceEnergyKind, RunConfig};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FepRestoreError {
    #[error("snapshot carries {found} derivative components, the live path tracks {expected}")]
    ComponentCountMismatch { expected: usize, found: usize },

    #[error("snapshot carries {found} foreign states, the live window tracks {expected}")]
    ForeignCountMismatch { expected: usize, found: usize },

    #[error("snapshot histogram layout does not match the configured compression")]
    HistogramLayoutMismatch,

    #[error("snapshot carries free-energy samples but alchemical sampling is disabled")]
    CollectorDisabled,

    #[error("snapshot carries no free-energy state but alchemical sampling is enabled")]
    SnapshotMissing,
}

/// Collector lifecycle. Flushing is transient inside [`FepCollector::flush`];
/// the collector re-enters `Collecting` with empty buffers afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Collecting,
}

/// One recorded per-step sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaHSample {
    pub time: f64,
    pub state_index: usize,
    /// dH/dλ per active component, in component order.
    pub derivatives: Vec<f64>,
    /// ΔH to each foreign state in the configured window.
    pub delta_h: Vec<f64>,
    pub pressure_volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaHKind {
    StateIndex,
    Derivative(LambdaComponent),
    Foreign { state: usize },
    PressureVolume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeltaHData {
    Raw(Vec<f64>),
    Histogram(DeltaHHistogram),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaHSeries {
    pub kind: DeltaHKind,
    pub data: DeltaHData,
}

/// The free-energy auxiliary block of one energy frame: every quantity
/// sampled since the previous flush, raw or histogram-compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaHBlock {
    pub start_time: f64,
    pub interval: f64,
    pub native_state: usize,
    pub series: Vec<DeltaHSeries>,
}

/// What one flush produced: the fixed-field-order text line for the periodic
/// output file, and the frame block.
#[derive(Debug, Clone, PartialEq)]
pub struct FepFlush {
    pub line: Option<String>,
    pub block: Option<DeltaHBlock>,
}

/// Un-flushed collector state for the checkpoint bridge, with the layout
/// fingerprint a restore must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FepSnapshot {
    component_count: usize,
    foreign_count: usize,
    histogram: Option<HistogramConfig>,
    start_time: Option<f64>,
    sample_interval: Option<f64>,
    samples: u64,
    state_buffer: Vec<u32>,
    derivative_buffers: Vec<Vec<f64>>,
    foreign_buffers: Vec<Vec<f64>>,
    pressure_volume_buffer: Vec<f64>,
}

/// Per-lambda derivative and foreign-state ΔH sample collector.
#[derive(Debug, Clone)]
pub struct FepCollector {
    state: CollectorState,
    path: LambdaPath,
    derivatives: bool,
    reference_energy: ReferenceEnergyKind,
    expanded: bool,
    histogram: Option<HistogramConfig>,
    pv_applicable: bool,
    start_time: Option<f64>,
    sample_interval: Option<f64>,
    samples: u64,
    state_buffer: Vec<u32>,
    derivative_buffers: Vec<Vec<f64>>,
    foreign_buffers: Vec<Vec<f64>>,
    pressure_volume_buffer: Vec<f64>,
    last_sample: Option<(DeltaHSample, Option<f64>)>,
}

impl FepCollector {
    /// Builds the collector; starts `Idle` when the configuration requests no
    /// alchemical sampling, `Collecting` otherwise.
    pub(crate) fn from_config(config: &RunConfig) -> Self {
        let Some(fep) = &config.free_energy else {
            return Self::idle();
        };
        let path = LambdaPath::from_config(fep);
        // The instantaneous pV term is only carried when it is needed to keep
        // the reduced potential consistent across foreign-state evaluation.
        let pv_applicable = !config.reprocessing
            && config.cell.dynamic
            && config.coupling.barostat != BarostatKind::None
            && config.coupling.reference_pressure.is_isotropic()
            && !fep.states.is_empty()
            && fep.pinned_lambda.is_none();
        let derivative_buffers = if fep.derivatives {
            vec![Vec::new(); path.components().len()]
        } else {
            Vec::new()
        };
        let foreign_buffers = vec![Vec::new(); path.foreign_count()];
        Self {
            state: CollectorState::Collecting,
            path,
            derivatives: fep.derivatives,
            reference_energy: fep.reference_energy,
            expanded: fep.expanded_ensemble,
            histogram: fep.histogram,
            pv_applicable,
            start_time: None,
            sample_interval: None,
            samples: 0,
            state_buffer: Vec::new(),
            derivative_buffers,
            foreign_buffers,
            pressure_volume_buffer: Vec::new(),
            last_sample: None,
        }
    }

    fn idle() -> Self {
        Self {
            state: CollectorState::Idle,
            path: LambdaPath::from_config(&crate::engine::config::FepConfig::default()),
            derivatives: false,
            reference_energy: ReferenceEnergyKind::None,
            expanded: false,
            histogram: None,
            pv_applicable: false,
            start_time: None,
            sample_interval: None,
            samples: 0,
            state_buffer: Vec::new(),
            derivative_buffers: Vec::new(),
            foreign_buffers: Vec::new(),
            pressure_volume_buffer: Vec::new(),
            last_sample: None,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn is_collecting(&self) -> bool {
        self.state == CollectorState::Collecting
    }

    pub fn path(&self) -> &LambdaPath {
        &self.path
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Expanded-ensemble state move, effective for all subsequent samples.
    pub fn set_current_state(&mut self, index: usize) {
        if self.is_collecting() {
            self.path.set_current_index(index);
        }
    }

    /// Accumulates one sample. `derivatives` runs over the active components
    /// in component order; `lambda_energies` over every path state.
    pub(crate) fn record(
        &mut self,
        time: f64,
        derivatives: &[f64],
        lambda_energies: &[f64],
        kinetic_energy: f64,
        potential_energy: f64,
        total_energy: f64,
        pressure_volume: f64,
    ) {
        if !self.is_collecting() {
            return;
        }

        match self.start_time {
            None => self.start_time = Some(time),
            Some(start) if self.sample_interval.is_none() && time > start => {
                self.sample_interval = Some(time - start);
            }
            _ => {}
        }

        let current = self.path.current_index();
        if self.path.foreign_count() > 0 {
            assert_eq!(
                lambda_energies.len(),
                self.path.state_count(),
                "lambda energy count does not match the path length"
            );
        }

        let mut delta_h = Vec::with_capacity(self.path.foreign_count());
        for i in self.path.foreign_window() {
            let mut value = lambda_energies[i] - lambda_energies[current];
            if let (Some(t_foreign), Some(t_current)) =
                (self.path.temperature(i), self.path.temperature(current))
            {
                value += (t_foreign / t_current - 1.0) * kinetic_energy;
            }
            delta_h.push(value);
        }

        let derivative_values: Vec<f64> = if self.derivatives {
            assert_eq!(
                derivatives.len(),
                self.path.components().len(),
                "derivative count does not match the active components"
            );
            derivatives.to_vec()
        } else {
            Vec::new()
        };

        if self.expanded {
            self.state_buffer.push(current as u32);
        }
        for (buffer, &value) in self.derivative_buffers.iter_mut().zip_eq(&derivative_values) {
            buffer.push(value);
        }
        for (buffer, &value) in self.foreign_buffers.iter_mut().zip_eq(&delta_h) {
            buffer.push(value);
        }
        if self.pv_applicable {
            self.pressure_volume_buffer.push(pressure_volume);
        }
        self.samples += 1;

        let reference = match self.reference_energy {
            ReferenceEnergyKind::None => None,
            ReferenceEnergyKind::Potential => Some(potential_energy),
            ReferenceEnergyKind::Total => Some(total_energy),
        };
        trace!(time, state = current, samples = self.samples, "ΔH sample recorded");
        self.last_sample = Some((
            DeltaHSample {
                time,
                state_index: current,
                derivatives: derivative_values,
                delta_h,
                pressure_volume: self.pv_applicable.then_some(pressure_volume),
            },
            reference,
        ));
    }

    /// Serializes the accumulated window into a frame block and the periodic
    /// text line, then resets the sample buffers.
    pub(crate) fn flush(&mut self) -> FepFlush {
        if !self.is_collecting() {
            return FepFlush {
                line: None,
                block: None,
            };
        }
        let line = self
            .last_sample
            .as_ref()
            .map(|(sample, reference)| self.format_line(sample, *reference));
        let block = (self.samples > 0).then(|| self.build_block());
        debug!(samples = self.samples, "free-energy buffers flushed");
        self.reset_window();
        FepFlush { line, block }
    }

    /// Field order is fixed: time, [expanded-ensemble state], [reference
    /// energy], dH/dλ per component, ΔH per foreign state, [pV].
    fn format_line(&self, sample: &DeltaHSample, reference: Option<f64>) -> String {
        let mut line = format!("{:.4}", sample.time);
        if self.expanded {
            line.push_str(&format!(" {}", sample.state_index));
        }
        if let Some(energy) = reference {
            line.push_str(&format!(" {:.6}", energy));
        }
        for value in &sample.derivatives {
            line.push_str(&format!(" {:.6}", value));
        }
        for value in &sample.delta_h {
            line.push_str(&format!(" {:.6}", value));
        }
        if let Some(pv) = sample.pressure_volume {
            line.push_str(&format!(" {:.6}", pv));
        }
        line
    }

    fn build_block(&self) -> DeltaHBlock {
        let mut series = Vec::new();
        if self.expanded {
            series.push(DeltaHSeries {
                kind: DeltaHKind::StateIndex,
                data: DeltaHData::Raw(self.state_buffer.iter().map(|&s| f64::from(s)).collect()),
            });
        }
        for (component, buffer) in self.path.components().iter().zip(&self.derivative_buffers) {
            series.push(DeltaHSeries {
                kind: DeltaHKind::Derivative(*component),
                data: self.compress(buffer),
            });
        }
        for (offset, buffer) in self.foreign_buffers.iter().enumerate() {
            series.push(DeltaHSeries {
                kind: DeltaHKind::Foreign {
                    state: self.path.foreign_window().start + offset,
                },
                data: self.compress(buffer),
            });
        }
        if self.pv_applicable {
            series.push(DeltaHSeries {
                kind: DeltaHKind::PressureVolume,
                data: self.compress(&self.pressure_volume_buffer),
            });
        }
        DeltaHBlock {
            start_time: self.start_time.unwrap_or_default(),
            interval: self.sample_interval.unwrap_or_default(),
            native_state: self.path.current_index(),
            series,
        }
    }

    fn compress(&self, samples: &[f64]) -> DeltaHData {
        match &self.histogram {
            Some(config) => DeltaHData::Histogram(DeltaHHistogram::from_samples(
                samples,
                config.spacing,
                config.max_bins,
            )),
            None => DeltaHData::Raw(samples.to_vec()),
        }
    }

    fn reset_window(&mut self) {
        self.start_time = None;
        self.samples = 0;
        self.state_buffer.clear();
        for buffer in &mut self.derivative_buffers {
            buffer.clear();
        }
        for buffer in &mut self.foreign_buffers {
            buffer.clear();
        }
        self.pressure_volume_buffer.clear();
        self.last_sample = None;
    }

    pub(crate) fn snapshot(&self) -> Option<FepSnapshot> {
        self.is_collecting().then(|| FepSnapshot {
            component_count: self.derivative_buffers.len(),
            foreign_count: self.foreign_buffers.len(),
            histogram: self.histogram,
            start_time: self.start_time,
            sample_interval: self.sample_interval,
            samples: self.samples,
            state_buffer: self.state_buffer.clone(),
            derivative_buffers: self.derivative_buffers.clone(),
            foreign_buffers: self.foreign_buffers.clone(),
            pressure_volume_buffer: self.pressure_volume_buffer.clone(),
        })
    }

    pub(crate) fn restore(&mut self, snapshot: &FepSnapshot) -> Result<(), FepRestoreError> {
        if !self.is_collecting() {
            return Err(FepRestoreError::CollectorDisabled);
        }
        if snapshot.component_count != self.derivative_buffers.len() {
            return Err(FepRestoreError::ComponentCountMismatch {
                expected: self.derivative_buffers.len(),
                found: snapshot.component_count,
            });
        }
        if snapshot.foreign_count != self.foreign_buffers.len() {
            return Err(FepRestoreError::ForeignCountMismatch {
                expected: self.foreign_buffers.len(),
                found: snapshot.foreign_count,
            });
        }
        if snapshot.histogram != self.histogram {
            return Err(FepRestoreError::HistogramLayoutMismatch);
        }
        self.start_time = snapshot.start_time;
        self.sample_interval = snapshot.sample_interval;
        self.samples = snapshot.samples;
        self.state_buffer = snapshot.state_buffer.clone();
        self.derivative_buffers = snapshot.derivative_buffers.clone();
        self.foreign_buffers = snapshot.foreign_buffers.clone();
        self.pressure_volume_buffer = snapshot.pressure_volume_buffer.clone();
        self.last_sample = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{
        BoxConfig, CouplingConfig, FepConfig, ForeignWindow, RunConfig, RunConfigBuilder,
    };

    fn three_state_fep() -> FepConfig {
        FepConfig {
            components: vec![LambdaComponent::Coupling],
            states: vec![vec![0.0], vec![0.5], vec![1.0]],
            initial_state: 1,
            foreign_window: ForeignWindow { start: 0, stop: 3 },
            ..FepConfig::default()
        }
    }

    fn config_with(fep: FepConfig) -> RunConfig {
        RunConfigBuilder::new()
            .time_step_ps(0.002)
            .energy_groups(["System"])
            .temperature_groups(["System"])
            .free_energy(fep)
            .build()
            .unwrap()
    }

    fn raw(series: &DeltaHSeries) -> &[f64] {
        match &series.data {
            DeltaHData::Raw(values) => values,
            DeltaHData::Histogram(_) => panic!("expected raw series"),
        }
    }

    #[test]
    fn disabled_sampling_starts_idle_and_stays_inert() {
        let config = RunConfigBuilder::new()
            .time_step_ps(0.002)
            .energy_groups(["System"])
            .temperature_groups(["System"])
            .build()
            .unwrap();
        let mut collector = FepCollector::from_config(&config);
        assert_eq!(collector.state(), CollectorState::Idle);

        collector.record(0.0, &[1.0], &[], 0.0, 0.0, 0.0, 0.0);
        let flush = collector.flush();
        assert_eq!(collector.samples(), 0);
        assert!(flush.line.is_none());
        assert!(flush.block.is_none());
    }

    #[test]
    fn delta_h_is_energy_difference_to_each_foreign_state() {
        let config = config_with(three_state_fep());
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[5.0], &[100.0, 90.0, 80.0], 0.0, -500.0, -400.0, 0.0);

        let flush = collector.flush();
        let block = flush.block.unwrap();
        assert_eq!(block.native_state, 1);
        let foreign: Vec<&DeltaHSeries> = block
            .series
            .iter()
            .filter(|s| matches!(s.kind, DeltaHKind::Foreign { .. }))
            .collect();
        assert_eq!(foreign.len(), 3);
        assert_eq!(raw(foreign[0]), &[10.0]);
        // The foreign state equal to the current state differs by exactly zero.
        assert_eq!(raw(foreign[1]), &[0.0]);
        assert_eq!(raw(foreign[2]), &[-10.0]);
    }

    #[test]
    fn tempering_rescales_delta_h_with_the_kinetic_term() {
        let mut fep = three_state_fep();
        fep.tempering_temperatures = Some(vec![300.0, 310.0, 320.0]);
        let config = config_with(fep);
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[0.0], &[100.0, 90.0, 80.0], 50.0, 0.0, 0.0, 0.0);

        let flush = collector.flush();
        let block = flush.block.unwrap();
        let foreign: Vec<&DeltaHSeries> = block
            .series
            .iter()
            .filter(|s| matches!(s.kind, DeltaHKind::Foreign { .. }))
            .collect();
        let expected_0 = 10.0 + (300.0 / 310.0 - 1.0) * 50.0;
        assert!((raw(foreign[0])[0] - expected_0).abs() < 1e-12);
        // The current state keeps a zero correction: T_foreign == T_current.
        assert_eq!(raw(foreign[1]), &[0.0]);
    }

    #[test]
    fn line_fields_follow_the_fixed_order() {
        let mut fep = three_state_fep();
        fep.expanded_ensemble = true;
        fep.reference_energy = ReferenceEnergyKind::Total;
        let mut config = config_with(fep);
        config.cell = BoxConfig {
            dynamic: true,
            triclinic: false,
        };
        config.coupling = CouplingConfig {
            barostat: BarostatKind::ParrinelloRahman,
            ..CouplingConfig::default()
        };
        let mut collector = FepCollector::from_config(&config);
        collector.record(1.5, &[7.25], &[100.0, 90.0, 80.0], 0.0, -500.0, -400.0, 3.5);

        let flush = collector.flush();
        let line = flush.line.unwrap();
        let fields: Vec<&str> = line.split_whitespace().collect();
        // time, state, reference energy, one dH/dλ, three ΔH, pV
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[0], "1.5000");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2].parse::<f64>().unwrap(), -400.0);
        assert_eq!(fields[3].parse::<f64>().unwrap(), 7.25);
        assert_eq!(fields[4].parse::<f64>().unwrap(), 10.0);
        assert_eq!(fields[7].parse::<f64>().unwrap(), 3.5);
    }

    #[test]
    fn pinned_lambda_drops_the_pv_field() {
        let mut fep = three_state_fep();
        fep.pinned_lambda = Some(0.5);
        let mut config = config_with(fep);
        config.cell = BoxConfig {
            dynamic: true,
            triclinic: false,
        };
        config.coupling = CouplingConfig {
            barostat: BarostatKind::ParrinelloRahman,
            ..CouplingConfig::default()
        };
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 3.5);

        let flush = collector.flush();
        let line = flush.line.unwrap();
        assert_eq!(line.split_whitespace().count(), 5);
        let block = flush.block.unwrap();
        assert!(
            !block
                .series
                .iter()
                .any(|s| s.kind == DeltaHKind::PressureVolume)
        );
    }

    #[test]
    fn flush_resets_the_sample_window() {
        let config = config_with(three_state_fep());
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        collector.record(0.004, &[2.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        assert_eq!(collector.samples(), 2);

        let first = collector.flush();
        assert!(first.block.is_some());
        assert_eq!(collector.samples(), 0);

        let second = collector.flush();
        assert!(second.block.is_none());
        assert!(second.line.is_none());
    }

    #[test]
    fn sample_interval_is_learned_from_the_first_two_samples() {
        let config = config_with(three_state_fep());
        let mut collector = FepCollector::from_config(&config);
        collector.record(1.0, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        collector.record(1.1, &[2.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);

        let block = collector.flush().block.unwrap();
        assert_eq!(block.start_time, 1.0);
        assert!((block.interval - 0.1).abs() < 1e-12);
    }

    #[test]
    fn histogram_mode_buckets_every_sample() {
        let mut fep = three_state_fep();
        fep.histogram = Some(HistogramConfig {
            spacing: 0.5,
            max_bins: 32,
        });
        let config = config_with(fep);
        let mut collector = FepCollector::from_config(&config);
        for step in 0..40 {
            let e0 = 100.0 + f64::from(step) * 0.1;
            collector.record(
                f64::from(step) * 0.002,
                &[1.0],
                &[e0, 90.0, 80.0],
                0.0,
                0.0,
                0.0,
                0.0,
            );
        }

        let block = collector.flush().block.unwrap();
        for series in block
            .series
            .iter()
            .filter(|s| matches!(s.kind, DeltaHKind::Foreign { .. }))
        {
            match &series.data {
                DeltaHData::Histogram(histogram) => assert_eq!(histogram.total_count(), 40),
                DeltaHData::Raw(_) => panic!("expected histogram compression"),
            }
        }
    }

    #[test]
    fn expanded_ensemble_tracks_state_moves() {
        let mut fep = three_state_fep();
        fep.expanded_ensemble = true;
        let config = config_with(fep);
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        collector.set_current_state(2);
        collector.record(0.004, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);

        let block = collector.flush().block.unwrap();
        let states = block
            .series
            .iter()
            .find(|s| s.kind == DeltaHKind::StateIndex)
            .unwrap();
        assert_eq!(raw(states), &[1.0, 2.0]);
    }

    #[test]
    fn snapshot_restore_round_trips_unflushed_samples() {
        let config = config_with(three_state_fep());
        let mut collector = FepCollector::from_config(&config);
        collector.record(0.002, &[1.0], &[100.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        collector.record(0.004, &[2.0], &[101.0, 90.0, 80.0], 0.0, 0.0, 0.0, 0.0);
        let snapshot = collector.snapshot().unwrap();

        let mut restored = FepCollector::from_config(&config);
        restored.restore(&snapshot).unwrap();
        assert_eq!(restored.samples(), 2);

        let block = restored.flush().block.unwrap();
        let first_foreign = block
            .series
            .iter()
            .find(|s| s.kind == (DeltaHKind::Foreign { state: 0 }))
            .unwrap();
        assert_eq!(raw(first_foreign), &[10.0, 11.0]);
    }

    #[test]
    fn restore_rejects_a_different_window_shape() {
        let config = config_with(three_state_fep());
        let collector = FepCollector::from_config(&config);
        let snapshot = collector.snapshot().unwrap();

        let mut narrow = three_state_fep();
        narrow.foreign_window = ForeignWindow { start: 0, stop: 2 };
        let mut other = FepCollector::from_config(&config_with(narrow));
        let err = other.restore(&snapshot).unwrap_err();
        assert_eq!(
            err,
            FepRestoreError::ForeignCountMismatch {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn restore_rejects_histogram_layout_changes() {
        let config = config_with(three_state_fep());
        let collector = FepCollector::from_config(&config);
        let snapshot = collector.snapshot().unwrap();

        let mut compressed = three_state_fep();
        compressed.histogram = Some(HistogramConfig {
            spacing: 0.1,
            max_bins: 16,
        });
        let mut other = FepCollector::from_config(&config_with(compressed));
        assert_eq!(
            other.restore(&snapshot).unwrap_err(),
            FepRestoreError::HistogramLayoutMismatch
        );
    }
}
