use crate::core::units::Unit;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SnapshotError {
    #[error(
        "Mismatch between number of accumulator slots at setup ({expected}) and in the snapshot ({found})"
    )]
    SlotCountMismatch { expected: usize, found: usize },
}

/// A contiguous reserved slot range, handed out by [`StatBin::register_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    base: usize,
    len: usize,
}

impl BlockHandle {
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute slot index of the `offset`-th slot in this block.
    #[inline]
    pub fn slot(&self, offset: usize) -> usize {
        assert!(
            offset < self.len,
            "slot offset {offset} out of range for block of {} slots",
            self.len
        );
        self.base + offset
    }

    pub fn slots(&self) -> std::ops::Range<usize> {
        self.base..self.base + self.len
    }
}

/// Sum, sum-of-squares, and sample count over one accumulation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub sum: f64,
    pub sum_sq: f64,
    pub count: u64,
}

impl Window {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Arithmetic mean, or `None` while the window holds no samples.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Root-mean-square fluctuation around the mean, or `None` while the
    /// window holds no samples. Clamped at zero against rounding.
    pub fn fluctuation(&self) -> Option<f64> {
        self.mean()
            .map(|mean| (self.sum_sq / self.count as f64 - mean * mean).max(0.0).sqrt())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    value: f64,
    interval: Window,
    run: Window,
}

/// Persistable accumulator state: both windows of every slot plus the
/// bin-level step counters. Current values are per-step scratch and are not
/// carried across a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSnapshot {
    interval_steps: u64,
    interval_samples: u64,
    run_steps: u64,
    run_samples: u64,
    slots: Vec<(Window, Window)>,
}

impl BinSnapshot {
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Multi-slot streaming accumulator.
///
/// Registration is append-only and happens exactly once, during setup; the
/// per-step hot path is [`accumulate`](Self::accumulate) followed by one
/// [`advance_step`](Self::advance_step).
#[derive(Debug, Clone, Default)]
pub struct StatBin {
    labels: Vec<String>,
    units: Vec<Unit>,
    slots: Vec<Slot>,
    interval_steps: u64,
    interval_samples: u64,
    run_steps: u64,
    run_samples: u64,
}

impl StatBin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a contiguous slot range with one unit for the whole block.
    pub fn register_block<S: Into<String>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
        unit: Unit,
    ) -> BlockHandle {
        self.register_block_with_units(names.into_iter().map(|name| (name.into(), unit)))
    }

    /// Reserves a contiguous slot range with a per-slot unit.
    pub fn register_block_with_units(
        &mut self,
        terms: impl IntoIterator<Item = (String, Unit)>,
    ) -> BlockHandle {
        let base = self.slots.len();
        for (name, unit) in terms {
            self.labels.push(name);
            self.units.push(unit);
            self.slots.push(Slot::default());
        }
        BlockHandle {
            base,
            len: self.slots.len() - base,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn label(&self, slot: usize) -> &str {
        &self.labels[slot]
    }

    pub fn unit(&self, slot: usize) -> Unit {
        self.units[slot]
    }

    /// Sets each slot's current value; with `include_in_sum` the values also
    /// enter both windows' sums and bump both slot counters.
    pub fn accumulate(&mut self, block: BlockHandle, values: &[f64], include_in_sum: bool) {
        assert_eq!(
            values.len(),
            block.len(),
            "value count does not match the registered block size"
        );
        for (slot, &value) in self.slots[block.slots()].iter_mut().zip(values) {
            slot.value = value;
            if include_in_sum {
                slot.interval.add(value);
                slot.run.add(value);
            }
        }
    }

    /// Advances the bin-level step counters, independent of any slot.
    pub fn advance_step(&mut self, include_in_sum: bool) {
        self.interval_steps += 1;
        self.run_steps += 1;
        if include_in_sum {
            self.interval_samples += 1;
            self.run_samples += 1;
        }
    }

    /// Zeroes the interval window of every slot and the interval step
    /// counters; whole-run accumulators are untouched.
    pub fn reset_interval_window(&mut self) {
        for slot in &mut self.slots {
            slot.interval.reset();
        }
        self.interval_steps = 0;
        self.interval_samples = 0;
    }

    pub fn value(&self, slot: usize) -> f64 {
        self.slots[slot].value
    }

    pub fn interval_window(&self, slot: usize) -> Window {
        self.slots[slot].interval
    }

    pub fn run_window(&self, slot: usize) -> Window {
        self.slots[slot].run
    }

    pub fn interval_steps(&self) -> u64 {
        self.interval_steps
    }

    pub fn interval_samples(&self) -> u64 {
        self.interval_samples
    }

    pub fn run_steps(&self) -> u64 {
        self.run_steps
    }

    pub fn run_samples(&self) -> u64 {
        self.run_samples
    }

    pub fn snapshot(&self) -> BinSnapshot {
        BinSnapshot {
            interval_steps: self.interval_steps,
            interval_samples: self.interval_samples,
            run_steps: self.run_steps,
            run_samples: self.run_samples,
            slots: self
                .slots
                .iter()
                .map(|slot| (slot.interval, slot.run))
                .collect(),
        }
    }

    /// Restores both windows and the step counters from a snapshot taken from
    /// an identically-shaped bin.
    pub fn restore(&mut self, snapshot: &BinSnapshot) -> Result<(), SnapshotError> {
        if snapshot.slots.len() != self.slots.len() {
            return Err(SnapshotError::SlotCountMismatch {
                expected: self.slots.len(),
                found: snapshot.slots.len(),
            });
        }
        self.interval_steps = snapshot.interval_steps;
        self.interval_samples = snapshot.interval_samples;
        self.run_steps = snapshot.run_steps;
        self.run_samples = snapshot.run_samples;
        for (slot, &(interval, run)) in self.slots.iter_mut().zip(&snapshot.slots) {
            slot.interval = interval;
            slot.run = run;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin_with_one_slot() -> (StatBin, BlockHandle) {
        let mut bin = StatBin::new();
        let block = bin.register_block(["Potential"], Unit::KiloJoulePerMole);
        (bin, block)
    }

    #[test]
    fn register_block_reserves_contiguous_ranges() {
        let mut bin = StatBin::new();
        let first = bin.register_block(["A", "B"], Unit::KiloJoulePerMole);
        let second = bin.register_block(["C"], Unit::Bar);
        assert_eq!(first.base(), 0);
        assert_eq!(first.len(), 2);
        assert_eq!(second.base(), 2);
        assert_eq!(bin.len(), 3);
        assert_eq!(bin.label(2), "C");
        assert_eq!(bin.unit(2), Unit::Bar);
    }

    #[test]
    fn interval_average_is_arithmetic_mean() {
        let (mut bin, block) = bin_with_one_slot();
        for value in [10.0, 20.0, 30.0] {
            bin.accumulate(block, &[value], true);
            bin.advance_step(true);
        }
        let window = bin.interval_window(block.slot(0));
        assert_eq!(window.count, 3);
        assert_eq!(window.mean(), Some(20.0));
        assert_eq!(bin.interval_samples(), 3);
    }

    #[test]
    fn reset_preserves_whole_run_window() {
        let (mut bin, block) = bin_with_one_slot();
        for value in [1.0, 2.0, 3.0] {
            bin.accumulate(block, &[value], true);
            bin.advance_step(true);
        }
        bin.reset_interval_window();
        for value in [10.0, 20.0] {
            bin.accumulate(block, &[value], true);
            bin.advance_step(true);
        }

        let interval = bin.interval_window(block.slot(0));
        let run = bin.run_window(block.slot(0));
        assert_eq!(interval.count, 2);
        assert_eq!(interval.mean(), Some(15.0));
        assert_eq!(run.count, 5);
        assert_eq!(run.mean(), Some(36.0 / 5.0));
        assert_eq!(bin.interval_steps(), 2);
        assert_eq!(bin.run_steps(), 5);
    }

    #[test]
    fn excluded_values_update_only_the_current_value() {
        let (mut bin, block) = bin_with_one_slot();
        bin.accumulate(block, &[42.0], false);
        bin.advance_step(false);
        assert_eq!(bin.value(block.slot(0)), 42.0);
        assert_eq!(bin.interval_window(block.slot(0)).count, 0);
        assert_eq!(bin.run_samples(), 0);
        assert_eq!(bin.run_steps(), 1);
    }

    #[test]
    fn empty_window_reports_no_data_instead_of_nan() {
        let (bin, block) = bin_with_one_slot();
        let window = bin.interval_window(block.slot(0));
        assert_eq!(window.mean(), None);
        assert_eq!(window.fluctuation(), None);
    }

    #[test]
    fn fluctuation_matches_population_deviation() {
        let (mut bin, block) = bin_with_one_slot();
        for value in [2.0, 4.0] {
            bin.accumulate(block, &[value], true);
            bin.advance_step(true);
        }
        let window = bin.interval_window(block.slot(0));
        assert!((window.fluctuation().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_restore_reproduces_sums_exactly() {
        let (mut bin, block) = bin_with_one_slot();
        for value in [0.1, 0.2, 0.3] {
            bin.accumulate(block, &[value], true);
            bin.advance_step(true);
        }
        let snapshot = bin.snapshot();

        let mut restored = StatBin::new();
        restored.register_block(["Potential"], Unit::KiloJoulePerMole);
        restored.restore(&snapshot).unwrap();

        let original = bin.interval_window(block.slot(0));
        let copy = restored.interval_window(block.slot(0));
        assert_eq!(original, copy);
        assert_eq!(bin.run_window(block.slot(0)), restored.run_window(block.slot(0)));
        assert_eq!(restored.run_steps(), 3);
    }

    #[test]
    fn restore_rejects_differently_shaped_bin() {
        let (bin, _) = bin_with_one_slot();
        let snapshot = bin.snapshot();

        let mut other = StatBin::new();
        other.register_block(["A", "B"], Unit::KiloJoulePerMole);
        let err = other.restore(&snapshot).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::SlotCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    #[should_panic(expected = "value count does not match")]
    fn accumulate_with_wrong_arity_is_a_bug() {
        let (mut bin, block) = bin_with_one_slot();
        bin.accumulate(block, &[1.0, 2.0], true);
    }
}
