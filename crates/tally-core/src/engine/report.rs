use crate::core::terms::kind::NonBondedKind;
use crate::core::units::Unit;
use crate::engine::fep::collector::DeltaHBlock;

/// One accumulator slot as it appears in a frame: the live value plus the
/// interval window it was recorded under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotRecord {
    pub value: f64,
    pub sum: f64,
    pub sum_sq: f64,
    pub count: u64,
}

/// Instantaneous and time-averaged restraint deviations, carried opaque to
/// the post-processing tools.
#[derive(Debug, Clone, PartialEq)]
pub struct RestraintDiagnostics {
    pub instantaneous: Vec<f64>,
    pub time_averaged: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBlock {
    RestraintDiagnostics(RestraintDiagnostics),
    DeltaH(DeltaHBlock),
}

/// The per-step logical record handed to the sink. Slot labels and units are
/// registry-static and published once at stream setup; frames carry numbers
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyFrame {
    pub step: u64,
    pub time: f64,
    pub dt: f64,
    pub steps_in_window: u64,
    pub samples_in_window: u64,
    pub slots: Vec<SlotRecord>,
    pub blocks: Vec<FrameBlock>,
}

/// Mean and root-mean-square fluctuation of one quantity over the whole-run
/// window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotAverages {
    pub mean: f64,
    pub rmsd: f64,
}

/// One summary-table row; `stats` is absent while the quantity has no
/// samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: String,
    pub unit: Unit,
    pub stats: Option<SlotAverages>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub title: String,
    pub rows: Vec<SummaryRow>,
}

/// Per-pair averages of the enabled non-bonded sub-kinds, one row per
/// energy-group pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPairSummary {
    pub kinds: Vec<NonBondedKind>,
    pub rows: Vec<GroupPairRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupPairRow {
    pub label: String,
    pub cells: Vec<Option<SlotAverages>>,
}

/// Cumulative running-average tables over the whole-run window, as pure data.
/// Rendering belongs to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub steps: u64,
    pub frames: u64,
    pub energies: SummaryTable,
    pub box_dimensions: Option<SummaryTable>,
    pub constraint_virial: Option<SummaryTable>,
    pub force_virial: Option<SummaryTable>,
    pub virial: Option<SummaryTable>,
    pub pressure: Option<SummaryTable>,
    pub dipole: Option<SummaryTable>,
    pub group_pairs: Option<GroupPairSummary>,
    pub temperatures: Option<SummaryTable>,
    pub group_velocities: Option<SummaryTable>,
}

/// Outcome of an AVERAGE report request.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// The whole-run window holds no samples; there is nothing to average.
    InsufficientData { steps: u64 },
    Report(SummaryReport),
}
