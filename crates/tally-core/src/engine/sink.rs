use super::report::{EnergyFrame, Summary};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Stream '{stream}' write failed: {source}")]
    Write {
        stream: &'static str,
        source: std::io::Error,
    },

    #[error("Stream '{stream}' is unavailable: {reason}")]
    Unavailable {
        stream: &'static str,
        reason: String,
    },
}

/// The delegated output seam.
///
/// Implementors own stream lifecycle (open, rename-on-overwrite, flush) and
/// rendering; the engine only hands over pure data and one pre-formatted
/// free-energy line per output step.
pub trait EnergySink {
    fn write_frame(&mut self, frame: &EnergyFrame) -> Result<(), SinkError>;

    fn write_summary(&mut self, summary: &Summary) -> Result<(), SinkError>;

    fn write_free_energy_line(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Discards all output. Useful for benchmark and equilibration runs that only
/// need the checkpoint side of the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EnergySink for NullSink {
    fn write_frame(&mut self, _frame: &EnergyFrame) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_summary(&mut self, _summary: &Summary) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_free_energy_line(&mut self, _line: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Buffers everything in memory, for tests and in-process consumers.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub frames: Vec<EnergyFrame>,
    pub summaries: Vec<Summary>,
    pub free_energy_lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnergySink for MemorySink {
    fn write_frame(&mut self, frame: &EnergyFrame) -> Result<(), SinkError> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn write_summary(&mut self, summary: &Summary) -> Result<(), SinkError> {
        self.summaries.push(summary.clone());
        Ok(())
    }

    fn write_free_energy_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.free_energy_lines.push(line.to_string());
        Ok(())
    }
}
