//! # mdtally Core Library
//!
//! A streaming-statistics and free-energy accumulation library for long-running
//! molecular simulations, covering the bookkeeping between the physics engines
//! that produce raw per-step energies and the post-processing tools (TI/BAR
//! estimators, running-average reports, checkpoint restart) that consume them.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict two-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the stateless vocabulary of scalar
//!   quantities (`terms`), physical units, and the generic multi-slot streaming
//!   accumulator (`stats`). Nothing in this layer knows about run configuration
//!   or output formats.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer derives the active term
//!   layout from configuration (`registry`), drives per-step accumulation and
//!   derived-scalar computation (`monitor`), collects per-lambda free-energy
//!   samples (`fep`), and bridges accumulator state to checkpoint snapshots
//!   (`history`). All output flows through the abstract [`engine::sink::EnergySink`]
//!   seam; the engine itself never touches a file descriptor.

pub mod core;
pub mod engine;
