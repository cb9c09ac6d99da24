//! # Core Module
//!
//! This module provides the fundamental building blocks for energy accumulation:
//! the vocabulary of scalar quantities a simulation can report, their physical
//! units, and the generic streaming accumulator the engine layer writes into.
//!
//! ## Overview
//!
//! Everything in this layer is independent of run configuration and output
//! formats. The engine layer decides *which* quantities are active for a given
//! run; the core defines *what* those quantities are and how their running
//! statistics are maintained.
//!
//! ## Architecture
//!
//! - **Quantity Vocabulary** ([`terms`]) - Interaction/energy kinds, non-bonded
//!   sub-kinds, and the topology-derived presence catalog
//! - **Physical Units** ([`units`]) - Canonical reporting units and the
//!   conversion constants used by derived-scalar computations
//! - **Streaming Statistics** ([`stats`]) - The multi-slot accumulator with
//!   nested interval/whole-run windows and checkpoint snapshots

pub mod stats;
pub mod terms;
pub mod units;
