//! # Engine Module
//!
//! This module implements the stateful accumulation engine: it derives the
//! active term layout from run configuration, drives per-step statistics and
//! free-energy collection, and bridges accumulator state to checkpoint
//! snapshots.
//!
//! ## Overview
//!
//! The engine receives already-reduced per-step physical inputs, writes them
//! into the core statistics layer, computes derived scalars (volume, density,
//! enthalpy, surface tension, viscous response), and periodically emits
//! energy frames, running-average summaries, and free-energy text lines
//! through an abstract output sink. It owns no files and performs no
//! rendering.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run configuration model, builder, and
//!   TOML loading
//! - **Term Selection** ([`registry`]) - Configuration-driven slot layout,
//!   fixed once at setup
//! - **Per-Step Inputs** ([`inputs`]) - The reduced physical quantities handed
//!   to the engine every step
//! - **Orchestration** ([`monitor`]) - The per-step driver and report builder
//! - **Free Energy** ([`fep`]) - Lambda path, ΔH sample collection, histogram
//!   compression
//! - **Checkpointing** ([`history`]) - Versioned accumulator snapshots for
//!   exact restart
//! - **Output Seam** ([`sink`]) - The delegated stream interface and test
//!   doubles
//! - **Report Types** ([`report`]) - Energy frames and summary tables as pure
//!   data
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod fep;
pub mod history;
pub mod inputs;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod sink;
