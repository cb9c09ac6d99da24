//! # Terms Module
//!
//! The closed vocabulary of scalar quantities a simulation topology can
//! contribute to the energy record, together with the per-topology presence
//! catalog that tells the engine which of them actually occur in a system.
//!
//! - [`kind`] - Interaction/energy kinds and the non-bonded sub-kinds used for
//!   energy-group pair decomposition
//! - [`catalog`] - Topology-derived presence counts per interaction kind

pub mod catalog;
pub mod kind;
