//! # Stats Module
//!
//! The generic multi-slot streaming accumulator behind every reported
//! quantity.
//!
//! ## Overview
//!
//! A [`bin::StatBin`] holds a flat array of slots, each tracking a current
//! value plus sum / sum-of-squares / sample-count over two nested windows: the
//! *interval* window (reset at every output boundary) and the *whole-run*
//! window (reset only by a checkpoint restore). Slot ranges are reserved
//! append-only during setup and never resized afterwards, so column positions
//! stay stable for the lifetime of a run.

pub mod bin;
