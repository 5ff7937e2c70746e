//! # amp-core
//!
//! Core types for the amp modeling workspace.
//!
//! This crate provides the foundational abstractions used across all other
//! crates in the workspace:
//!
//! - Unified error handling via [`ModelError`]
//! - The insertion-ordered parameter tree ([`ParamMap`], [`TensorData`])
//!   exchanged between models and the export layer
//! - The forward-pass [`Mode`] flag

pub mod error;
pub mod params;
pub mod types;

pub use error::{ModelError, ModelResult};
pub use params::{join_path, ParamEntry, ParamMap, TensorData};
pub use types::Mode;
