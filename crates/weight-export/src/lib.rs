//! # weight-export
//!
//! The portable weight-export contract for the amp model family.
//!
//! A trained model is serialized into a nested, named JSON document whose
//! leaves carry `{shape, values}` records, alongside the architecture
//! hyperparameters needed to rebuild the model before loading any values.
//! The same crate consumes documents ([`build`]), which is what makes
//! export/import round-trips testable end to end:
//!
//! ```ignore
//! use weight_export::{build, export};
//!
//! let doc = export(&model)?;
//! let rebuilt = build(&doc, &device)?;
//! // rebuilt.process(&x) now matches model.forward(&x) bit for bit.
//! ```

pub mod builder;
pub mod document;
pub mod exporter;

pub use builder::{build, init_model, BuiltModel};
pub use document::{DocumentConfig, ExportDocument};
pub use exporter::{export, export_with_meta};
