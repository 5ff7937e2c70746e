//! Shared value types for the amp modeling workspace.

use serde::{Deserialize, Serialize};

/// Forward-pass mode carried by components with mode-dependent behavior.
///
/// Batch normalization is the only such component: `Eval` applies the stored
/// running statistics, `Train` normalizes with batch statistics. Neither mode
/// mutates the component — accumulating running statistics is the job of an
/// external trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Inference: use stored running statistics.
    #[default]
    Eval,
    /// Training: normalize with per-batch statistics.
    Train,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Eval => write!(f, "eval"),
            Mode::Train => write!(f, "train"),
        }
    }
}
