//! Export command: initialize a model from an architecture spec and write
//! its weight document.

use anyhow::{Context, Result};
use candle_core::Device;
use effect_model::NormConfig;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;
use weight_export::{export_with_meta, init_model};

/// Run the export command.
///
/// The architecture spec is a JSON file of the form:
///
/// ```json
/// {
///   "model_type": "WaveNet",
///   "norm_mean": 0.0,
///   "norm_std": 1.0,
///   "parameters": { "input_size": 1, "...": "..." }
/// }
/// ```
pub fn run(spec: &Path, output: &Path, meta: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(spec)
        .with_context(|| format!("reading architecture spec {}", spec.display()))?;
    let value: Value = serde_json::from_str(&content).context("parsing architecture spec")?;
    let obj = value
        .as_object()
        .context("architecture spec must be a JSON object")?;

    let model_type = obj
        .get("model_type")
        .and_then(Value::as_str)
        .context("architecture spec is missing model_type")?;
    let norm = NormConfig {
        norm_mean: obj.get("norm_mean").and_then(Value::as_f64).unwrap_or(0.0) as f32,
        norm_std: obj.get("norm_std").and_then(Value::as_f64).unwrap_or(1.0) as f32,
    };
    let parameters = obj
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .context("architecture spec is missing parameters")?;

    let meta_data: Map<String, Value> = match meta {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading meta data {}", path.display()))?;
            serde_json::from_str(&content).context("parsing meta data")?
        }
        None => Map::new(),
    };

    let model = init_model(model_type, &parameters, norm, &Device::Cpu)?;
    let document = export_with_meta(model.as_effect_model(), meta_data)?;
    document.to_json_file(output)?;

    info!(
        model_type,
        "wrote {} ({} parameters)",
        output.display(),
        document.state_dict.value_count()
    );
    println!(
        "{}: {} parameters -> {}",
        model_type,
        document.state_dict.value_count(),
        output.display()
    );
    Ok(())
}
