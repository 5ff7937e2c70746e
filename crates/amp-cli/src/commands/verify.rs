//! Verify command: rebuild a document's model and check the round trip.

use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tracing::info;
use weight_export::{build, export_with_meta, ExportDocument};

/// Run the verify command.
///
/// Rebuilds the model the document describes, re-exports it, and checks
/// that the two documents serialize identically and that a forward pass on
/// a deterministic input succeeds. Documents using legacy field spellings
/// will load but fail the byte-identity check, since re-export always
/// produces the canonical schema.
pub fn run(document: &Path) -> Result<()> {
    let device = Device::Cpu;
    let doc = ExportDocument::from_json_file(document)?;
    let model = build(&doc, &device)?;

    let re_exported = export_with_meta(model.as_effect_model(), doc.meta_data.clone())?;
    let original_json = doc.to_json_string()?;
    let re_exported_json = re_exported.to_json_string()?;

    if original_json != re_exported_json {
        bail!(
            "document does not round-trip: re-export differs ({} vs {} bytes)",
            original_json.len(),
            re_exported_json.len()
        );
    }

    // Deterministic smoke input: a quiet ramp over every input channel.
    let channels = doc
        .parameters
        .get("input_size")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1) as usize;
    let samples: Vec<f32> = (0..channels * 1000)
        .map(|i| ((i % 1000) as f32 / 1000.0) * 0.1)
        .collect();
    let x = Tensor::from_vec(samples, (1, channels, 1000), &device)?;
    let y = model.process(&x)?;

    info!(model_type = model.model_type(), "verified");
    println!(
        "ok: {} round-trips and produces {} output samples",
        model.model_type(),
        y.dim(2)?
    );
    Ok(())
}
