//! Process command: run a document's model over a WAV file.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tracing::info;
use weight_export::{build, ExportDocument};

use crate::wav;

/// Run the process command.
pub fn run(document: &Path, input: &Path, output: &Path) -> Result<()> {
    let device = Device::Cpu;
    let doc = ExportDocument::from_json_file(document)?;
    let model = build(&doc, &device)?;

    let (samples, sample_rate) = wav::read_mono(input)?;
    anyhow::ensure!(!samples.is_empty(), "input file contains no samples");
    info!(
        model_type = model.model_type(),
        "processing {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    let len = samples.len();
    let x = Tensor::from_vec(samples, (1, 1, len), &device)?;
    let y = model.process(&x)?;
    let processed: Vec<f32> = y.flatten_all()?.to_vec1()?;

    wav::write_mono(output, &processed, sample_rate)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{}: {} samples -> {}",
        model.model_type(),
        processed.len(),
        output.display()
    );
    Ok(())
}
