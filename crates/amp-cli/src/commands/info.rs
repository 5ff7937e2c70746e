//! Info command: summarize a weight document.

use anyhow::Result;
use std::path::Path;
use weight_export::ExportDocument;

/// Run the info command.
pub fn run(document: &Path) -> Result<()> {
    let doc = ExportDocument::from_json_file(document)?;

    println!("model_type: {}", doc.config.model_type);
    println!(
        "normalization: mean={} std={}",
        doc.config.norm_mean, doc.config.norm_std
    );
    println!(
        "state_dict: {} leaves, {} parameters",
        doc.state_dict.leaf_count(),
        doc.state_dict.value_count()
    );

    println!("parameters:");
    for (key, value) in &doc.parameters {
        println!("  {key}: {value}");
    }

    if !doc.meta_data.is_empty() {
        println!("meta_data:");
        for (key, value) in &doc.meta_data {
            println!("  {key}: {value}");
        }
    }

    Ok(())
}
