//! The generic tree-walking exporter.
//!
//! One code path serves every model: the model describes its parameter tree
//! in declaration order through [`EffectModel::state_dict`], and the
//! exporter validates every leaf before emitting a document. A model that
//! cannot produce a complete, consistent tree fails the whole export rather
//! than yielding a partial document.

use amp_core::ModelResult;
use effect_model::EffectModel;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::document::{DocumentConfig, ExportDocument};

/// Export a model with no caller annotations.
pub fn export(model: &dyn EffectModel) -> ModelResult<ExportDocument> {
    export_with_meta(model, Map::new())
}

/// Export a model, attaching caller-supplied `meta_data`.
pub fn export_with_meta(
    model: &dyn EffectModel,
    meta_data: Map<String, Value>,
) -> ModelResult<ExportDocument> {
    let state_dict = model.state_dict()?;
    state_dict.validate("")?;

    debug!(
        leaves = state_dict.leaf_count(),
        values = state_dict.value_count(),
        "collected state dict"
    );

    let normalizer = model.normalizer();
    let document = ExportDocument {
        config: DocumentConfig {
            model_type: model.model_type().to_string(),
            norm_mean: normalizer.mean(),
            norm_std: normalizer.std(),
        },
        meta_data,
        parameters: model.hyper_parameters(),
        state_dict,
    };

    info!(
        model_type = model.model_type(),
        "exported {} parameters",
        document.state_dict.value_count()
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use effect_model::{NormConfig, ResRnnConfig, ResLstm};

    #[test]
    fn test_export_carries_norm_and_parameters() {
        let device = Device::Cpu;
        let config = ResRnnConfig {
            input_size: 1,
            output_size: 1,
            hidden_size: 3,
            ps_hidden_size: 4,
            ps_num_hidden_layers: 1,
        };
        let norm = NormConfig {
            norm_mean: 0.1,
            norm_std: 0.9,
        };
        let model = ResLstm::new(config, norm, &device).unwrap();

        let doc = export(&model).unwrap();
        assert_eq!(doc.config.model_type, "ResLSTM");
        assert!((doc.config.norm_mean - 0.1).abs() < 1e-6);
        assert!((doc.config.norm_std - 0.9).abs() < 1e-6);
        assert_eq!(doc.parameters.get("hidden_size").unwrap(), 3);
        assert!(doc.state_dict.node("rnn").is_some());
    }

    #[test]
    fn test_export_with_meta_round_trips_annotations() {
        let device = Device::Cpu;
        let config = ResRnnConfig {
            input_size: 1,
            output_size: 1,
            hidden_size: 2,
            ps_hidden_size: 2,
            ps_num_hidden_layers: 0,
        };
        let model = ResLstm::new(config, NormConfig::default(), &device).unwrap();

        let mut meta = Map::new();
        meta.insert("device_under_test".into(), Value::from("tube screamer"));
        let doc = export_with_meta(&model, meta).unwrap();

        let parsed = ExportDocument::from_json_str(&doc.to_json_string().unwrap()).unwrap();
        assert_eq!(
            parsed.meta_data.get("device_under_test").unwrap(),
            "tube screamer"
        );
    }
}
