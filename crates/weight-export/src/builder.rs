//! Reconstruct live models from export documents.
//!
//! The builder is the consumer half of the export contract: it dispatches on
//! `config.model_type`, sizes the architecture from `parameters` *before*
//! touching any tensor values, then loads the state dict with shape
//! checking.

use amp_core::{ModelError, ModelResult};
use candle_core::{Device, Tensor};
use effect_model::{
    ConvWaveshaper, ConvWaveshaperConfig, EffectModel, HammersteinWiener,
    HammersteinWienerConfig, MicroTcn, NormConfig, ResGru, ResLstm, ResRnnConfig, Tcn, TcnConfig,
    WaveNet, WaveNetConfig,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::document::ExportDocument;

/// A model reconstructed from a document, dispatchable without knowing its
/// concrete type.
#[derive(Debug)]
pub enum BuiltModel {
    WaveNet(WaveNet),
    Tcn(Tcn),
    MicroTcn(MicroTcn),
    ConvWaveshaper(ConvWaveshaper),
    HammersteinWiener(HammersteinWiener),
    ResLstm(ResLstm),
    ResGru(ResGru),
}

impl BuiltModel {
    /// Model family tag.
    pub fn model_type(&self) -> &'static str {
        self.as_effect_model().model_type()
    }

    /// The common export surface.
    pub fn as_effect_model(&self) -> &dyn EffectModel {
        match self {
            BuiltModel::WaveNet(m) => m,
            BuiltModel::Tcn(m) => m,
            BuiltModel::MicroTcn(m) => m,
            BuiltModel::ConvWaveshaper(m) => m,
            BuiltModel::HammersteinWiener(m) => m,
            BuiltModel::ResLstm(m) => m,
            BuiltModel::ResGru(m) => m,
        }
    }

    fn as_effect_model_mut(&mut self) -> &mut dyn EffectModel {
        match self {
            BuiltModel::WaveNet(m) => m,
            BuiltModel::Tcn(m) => m,
            BuiltModel::MicroTcn(m) => m,
            BuiltModel::ConvWaveshaper(m) => m,
            BuiltModel::HammersteinWiener(m) => m,
            BuiltModel::ResLstm(m) => m,
            BuiltModel::ResGru(m) => m,
        }
    }

    /// Run one forward pass over `[batch, channels, time]`. Recurrent models
    /// start from zero state; callers that stream should use the concrete
    /// model types and carry state themselves.
    pub fn process(&self, x: &Tensor) -> ModelResult<Tensor> {
        match self {
            BuiltModel::WaveNet(m) => m.forward(x),
            BuiltModel::Tcn(m) => m.forward(x),
            BuiltModel::MicroTcn(m) => m.forward(x),
            BuiltModel::ConvWaveshaper(m) => m.forward(x),
            BuiltModel::HammersteinWiener(m) => {
                let state = m.zero_state(x.dim(0)?)?;
                Ok(m.forward(x, &state)?.0)
            }
            BuiltModel::ResLstm(m) => {
                let state = m.zero_state(x.dim(0)?)?;
                Ok(m.forward(x, &state)?.0)
            }
            BuiltModel::ResGru(m) => {
                let state = m.zero_state(x.dim(0)?)?;
                Ok(m.forward(x, &state)?.0)
            }
        }
    }
}

fn parse_config<T: serde::de::DeserializeOwned>(
    model_type: &str,
    parameters: &Map<String, Value>,
) -> ModelResult<T> {
    serde_json::from_value(Value::Object(parameters.clone())).map_err(|e| {
        ModelError::document(format!("invalid parameters for {model_type}: {e}"))
    })
}

/// Construct a freshly initialized model of the given type.
///
/// This is the path both the builder and the CLI `export` command share: it
/// validates hyperparameters and allocates every tensor, leaving the values
/// random until a state dict is loaded.
pub fn init_model(
    model_type: &str,
    parameters: &Map<String, Value>,
    norm: NormConfig,
    device: &Device,
) -> ModelResult<BuiltModel> {
    match model_type {
        "WaveNet" => {
            let config: WaveNetConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::WaveNet(WaveNet::new(config, norm, device)?))
        }
        "TCN" => {
            let config: TcnConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::Tcn(Tcn::new(config, norm, device)?))
        }
        "MicroTCN" => {
            let config: TcnConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::MicroTcn(MicroTcn::new(config, norm, device)?))
        }
        "ConvWaveshaper" => {
            let config: ConvWaveshaperConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::ConvWaveshaper(ConvWaveshaper::new(
                config, norm, device,
            )?))
        }
        "HammersteinWiener" => {
            let config: HammersteinWienerConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::HammersteinWiener(HammersteinWiener::new(
                config, norm, device,
            )?))
        }
        "ResLSTM" => {
            let config: ResRnnConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::ResLstm(ResLstm::new(config, norm, device)?))
        }
        "ResGRU" => {
            let config: ResRnnConfig = parse_config(model_type, parameters)?;
            Ok(BuiltModel::ResGru(ResGru::new(config, norm, device)?))
        }
        other => Err(ModelError::UnknownModelType(other.to_string())),
    }
}

/// Rebuild the model a document describes and load its weights.
pub fn build(document: &ExportDocument, device: &Device) -> ModelResult<BuiltModel> {
    let norm = NormConfig {
        norm_mean: document.config.norm_mean,
        norm_std: document.config.norm_std,
    };
    let mut model = init_model(
        &document.config.model_type,
        &document.parameters,
        norm,
        device,
    )?;
    model.as_effect_model_mut().load_state_dict(&document.state_dict)?;

    info!(
        model_type = model.model_type(),
        "rebuilt model from document ({} parameters)",
        document.state_dict.value_count()
    );
    Ok(model)
}
