//! State-dict plumbing between candle tensors and the parameter tree.
//!
//! Layers describe themselves into a [`ParamMap`] in declaration order and
//! load themselves back out of one, checking shapes against the tensors they
//! were constructed with. All lookup failures carry the full dotted path of
//! the offending leaf.

use amp_core::{join_path, ModelError, ModelResult, ParamMap, TensorData};
use candle_core::{Device, Tensor};
use candle_nn::{Conv1d, Linear};

use crate::norm::Normalizer;

/// Common surface every model exposes to the export layer.
pub trait EffectModel {
    /// Stable model-type tag written into the document config.
    fn model_type(&self) -> &'static str;

    /// The input/output normalizer owned by the model.
    fn normalizer(&self) -> &Normalizer;

    /// Architecture hyperparameters, in document order.
    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value>;

    /// Collect every learnable tensor into a parameter tree, in declaration
    /// order.
    fn state_dict(&self) -> ModelResult<ParamMap>;

    /// Replace every learnable tensor from a parameter tree, validating
    /// shapes.
    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()>;
}

/// Snapshot a tensor into a leaf record (row-major flattening).
pub fn tensor_data(tensor: &Tensor) -> ModelResult<TensorData> {
    Ok(TensorData::new(
        tensor.dims().to_vec(),
        tensor.flatten_all()?.to_vec1::<f32>()?,
    ))
}

/// Rebuild a tensor from a leaf record on the given device.
pub fn tensor_from_data(data: &TensorData, path: &str, device: &Device) -> ModelResult<Tensor> {
    data.validate(path)?;
    Ok(Tensor::from_vec(
        data.values.clone(),
        data.shape.as_slice(),
        device,
    )?)
}

/// Look up a child node, erroring with the full path when absent.
pub fn require_node<'a>(map: &'a ParamMap, name: &str, prefix: &str) -> ModelResult<&'a ParamMap> {
    map.node(name)
        .ok_or_else(|| ModelError::missing_parameter(join_path(prefix, name)))
}

/// Look up a leaf, rebuild its tensor, and check it against an expected shape.
pub fn require_tensor(
    map: &ParamMap,
    name: &str,
    prefix: &str,
    expected: &[usize],
    device: &Device,
) -> ModelResult<Tensor> {
    let path = join_path(prefix, name);
    let data = map
        .tensor(name)
        .ok_or_else(|| ModelError::missing_parameter(path.clone()))?;
    let tensor = tensor_from_data(data, &path, device)?;
    if tensor.dims() != expected {
        return Err(ModelError::shape_mismatch(
            path,
            format!("{expected:?}"),
            format!("{:?}", tensor.dims()),
        ));
    }
    Ok(tensor)
}

/// Describe a convolution as `weight` + `bias` leaves.
pub(crate) fn conv1d_state(conv: &Conv1d) -> ModelResult<ParamMap> {
    let mut map = ParamMap::new();
    map.insert_tensor("weight", tensor_data(conv.weight())?);
    if let Some(bias) = conv.bias() {
        map.insert_tensor("bias", tensor_data(bias)?);
    }
    Ok(map)
}

/// Load a convolution back from `weight` + `bias` leaves.
pub(crate) fn load_conv1d(
    conv: &mut Conv1d,
    map: &ParamMap,
    prefix: &str,
    device: &Device,
) -> ModelResult<()> {
    let weight = require_tensor(map, "weight", prefix, conv.weight().dims(), device)?;
    let bias = match conv.bias() {
        Some(bias) => Some(require_tensor(map, "bias", prefix, bias.dims(), device)?),
        None => None,
    };
    let config = conv.config().clone();
    *conv = Conv1d::new(weight, bias, config);
    Ok(())
}

/// Describe a linear layer as `weight` + `bias` leaves.
pub(crate) fn linear_state(linear: &Linear) -> ModelResult<ParamMap> {
    let mut map = ParamMap::new();
    map.insert_tensor("weight", tensor_data(linear.weight())?);
    if let Some(bias) = linear.bias() {
        map.insert_tensor("bias", tensor_data(bias)?);
    }
    Ok(map)
}

/// Load a linear layer back from `weight` + `bias` leaves.
pub(crate) fn load_linear(
    linear: &mut Linear,
    map: &ParamMap,
    prefix: &str,
    device: &Device,
) -> ModelResult<()> {
    let weight = require_tensor(map, "weight", prefix, linear.weight().dims(), device)?;
    let bias = match linear.bias() {
        Some(bias) => Some(require_tensor(map, "bias", prefix, bias.dims(), device)?),
        None => None,
    };
    *linear = Linear::new(weight, bias);
    Ok(())
}

/// Flatten a serializable config into an ordered JSON map.
pub(crate) fn config_map<T: serde::Serialize>(
    config: &T,
) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(config) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_tensor_round_trip() {
        let device = Device::Cpu;
        let tensor = Tensor::arange(0f32, 6f32, &device)
            .unwrap()
            .reshape((2, 3))
            .unwrap();

        let data = tensor_data(&tensor).unwrap();
        assert_eq!(data.shape, vec![2, 3]);
        assert_eq!(data.values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        let back = tensor_from_data(&data, "t", &device).unwrap();
        assert_eq!(back.dims(), tensor.dims());
        assert_eq!(
            back.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            data.values
        );
    }

    #[test]
    fn test_require_tensor_missing_path() {
        let map = ParamMap::new();
        let err = require_tensor(&map, "weight", "input_conv", &[1], &Device::Cpu).unwrap_err();
        assert_eq!(err.to_string(), "missing parameter leaf: input_conv.weight");
    }

    #[test]
    fn test_require_tensor_shape_check() {
        let device = Device::Cpu;
        let mut map = ParamMap::new();
        let tensor = Tensor::zeros((3,), DType::F32, &device).unwrap();
        map.insert_tensor("bias", tensor_data(&tensor).unwrap());

        let err = require_tensor(&map, "bias", "conv", &[4], &device).unwrap_err();
        assert!(err.to_string().contains("conv.bias"));
        assert!(err.to_string().contains("[4]"));
    }
}
