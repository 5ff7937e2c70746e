//! Input/output normalization and batch normalization.

use amp_core::{Mode, ModelError, ModelResult, ParamMap};
use candle_core::{DType, Device, Tensor};

use crate::config::NormConfig;
use crate::state::{require_tensor, tensor_data};

/// Batch-norm variance epsilon.
const BN_EPS: f64 = 1e-5;

/// Fixed affine transform applied to raw samples on the way into a model and
/// (for models that denormalize) back out of it.
///
/// Both directions use the identical stored pair, so
/// `denormalise(normalise(x)) == x` up to float rounding.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    mean: f32,
    std: f32,
}

impl Normalizer {
    /// Create a normalizer. `norm_std == 0` is a construction error.
    pub fn new(config: NormConfig) -> ModelResult<Self> {
        if config.norm_std == 0.0 {
            return Err(ModelError::construction(
                "Normalizer",
                "norm_std must be non-zero",
            ));
        }
        Ok(Self {
            mean: config.norm_mean,
            std: config.norm_std,
        })
    }

    /// Stored mean.
    pub fn mean(&self) -> f32 {
        self.mean
    }

    /// Stored standard deviation.
    pub fn std(&self) -> f32 {
        self.std
    }

    /// `(x - mean) / std`
    pub fn normalise(&self, x: &Tensor) -> ModelResult<Tensor> {
        Ok(((x - self.mean as f64)? / self.std as f64)?)
    }

    /// `x * std + mean`
    pub fn denormalise(&self, x: &Tensor) -> ModelResult<Tensor> {
        Ok(((x * self.std as f64)? + self.mean as f64)?)
    }
}

/// Per-channel batch normalization over `[batch, channel, time]` buffers.
///
/// Eval mode applies the stored running statistics; train mode normalizes
/// with biased batch statistics. Neither mode mutates the layer — running
/// statistics only change when a state dict is loaded.
#[derive(Debug, Clone)]
pub struct BatchNorm1d {
    weight: Tensor,
    bias: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    num_channels: usize,
}

impl BatchNorm1d {
    /// Create a batch norm with identity affine and unit running variance.
    pub fn new(num_channels: usize, device: &Device) -> ModelResult<Self> {
        if num_channels == 0 {
            return Err(ModelError::construction(
                "BatchNorm1d",
                "num_channels must be >= 1, got 0",
            ));
        }
        Ok(Self {
            weight: Tensor::ones((num_channels,), DType::F32, device)?,
            bias: Tensor::zeros((num_channels,), DType::F32, device)?,
            running_mean: Tensor::zeros((num_channels,), DType::F32, device)?,
            running_var: Tensor::ones((num_channels,), DType::F32, device)?,
            num_channels,
        })
    }

    /// Normalize `x` of shape `[batch, channel, time]`.
    pub fn forward(&self, x: &Tensor, mode: Mode) -> ModelResult<Tensor> {
        let (_, channels, _) = x.dims3()?;
        if channels != self.num_channels {
            return Err(ModelError::shape_mismatch(
                "BatchNorm1d",
                format!("{} channels", self.num_channels),
                format!("{channels} channels"),
            ));
        }

        let (mean, var) = match mode {
            Mode::Eval => (
                self.running_mean.reshape((1, self.num_channels, 1))?,
                self.running_var.reshape((1, self.num_channels, 1))?,
            ),
            Mode::Train => {
                let mean = x.mean_keepdim(0)?.mean_keepdim(2)?;
                let centered = x.broadcast_sub(&mean)?;
                let var = centered.sqr()?.mean_keepdim(0)?.mean_keepdim(2)?;
                (mean, var)
            }
        };

        let denom = (var + BN_EPS)?.sqrt()?;
        let weight = self.weight.reshape((1, self.num_channels, 1))?;
        let bias = self.bias.reshape((1, self.num_channels, 1))?;
        Ok(x
            .broadcast_sub(&mean)?
            .broadcast_div(&denom)?
            .broadcast_mul(&weight)?
            .broadcast_add(&bias)?)
    }

    /// Describe as `weight`, `bias`, `running_mean`, `running_var` leaves.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_tensor("weight", tensor_data(&self.weight)?);
        map.insert_tensor("bias", tensor_data(&self.bias)?);
        map.insert_tensor("running_mean", tensor_data(&self.running_mean)?);
        map.insert_tensor("running_var", tensor_data(&self.running_var)?);
        Ok(map)
    }

    /// Load all four leaves back, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        let expected = [self.num_channels];
        self.weight = require_tensor(map, "weight", prefix, &expected, device)?;
        self.bias = require_tensor(map, "bias", prefix, &expected, device)?;
        self.running_mean = require_tensor(map, "running_mean", prefix, &expected, device)?;
        self.running_var = require_tensor(map, "running_var", prefix, &expected, device)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalise_denormalise_round_trip() {
        let device = Device::Cpu;
        let norm = Normalizer::new(NormConfig {
            norm_mean: 0.25,
            norm_std: 2.0,
        })
        .unwrap();

        let x = Tensor::new(&[[[-1.0f32, 0.0, 0.5, 2.0]]], &device).unwrap();
        let y = norm.denormalise(&norm.normalise(&x).unwrap()).unwrap();

        let orig: Vec<f32> = x.flatten_all().unwrap().to_vec1().unwrap();
        let back: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        for (a, b) in orig.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_normaliser_rejects_zero_std() {
        let err = Normalizer::new(NormConfig {
            norm_mean: 0.0,
            norm_std: 0.0,
        })
        .unwrap_err();
        assert!(err.to_string().contains("norm_std"));
    }

    #[test]
    fn test_batch_norm_eval_uses_running_stats() {
        let device = Device::Cpu;
        let mut bn = BatchNorm1d::new(1, &device).unwrap();

        // running_mean = 1, running_var = 4 -> y = (x - 1) / sqrt(4 + eps)
        let mut map = ParamMap::new();
        map.insert_tensor(
            "weight",
            tensor_data(&Tensor::ones((1,), DType::F32, &device).unwrap()).unwrap(),
        );
        map.insert_tensor(
            "bias",
            tensor_data(&Tensor::zeros((1,), DType::F32, &device).unwrap()).unwrap(),
        );
        map.insert_tensor(
            "running_mean",
            tensor_data(&Tensor::new(&[1.0f32], &device).unwrap()).unwrap(),
        );
        map.insert_tensor(
            "running_var",
            tensor_data(&Tensor::new(&[4.0f32], &device).unwrap()).unwrap(),
        );
        bn.load_state(&map, "bn1", &device).unwrap();

        let x = Tensor::new(&[[[3.0f32, 5.0]]], &device).unwrap();
        let y: Vec<f32> = bn
            .forward(&x, Mode::Eval)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        assert_relative_eq!(y[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(y[1], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_batch_norm_train_uses_batch_stats() {
        let device = Device::Cpu;
        let bn = BatchNorm1d::new(1, &device).unwrap();

        // Batch mean 1.0, biased variance 1.0 -> normalized to roughly +-1.
        let x = Tensor::new(&[[[0.0f32, 2.0]]], &device).unwrap();
        let y: Vec<f32> = bn
            .forward(&x, Mode::Train)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();

        assert_relative_eq!(y[0], -1.0, epsilon = 1e-2);
        assert_relative_eq!(y[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_batch_norm_rejects_wrong_channel_count() {
        let device = Device::Cpu;
        let bn = BatchNorm1d::new(4, &device).unwrap();
        let x = Tensor::zeros((1, 2, 8), DType::F32, &device).unwrap();
        let err = bn.forward(&x, Mode::Eval).unwrap_err();
        assert!(err.to_string().contains("expected 4 channels"));
    }
}
