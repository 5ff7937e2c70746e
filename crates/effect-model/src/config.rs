//! Model architecture configurations.
//!
//! Every model is constructed from an explicit, fully-enumerated config.
//! Hyperparameter validation happens here, at construction time, so forward
//! passes never have to re-check construction contracts. Serde field order
//! matches the `parameters` section of the export document.

use amp_core::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Input/output normalization constants, owned by every model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormConfig {
    /// Mean subtracted on the way in, added back on the way out.
    pub norm_mean: f32,
    /// Standard deviation divided on the way in, multiplied on the way out.
    pub norm_std: f32,
}

impl Default for NormConfig {
    fn default() -> Self {
        Self {
            norm_mean: 0.0,
            norm_std: 1.0,
        }
    }
}

/// WaveNet-style stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveNetConfig {
    /// Input channel count.
    pub input_size: usize,
    /// Output channel count.
    pub output_size: usize,
    /// Residual/skip channel count inside the stack.
    pub num_channels: usize,
    /// Convolution kernel width.
    pub kernel_size: usize,
    /// Dilation schedule, cycled through `stack_size` times.
    pub dilations: Vec<usize>,
    /// Number of repetitions of the dilation schedule.
    pub stack_size: usize,
    /// Whether residual blocks use the gated tanh/sigmoid activation.
    pub gated: bool,
    /// Hidden channel count of the 1x1 post-processing pair.
    pub hidden_size: usize,
}

impl WaveNetConfig {
    /// Total number of residual blocks in the stack.
    pub fn block_count(&self) -> usize {
        self.stack_size * self.dilations.len()
    }

    /// Number of past input samples one output sample can depend on.
    pub fn receptive_field(&self) -> usize {
        let per_cycle: usize = self
            .dilations
            .iter()
            .map(|d| 2 * (self.kernel_size - 1) * d)
            .sum();
        1 + self.stack_size * per_cycle
    }

    /// Check construction contracts.
    pub fn validate(&self) -> ModelResult<()> {
        check_positive("WaveNet", "input_size", self.input_size)?;
        check_positive("WaveNet", "output_size", self.output_size)?;
        check_positive("WaveNet", "num_channels", self.num_channels)?;
        check_positive("WaveNet", "kernel_size", self.kernel_size)?;
        check_positive("WaveNet", "stack_size", self.stack_size)?;
        check_positive("WaveNet", "hidden_size", self.hidden_size)?;
        check_dilations("WaveNet", &self.dilations)
    }
}

/// Configuration shared by the TCN and MicroTCN block stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcnConfig {
    /// Input channel count.
    pub input_size: usize,
    /// Block channel count.
    pub hidden_size: usize,
    /// Output channel count.
    pub output_size: usize,
    /// Convolution kernel width.
    pub kernel_size: usize,
    /// Number of blocks; block `i` uses dilation `2^i`.
    pub stack_size: usize,
    /// Hidden width of the PlainSequential head.
    pub ps_hidden_size: usize,
    /// Hidden layer count of the PlainSequential head.
    pub ps_num_hidden_layers: usize,
}

impl TcnConfig {
    /// Check construction contracts. `kind` names the model in errors.
    pub fn validate(&self, kind: &str) -> ModelResult<()> {
        check_positive(kind, "input_size", self.input_size)?;
        check_positive(kind, "hidden_size", self.hidden_size)?;
        check_positive(kind, "output_size", self.output_size)?;
        check_positive(kind, "kernel_size", self.kernel_size)?;
        check_positive(kind, "stack_size", self.stack_size)?;
        check_positive(kind, "ps_hidden_size", self.ps_hidden_size)
    }
}

/// Cascaded ConvClipper waveshaper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvWaveshaperConfig {
    /// Convolution kernel width of every clipper stage.
    pub kernel_size: usize,
    /// Number of clipper stages; stage `i` uses dilation `2^i`.
    pub depth_size: usize,
    /// Channel count of the interior stages.
    pub num_channels: usize,
}

impl ConvWaveshaperConfig {
    /// Check construction contracts.
    pub fn validate(&self) -> ModelResult<()> {
        check_positive("ConvWaveshaper", "kernel_size", self.kernel_size)?;
        check_positive("ConvWaveshaper", "num_channels", self.num_channels)?;
        if self.depth_size < 2 {
            return Err(ModelError::construction(
                "ConvWaveshaper",
                format!("depth_size must be >= 2, got {}", self.depth_size),
            ));
        }
        Ok(())
    }
}

/// Hammerstein-Wiener configuration: static nonlinearity, LSTM memory,
/// static output nonlinearity, plus a dry skip path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HammersteinWienerConfig {
    /// Input channel count.
    pub input_size: usize,
    /// Width of the input (Hammerstein) nonlinearity.
    pub linear_input_size: usize,
    /// LSTM hidden size (the linear dynamic stage).
    pub linear_output_size: usize,
    /// Width of the output (Wiener) nonlinearity.
    pub hidden_size: usize,
    /// Output channel count.
    pub output_size: usize,
}

impl HammersteinWienerConfig {
    /// Check construction contracts.
    pub fn validate(&self) -> ModelResult<()> {
        check_positive("HammersteinWiener", "input_size", self.input_size)?;
        check_positive(
            "HammersteinWiener",
            "linear_input_size",
            self.linear_input_size,
        )?;
        check_positive(
            "HammersteinWiener",
            "linear_output_size",
            self.linear_output_size,
        )?;
        check_positive("HammersteinWiener", "hidden_size", self.hidden_size)?;
        check_positive("HammersteinWiener", "output_size", self.output_size)
    }
}

/// Residual recurrent model configuration (shared by ResLSTM and ResGRU).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResRnnConfig {
    /// Input channel count.
    pub input_size: usize,
    /// Output channel count.
    pub output_size: usize,
    /// RNN hidden size.
    pub hidden_size: usize,
    /// Hidden width of the PlainSequential head.
    pub ps_hidden_size: usize,
    /// Hidden layer count of the PlainSequential head.
    pub ps_num_hidden_layers: usize,
}

impl ResRnnConfig {
    /// Check construction contracts. `kind` names the model in errors.
    pub fn validate(&self, kind: &str) -> ModelResult<()> {
        check_positive(kind, "input_size", self.input_size)?;
        check_positive(kind, "output_size", self.output_size)?;
        check_positive(kind, "hidden_size", self.hidden_size)?;
        check_positive(kind, "ps_hidden_size", self.ps_hidden_size)
    }
}

fn check_positive(component: &str, field: &str, value: usize) -> ModelResult<()> {
    if value == 0 {
        return Err(ModelError::construction(
            component,
            format!("{field} must be >= 1, got 0"),
        ));
    }
    Ok(())
}

fn check_dilations(component: &str, dilations: &[usize]) -> ModelResult<()> {
    if dilations.is_empty() {
        return Err(ModelError::construction(component, "empty dilation schedule"));
    }
    for (i, &d) in dilations.iter().enumerate() {
        if d == 0 {
            return Err(ModelError::construction(
                component,
                format!("dilations[{i}] must be >= 1, got 0"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavenet_config() -> WaveNetConfig {
        WaveNetConfig {
            input_size: 1,
            output_size: 1,
            num_channels: 8,
            kernel_size: 3,
            dilations: vec![1, 2, 4, 8],
            stack_size: 2,
            gated: true,
            hidden_size: 16,
        }
    }

    #[test]
    fn test_wavenet_receptive_field() {
        let config = wavenet_config();
        // 1 + 2 * (2*2*1 + 2*2*2 + 2*2*4 + 2*2*8) = 1 + 2 * 60
        assert_eq!(config.receptive_field(), 121);
        assert_eq!(config.block_count(), 8);
    }

    #[test]
    fn test_wavenet_rejects_zero_kernel() {
        let mut config = wavenet_config();
        config.kernel_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kernel_size"));
    }

    #[test]
    fn test_wavenet_rejects_zero_dilation() {
        let mut config = wavenet_config();
        config.dilations = vec![1, 0, 4];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dilations[1]"));
    }

    #[test]
    fn test_waveshaper_rejects_shallow_stack() {
        let config = ConvWaveshaperConfig {
            kernel_size: 16,
            depth_size: 1,
            num_channels: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_norm_config_default() {
        let norm = NormConfig::default();
        assert_eq!(norm.norm_mean, 0.0);
        assert_eq!(norm.norm_std, 1.0);
    }

    #[test]
    fn test_parameters_round_trip_json() {
        let config = wavenet_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: WaveNetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dilations, config.dilations);
        assert!(back.gated);
    }
}
