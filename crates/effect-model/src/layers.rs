//! Neural network layers shared by the model compositions.
//!
//! All layers own their parameter tensors, take `[batch, channel, time]`
//! buffers unless noted otherwise, and describe/load themselves through the
//! parameter tree in declaration order.

use amp_core::{join_path, Mode, ModelError, ModelResult, ParamMap};
use candle_core::{Device, Tensor, D};
use candle_nn::ops::sigmoid;
use candle_nn::{Conv1d, Conv1dConfig, Linear, Module};

use crate::norm::BatchNorm1d;
use crate::state::{
    conv1d_state, linear_state, load_conv1d, load_linear, require_node, require_tensor,
    tensor_data,
};

/// Parametric ReLU: `max(x, 0) + weight * min(x, 0)`, per channel.
fn prelu(x: &Tensor, weight: &Tensor) -> candle_core::Result<Tensor> {
    let zeros = x.zeros_like()?;
    let positive = x.maximum(&zeros)?;
    let negative = x.minimum(&zeros)?;
    let weight = weight.reshape((1, weight.dim(0)?, 1))?;
    positive + negative.broadcast_mul(&weight)?
}

/// Softsign: `x / (1 + |x|)`.
fn softsign(x: &Tensor) -> candle_core::Result<Tensor> {
    let denom = (x.abs()? + 1.0)?;
    x / &denom
}

fn sigmoid_scalar(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Uniformly initialized convolution with a 1-sample kernel.
pub(crate) fn pointwise_conv(
    in_channels: usize,
    out_channels: usize,
    device: &Device,
) -> ModelResult<Conv1d> {
    let bound = (1.0 / in_channels as f32).sqrt();
    let weight = Tensor::rand(-bound, bound, (out_channels, in_channels, 1), device)?;
    let bias = Tensor::rand(-bound, bound, (out_channels,), device)?;
    Ok(Conv1d::new(weight, Some(bias), Conv1dConfig::default()))
}

/// Uniformly initialized linear layer.
pub(crate) fn init_linear(in_size: usize, out_size: usize, device: &Device) -> ModelResult<Linear> {
    let bound = (1.0 / in_size as f32).sqrt();
    let weight = Tensor::rand(-bound, bound, (out_size, in_size), device)?;
    let bias = Tensor::rand(-bound, bound, (out_size,), device)?;
    Ok(Linear::new(weight, Some(bias)))
}

/// A dilated convolution whose output at time `t` depends only on inputs at
/// times `<= t`.
///
/// The input is zero-padded symmetrically by `(kernel_size - 1) * dilation`
/// and the trailing padded samples are discarded, so output length always
/// equals input length. The zero edge policy shapes the first
/// receptive-field samples of any run and is part of the contract.
#[derive(Debug, Clone)]
pub struct CausalConv1d {
    conv: Conv1d,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    dilation: usize,
}

impl CausalConv1d {
    /// Create with uniform random initialization.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(ModelError::construction(
                "CausalConv1d",
                "channel counts must be >= 1",
            ));
        }
        if kernel_size == 0 {
            return Err(ModelError::construction(
                "CausalConv1d",
                "kernel_size must be >= 1, got 0",
            ));
        }
        if dilation == 0 {
            return Err(ModelError::construction(
                "CausalConv1d",
                "dilation must be >= 1, got 0",
            ));
        }

        let padding = (kernel_size - 1) * dilation;
        let bound = (1.0 / (in_channels * kernel_size) as f32).sqrt();
        let weight = Tensor::rand(
            -bound,
            bound,
            (out_channels, in_channels, kernel_size),
            device,
        )?;
        let bias = Tensor::rand(-bound, bound, (out_channels,), device)?;
        let conv = Conv1d::new(
            weight,
            Some(bias),
            Conv1dConfig {
                padding,
                dilation,
                ..Default::default()
            },
        );

        Ok(Self {
            conv,
            in_channels,
            out_channels,
            kernel_size,
            dilation,
        })
    }

    /// Input channel count.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channel count.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Kernel width.
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Tap stride.
    pub fn dilation(&self) -> usize {
        self.dilation
    }

    /// Convolve, preserving the input length.
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let (_, channels, len) = x.dims3()?;
        if channels != self.in_channels {
            return Err(ModelError::shape_mismatch(
                "CausalConv1d",
                format!("{} channels", self.in_channels),
                format!("{channels} channels"),
            ));
        }
        let y = self.conv.forward(x)?;
        // Both pads are applied up front, so the trailing pad's worth of
        // output is acausal and gets dropped.
        Ok(y.narrow(D::Minus1, 0, len)?)
    }

    /// Describe as `weight` + `bias` leaves.
    pub fn state(&self) -> ModelResult<ParamMap> {
        conv1d_state(&self.conv)
    }

    /// Load `weight` + `bias`, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        load_conv1d(&mut self.conv, map, prefix, device)
    }
}

/// WaveNet-style residual block: a causal convolution with optional gated
/// activation, a 1x1 projection feeding both the residual stream and the
/// skip output.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    input_conv: CausalConv1d,
    output_conv: Conv1d,
    num_channels: usize,
    gated: bool,
}

impl ResidualBlock {
    /// Create with uniform random initialization.
    pub fn new(
        num_channels: usize,
        kernel_size: usize,
        dilation: usize,
        gated: bool,
        device: &Device,
    ) -> ModelResult<Self> {
        let conv_out = if gated {
            2 * num_channels
        } else {
            num_channels
        };
        let input_conv = CausalConv1d::new(num_channels, conv_out, kernel_size, dilation, device)?;
        let output_conv = pointwise_conv(num_channels, num_channels, device)?;
        Ok(Self {
            input_conv,
            output_conv,
            num_channels,
            gated,
        })
    }

    /// Returns `(residual stream, skip contribution)`. The residual stream
    /// has the same shape as the input, so blocks stack indefinitely.
    pub fn forward(&self, x: &Tensor) -> ModelResult<(Tensor, Tensor)> {
        let y = if self.gated {
            let z = self.input_conv.forward(x)?;
            // Filter and gate halves, split along the channel axis.
            let filter = z.narrow(1, 0, self.num_channels)?;
            let gate = z.narrow(1, self.num_channels, self.num_channels)?;
            (filter.tanh()? * sigmoid(&gate)?)?
        } else {
            self.input_conv.forward(x)?.tanh()?
        };
        let y = self.output_conv.forward(&y)?;
        Ok(((&y + x)?, y))
    }

    /// Describe as `input_conv` + `output_conv` nodes.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("input_conv", self.input_conv.state()?);
        map.insert_node("output_conv", conv1d_state(&self.output_conv)?);
        Ok(map)
    }

    /// Load both convolutions, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        let node = require_node(map, "input_conv", prefix)?;
        self.input_conv
            .load_state(node, &join_path(prefix, "input_conv"), device)?;
        let node = require_node(map, "output_conv", prefix)?;
        load_conv1d(
            &mut self.output_conv,
            node,
            &join_path(prefix, "output_conv"),
            device,
        )
    }
}

/// Full temporal block: two causal convolution stages (the second always at
/// dilation 1), each followed by PReLU and batch normalization, plus a 1x1
/// shortcut projection used when channel counts differ.
#[derive(Debug, Clone)]
pub struct TcnBlock {
    conv: Conv1d,
    conv1: CausalConv1d,
    f1: PRelu,
    bn1: BatchNorm1d,
    conv2: CausalConv1d,
    f2: PRelu,
    bn2: BatchNorm1d,
    in_channels: usize,
    out_channels: usize,
}

impl TcnBlock {
    /// Create with uniform random initialization.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        Ok(Self {
            conv: pointwise_conv(in_channels, out_channels, device)?,
            conv1: CausalConv1d::new(in_channels, out_channels, kernel_size, dilation, device)?,
            f1: PRelu::new(out_channels, device)?,
            bn1: BatchNorm1d::new(out_channels, device)?,
            conv2: CausalConv1d::new(out_channels, out_channels, kernel_size, 1, device)?,
            f2: PRelu::new(out_channels, device)?,
            bn2: BatchNorm1d::new(out_channels, device)?,
            in_channels,
            out_channels,
        })
    }

    /// `shortcut(x) + bn2(f2(conv2(bn1(f1(conv1(x))))))`
    pub fn forward(&self, x: &Tensor, mode: Mode) -> ModelResult<Tensor> {
        let y = self.bn1.forward(&self.f1.forward(&self.conv1.forward(x)?)?, mode)?;
        let y = self.bn2.forward(&self.f2.forward(&self.conv2.forward(&y)?)?, mode)?;
        let shortcut = if self.in_channels == self.out_channels {
            x.clone()
        } else {
            self.conv.forward(x)?
        };
        Ok((shortcut + y)?)
    }

    /// Describe in document order.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("conv", conv1d_state(&self.conv)?);
        map.insert_node("conv1", self.conv1.state()?);
        map.insert_node("conv2", self.conv2.state()?);
        map.insert_node("bn1", self.bn1.state()?);
        map.insert_node("bn2", self.bn2.state()?);
        map.insert_node("f1", self.f1.state()?);
        map.insert_node("f2", self.f2.state()?);
        Ok(map)
    }

    /// Load every sub-layer, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        load_conv1d(
            &mut self.conv,
            require_node(map, "conv", prefix)?,
            &join_path(prefix, "conv"),
            device,
        )?;
        self.conv1.load_state(
            require_node(map, "conv1", prefix)?,
            &join_path(prefix, "conv1"),
            device,
        )?;
        self.conv2.load_state(
            require_node(map, "conv2", prefix)?,
            &join_path(prefix, "conv2"),
            device,
        )?;
        self.bn1.load_state(
            require_node(map, "bn1", prefix)?,
            &join_path(prefix, "bn1"),
            device,
        )?;
        self.bn2.load_state(
            require_node(map, "bn2", prefix)?,
            &join_path(prefix, "bn2"),
            device,
        )?;
        self.f1.load_state(
            require_node(map, "f1", prefix)?,
            &join_path(prefix, "f1"),
            device,
        )?;
        self.f2.load_state(
            require_node(map, "f2", prefix)?,
            &join_path(prefix, "f2"),
            device,
        )
    }
}

/// Single-stage temporal block: one causal convolution, PReLU, batch norm,
/// and the same shortcut rule as [`TcnBlock`].
#[derive(Debug, Clone)]
pub struct MicroTcnBlock {
    conv: Conv1d,
    conv1: CausalConv1d,
    f1: PRelu,
    bn1: BatchNorm1d,
    in_channels: usize,
    out_channels: usize,
}

impl MicroTcnBlock {
    /// Create with uniform random initialization.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        Ok(Self {
            conv: pointwise_conv(in_channels, out_channels, device)?,
            conv1: CausalConv1d::new(in_channels, out_channels, kernel_size, dilation, device)?,
            f1: PRelu::new(out_channels, device)?,
            bn1: BatchNorm1d::new(out_channels, device)?,
            in_channels,
            out_channels,
        })
    }

    /// `shortcut(x) + bn1(f1(conv1(x)))`
    pub fn forward(&self, x: &Tensor, mode: Mode) -> ModelResult<Tensor> {
        let y = self.bn1.forward(&self.f1.forward(&self.conv1.forward(x)?)?, mode)?;
        let shortcut = if self.in_channels == self.out_channels {
            x.clone()
        } else {
            self.conv.forward(x)?
        };
        Ok((shortcut + y)?)
    }

    /// Describe in document order.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("conv", conv1d_state(&self.conv)?);
        map.insert_node("conv1", self.conv1.state()?);
        map.insert_node("bn1", self.bn1.state()?);
        map.insert_node("f1", self.f1.state()?);
        Ok(map)
    }

    /// Load every sub-layer, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        load_conv1d(
            &mut self.conv,
            require_node(map, "conv", prefix)?,
            &join_path(prefix, "conv"),
            device,
        )?;
        self.conv1.load_state(
            require_node(map, "conv1", prefix)?,
            &join_path(prefix, "conv1"),
            device,
        )?;
        self.bn1.load_state(
            require_node(map, "bn1", prefix)?,
            &join_path(prefix, "bn1"),
            device,
        )?;
        self.f1.load_state(
            require_node(map, "f1", prefix)?,
            &join_path(prefix, "f1"),
            device,
        )
    }
}

/// Per-channel parametric ReLU with a learnable negative slope.
#[derive(Debug, Clone)]
pub struct PRelu {
    weight: Tensor,
    num_channels: usize,
}

impl PRelu {
    /// Create with the conventional 0.25 slope.
    pub fn new(num_channels: usize, device: &Device) -> ModelResult<Self> {
        Ok(Self {
            weight: Tensor::full(0.25f32, (num_channels,), device)?,
            num_channels,
        })
    }

    /// Apply to a `[batch, channel, time]` buffer.
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        Ok(prelu(x, &self.weight)?)
    }

    /// Describe as a single `weight` leaf.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_tensor("weight", tensor_data(&self.weight)?);
        Ok(map)
    }

    /// Load the slope, checking shape.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        self.weight = require_tensor(map, "weight", prefix, &[self.num_channels], device)?;
        Ok(())
    }
}

/// Fully-connected head with a residual/direct shortcut.
///
/// Operates on the trailing axis, so callers feed `[batch, time, features]`.
/// The direct projection is always constructed and exported; the forward
/// pass only routes through it when input and output widths differ.
#[derive(Debug, Clone)]
pub struct PlainSequential {
    direct_linear: Linear,
    input_linear: Linear,
    hidden_linear: Vec<Linear>,
    output_linear: Linear,
    input_size: usize,
    output_size: usize,
    hidden_size: usize,
}

impl PlainSequential {
    /// Create with uniform random initialization.
    pub fn new(
        input_size: usize,
        output_size: usize,
        hidden_size: usize,
        num_hidden_layers: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        if input_size == 0 || output_size == 0 || hidden_size == 0 {
            return Err(ModelError::construction(
                "PlainSequential",
                "sizes must be >= 1",
            ));
        }
        let mut hidden_linear = Vec::with_capacity(num_hidden_layers);
        for _ in 0..num_hidden_layers {
            hidden_linear.push(init_linear(hidden_size, hidden_size, device)?);
        }
        Ok(Self {
            direct_linear: init_linear(input_size, output_size, device)?,
            input_linear: init_linear(input_size, hidden_size, device)?,
            hidden_linear,
            output_linear: init_linear(hidden_size, output_size, device)?,
            input_size,
            output_size,
            hidden_size,
        })
    }

    /// Input width.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Output width.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Hidden width.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Hidden layer count.
    pub fn num_hidden_layers(&self) -> usize {
        self.hidden_linear.len()
    }

    /// `output_linear(relu chain) + shortcut(x)`
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let mut y = self.input_linear.forward(x)?.relu()?;
        for layer in &self.hidden_linear {
            y = layer.forward(&y)?.relu()?;
        }
        let y = self.output_linear.forward(&y)?;
        let shortcut = if self.input_size == self.output_size {
            x.clone()
        } else {
            self.direct_linear.forward(x)?
        };
        Ok((shortcut + y)?)
    }

    /// Describe in document order: direct, input, output, then hidden layers.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("direct_linear", linear_state(&self.direct_linear)?);
        map.insert_node("input_linear", linear_state(&self.input_linear)?);
        map.insert_node("output_linear", linear_state(&self.output_linear)?);
        for (i, layer) in self.hidden_linear.iter().enumerate() {
            map.insert_node(format!("hidden_linear.{i}"), linear_state(layer)?);
        }
        Ok(map)
    }

    /// Load every projection, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        load_linear(
            &mut self.direct_linear,
            require_node(map, "direct_linear", prefix)?,
            &join_path(prefix, "direct_linear"),
            device,
        )?;
        load_linear(
            &mut self.input_linear,
            require_node(map, "input_linear", prefix)?,
            &join_path(prefix, "input_linear"),
            device,
        )?;
        load_linear(
            &mut self.output_linear,
            require_node(map, "output_linear", prefix)?,
            &join_path(prefix, "output_linear"),
            device,
        )?;
        for (i, layer) in self.hidden_linear.iter_mut().enumerate() {
            let name = format!("hidden_linear.{i}");
            load_linear(
                layer,
                require_node(map, &name, prefix)?,
                &join_path(prefix, &name),
                device,
            )?;
        }
        Ok(())
    }
}

/// Causal convolution followed by learnable soft saturation and a learnable
/// hard clip.
#[derive(Debug, Clone)]
pub struct ConvClipper {
    conv: CausalConv1d,
    floor: Tensor,
    ceiling: Tensor,
    coef_softsign: Tensor,
    coef_tanh: Tensor,
}

impl ConvClipper {
    /// Create with uniform random convolution weights; the clip bounds start
    /// at zero (clip range `[-0.5, 0.5]`) and the saturation coefficients
    /// start from a unit normal draw.
    pub fn new(
        input_size: usize,
        output_size: usize,
        kernel_size: usize,
        dilation: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        Ok(Self {
            conv: CausalConv1d::new(input_size, output_size, kernel_size, dilation, device)?,
            floor: Tensor::zeros((1,), candle_core::DType::F32, device)?,
            ceiling: Tensor::zeros((1,), candle_core::DType::F32, device)?,
            coef_softsign: Tensor::randn(0f32, 1.0, (1,), device)?,
            coef_tanh: Tensor::randn(0f32, 1.0, (1,), device)?,
        })
    }

    /// Convolve, saturate, clip.
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let coef_softsign = self.coef_softsign.to_vec1::<f32>()?[0];
        let coef_tanh = self.coef_tanh.to_vec1::<f32>()?[0];
        let floor = self.floor.to_vec1::<f32>()?[0];
        let ceiling = self.ceiling.to_vec1::<f32>()?[0];

        let y = self.conv.forward(x)?;
        let y = (&y + softsign(&(&y * coef_softsign as f64)?)?)?;
        let y = (&y + (&y * coef_tanh as f64)?.tanh()?)?;
        let lo = -sigmoid_scalar(5.0 * floor);
        let hi = sigmoid_scalar(5.0 * ceiling);
        Ok(y.clamp(lo as f64, hi as f64)?)
    }

    /// Describe in document order.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("conv", self.conv.state()?);
        map.insert_tensor("floor", tensor_data(&self.floor)?);
        map.insert_tensor("ceiling", tensor_data(&self.ceiling)?);
        map.insert_tensor("coef_softsign", tensor_data(&self.coef_softsign)?);
        map.insert_tensor("coef_tanh", tensor_data(&self.coef_tanh)?);
        Ok(map)
    }

    /// Load the convolution and the four scalar parameters.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        self.conv.load_state(
            require_node(map, "conv", prefix)?,
            &join_path(prefix, "conv"),
            device,
        )?;
        self.floor = require_tensor(map, "floor", prefix, &[1], device)?;
        self.ceiling = require_tensor(map, "ceiling", prefix, &[1], device)?;
        self.coef_softsign = require_tensor(map, "coef_softsign", prefix, &[1], device)?;
        self.coef_tanh = require_tensor(map, "coef_tanh", prefix, &[1], device)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_core::DType;

    #[test]
    fn test_causal_conv_rejects_bad_construction() {
        let device = Device::Cpu;
        assert!(CausalConv1d::new(1, 1, 0, 1, &device).is_err());
        assert!(CausalConv1d::new(1, 1, 3, 0, &device).is_err());
        assert!(CausalConv1d::new(0, 1, 3, 1, &device).is_err());
    }

    #[test]
    fn test_causal_conv_preserves_length() {
        let device = Device::Cpu;
        for (kernel_size, dilation) in [(1, 1), (1, 4), (2, 1), (3, 2), (5, 8)] {
            let conv = CausalConv1d::new(1, 2, kernel_size, dilation, &device).unwrap();
            let x = Tensor::randn(0f32, 1.0, (1, 1, 64), &device).unwrap();
            let y = conv.forward(&x).unwrap();
            assert_eq!(y.dims(), &[1, 2, 64], "k={kernel_size} d={dilation}");
        }
    }

    #[test]
    fn test_causal_conv_rejects_wrong_channels() {
        let device = Device::Cpu;
        let conv = CausalConv1d::new(2, 2, 3, 1, &device).unwrap();
        let x = Tensor::zeros((1, 3, 16), DType::F32, &device).unwrap();
        assert!(conv.forward(&x).is_err());
    }

    #[test]
    fn test_residual_block_shape_invariant() {
        let device = Device::Cpu;
        for gated in [false, true] {
            let block = ResidualBlock::new(4, 3, 2, gated, &device).unwrap();
            let x = Tensor::randn(0f32, 1.0, (1, 4, 32), &device).unwrap();
            let (residual, skip) = block.forward(&x).unwrap();
            assert_eq!(residual.dims(), x.dims());
            assert_eq!(skip.dims(), x.dims());
        }
    }

    #[test]
    fn test_tcn_block_projects_channel_mismatch() {
        let device = Device::Cpu;
        let block = TcnBlock::new(1, 6, 3, 4, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 32), &device).unwrap();
        let y = block.forward(&x, Mode::Eval).unwrap();
        assert_eq!(y.dims(), &[1, 6, 32]);
    }

    #[test]
    fn test_micro_tcn_block_identity_shortcut_shape() {
        let device = Device::Cpu;
        let block = MicroTcnBlock::new(6, 6, 3, 2, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (2, 6, 16), &device).unwrap();
        let y = block.forward(&x, Mode::Eval).unwrap();
        assert_eq!(y.dims(), x.dims());
    }

    #[test]
    fn test_prelu_negative_slope() {
        let device = Device::Cpu;
        let act = PRelu::new(1, &device).unwrap();
        let x = Tensor::new(&[[[-2.0f32, 2.0]]], &device).unwrap();
        let y: Vec<f32> = act
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_relative_eq!(y[0], -0.5, epsilon = 1e-6);
        assert_relative_eq!(y[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_plain_sequential_shapes() {
        let device = Device::Cpu;
        let head = PlainSequential::new(6, 1, 8, 2, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 32, 6), &device).unwrap();
        let y = head.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 32, 1]);
        assert_eq!(head.num_hidden_layers(), 2);
    }

    #[test]
    fn test_conv_clipper_output_bounded() {
        let device = Device::Cpu;
        let clipper = ConvClipper::new(1, 1, 8, 2, &device).unwrap();
        let x = Tensor::randn(0f32, 10.0, (1, 1, 128), &device).unwrap();
        let y: Vec<f32> = clipper
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        // floor/ceiling start at zero, so the clip range is [-0.5, 0.5].
        for value in y {
            assert!((-0.5..=0.5).contains(&value));
        }
    }

    #[test]
    fn test_state_round_trip_preserves_output() {
        let device = Device::Cpu;
        let mut block = ResidualBlock::new(3, 3, 2, true, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 3, 24), &device).unwrap();
        let (expected, _) = block.forward(&x).unwrap();

        let state = block.state().unwrap();
        block.load_state(&state, "block", &device).unwrap();
        let (actual, _) = block.forward(&x).unwrap();

        let expected: Vec<f32> = expected.flatten_all().unwrap().to_vec1().unwrap();
        let actual: Vec<f32> = actual.flatten_all().unwrap().to_vec1().unwrap();
        for (a, b) in expected.iter().zip(actual.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }
}
