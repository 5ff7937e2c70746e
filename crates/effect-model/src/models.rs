//! Model compositions.
//!
//! Each model is a fixed pipeline over the layers in this crate, owns its
//! [`Normalizer`], and is constructed from an explicit config plus
//! normalization constants. Stateless models expose
//! `forward(&self, x) -> Tensor`; recurrent models additionally take and
//! return caller-owned state.

use amp_core::{Mode, ModelResult, ParamMap};
use candle_core::{Device, Tensor};
use candle_nn::{Conv1d, Linear, Module};
use tracing::{debug, info, instrument};

use crate::config::{
    ConvWaveshaperConfig, HammersteinWienerConfig, NormConfig, ResRnnConfig, TcnConfig,
    WaveNetConfig,
};
use crate::layers::{
    init_linear, pointwise_conv, CausalConv1d, ConvClipper, MicroTcnBlock, PlainSequential,
    ResidualBlock, TcnBlock,
};
use crate::norm::Normalizer;
use crate::recurrent::{Gru, GruState, Lstm, LstmState};
use crate::state::{
    config_map, conv1d_state, linear_state, load_conv1d, load_linear, require_node, EffectModel,
};

/// WaveNet-style stack: input convolution, gated residual blocks with skip
/// accumulation, and a two-stage 1x1 post-processing head.
///
/// The skip sum is scaled by `1/sqrt(block_count)` so activation magnitude
/// stays stable regardless of stack depth.
#[derive(Debug, Clone)]
pub struct WaveNet {
    input_conv: CausalConv1d,
    block_stack: Vec<ResidualBlock>,
    post_conv1: Conv1d,
    post_conv2: Conv1d,
    skip_scale: f64,
    config: WaveNetConfig,
    norm: Normalizer,
    device: Device,
}

impl WaveNet {
    /// Create with random initialization.
    pub fn new(config: WaveNetConfig, norm: NormConfig, device: &Device) -> ModelResult<Self> {
        config.validate()?;
        let norm = Normalizer::new(norm)?;

        let input_conv = CausalConv1d::new(
            config.input_size,
            config.num_channels,
            config.kernel_size,
            1,
            device,
        )?;

        let block_count = config.block_count();
        let mut block_stack = Vec::with_capacity(block_count);
        for i in 0..block_count {
            let dilation = config.dilations[i % config.dilations.len()];
            debug!("building residual block {}/{block_count} (dilation {dilation})", i + 1);
            block_stack.push(ResidualBlock::new(
                config.num_channels,
                config.kernel_size,
                dilation,
                config.gated,
                device,
            )?);
        }

        let post_conv1 = pointwise_conv(config.num_channels, config.hidden_size, device)?;
        let post_conv2 = pointwise_conv(config.hidden_size, config.output_size, device)?;

        info!(
            "WaveNet: {} blocks, {} channels, receptive field {}",
            block_count,
            config.num_channels,
            config.receptive_field()
        );

        Ok(Self {
            input_conv,
            block_stack,
            post_conv1,
            post_conv2,
            skip_scale: 1.0 / (block_count as f64).sqrt(),
            config,
            norm,
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &WaveNetConfig {
        &self.config
    }

    /// Process a `[batch, input_size, time]` buffer.
    #[instrument(skip(self, x))]
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let x = self.norm.normalise(x)?;
        let mut y = self.input_conv.forward(&x)?;
        let mut skip_sum = y.zeros_like()?;
        for block in &self.block_stack {
            let (next, skip) = block.forward(&y)?;
            y = next;
            skip_sum = (skip_sum + skip)?;
        }
        let out = (skip_sum * self.skip_scale)?.relu()?;
        let out = self.post_conv1.forward(&out)?.relu()?;
        let out = self.post_conv2.forward(&out)?;
        self.norm.denormalise(&out)
    }
}

impl EffectModel for WaveNet {
    fn model_type(&self) -> &'static str {
        "WaveNet"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("input_conv", self.input_conv.state()?);
        map.insert_node("post_conv1", conv1d_state(&self.post_conv1)?);
        map.insert_node("post_conv2", conv1d_state(&self.post_conv2)?);
        for (i, block) in self.block_stack.iter().enumerate() {
            map.insert_node(format!("block_stack.{i}"), block.state()?);
        }
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        self.input_conv
            .load_state(require_node(state, "input_conv", "")?, "input_conv", &device)?;
        load_conv1d(
            &mut self.post_conv1,
            require_node(state, "post_conv1", "")?,
            "post_conv1",
            &device,
        )?;
        load_conv1d(
            &mut self.post_conv2,
            require_node(state, "post_conv2", "")?,
            "post_conv2",
            &device,
        )?;
        for (i, block) in self.block_stack.iter_mut().enumerate() {
            let name = format!("block_stack.{i}");
            block.load_state(require_node(state, &name, "")?, &name, &device)?;
        }
        Ok(())
    }
}

/// Temporal convolutional network: a stack of [`TcnBlock`]s with doubling
/// dilations feeding a [`PlainSequential`] head.
#[derive(Debug, Clone)]
pub struct Tcn {
    block_stack: Vec<TcnBlock>,
    plain_sequential: PlainSequential,
    config: TcnConfig,
    norm: Normalizer,
    mode: Mode,
    device: Device,
}

impl Tcn {
    /// Create with random initialization.
    pub fn new(config: TcnConfig, norm: NormConfig, device: &Device) -> ModelResult<Self> {
        config.validate("TCN")?;
        let norm = Normalizer::new(norm)?;

        let mut block_stack = Vec::with_capacity(config.stack_size);
        for i in 0..config.stack_size {
            let in_channels = if i == 0 {
                config.input_size
            } else {
                config.hidden_size
            };
            block_stack.push(TcnBlock::new(
                in_channels,
                config.hidden_size,
                config.kernel_size,
                1usize << i,
                device,
            )?);
        }

        let plain_sequential = PlainSequential::new(
            config.hidden_size,
            config.output_size,
            config.ps_hidden_size,
            config.ps_num_hidden_layers,
            device,
        )?;

        info!(
            "TCN: {} blocks, {} channels",
            config.stack_size, config.hidden_size
        );

        Ok(Self {
            block_stack,
            plain_sequential,
            config,
            norm,
            mode: Mode::default(),
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &TcnConfig {
        &self.config
    }

    /// Current forward mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch between eval and train batch-norm behavior.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Process a `[batch, input_size, time]` buffer.
    #[instrument(skip(self, x))]
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let mut y = self.norm.normalise(x)?;
        for block in &self.block_stack {
            y = block.forward(&y, self.mode)?;
        }
        let y = self.plain_sequential.forward(&y.transpose(1, 2)?)?;
        Ok(y.transpose(1, 2)?)
    }
}

impl EffectModel for Tcn {
    fn model_type(&self) -> &'static str {
        "TCN"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("plain_sequential", self.plain_sequential.state()?);
        for (i, block) in self.block_stack.iter().enumerate() {
            map.insert_node(format!("block_stack.{i}"), block.state()?);
        }
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        self.plain_sequential.load_state(
            require_node(state, "plain_sequential", "")?,
            "plain_sequential",
            &device,
        )?;
        for (i, block) in self.block_stack.iter_mut().enumerate() {
            let name = format!("block_stack.{i}");
            block.load_state(require_node(state, &name, "")?, &name, &device)?;
        }
        Ok(())
    }
}

/// Lightweight temporal convolutional network built from single-stage
/// [`MicroTcnBlock`]s.
#[derive(Debug, Clone)]
pub struct MicroTcn {
    block_stack: Vec<MicroTcnBlock>,
    plain_sequential: PlainSequential,
    config: TcnConfig,
    norm: Normalizer,
    mode: Mode,
    device: Device,
}

impl MicroTcn {
    /// Create with random initialization.
    pub fn new(config: TcnConfig, norm: NormConfig, device: &Device) -> ModelResult<Self> {
        config.validate("MicroTCN")?;
        let norm = Normalizer::new(norm)?;

        let mut block_stack = Vec::with_capacity(config.stack_size);
        for i in 0..config.stack_size {
            let in_channels = if i == 0 {
                config.input_size
            } else {
                config.hidden_size
            };
            block_stack.push(MicroTcnBlock::new(
                in_channels,
                config.hidden_size,
                config.kernel_size,
                1usize << i,
                device,
            )?);
        }

        let plain_sequential = PlainSequential::new(
            config.hidden_size,
            config.output_size,
            config.ps_hidden_size,
            config.ps_num_hidden_layers,
            device,
        )?;

        info!(
            "MicroTCN: {} blocks, {} channels",
            config.stack_size, config.hidden_size
        );

        Ok(Self {
            block_stack,
            plain_sequential,
            config,
            norm,
            mode: Mode::default(),
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &TcnConfig {
        &self.config
    }

    /// Current forward mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch between eval and train batch-norm behavior.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Process a `[batch, input_size, time]` buffer.
    #[instrument(skip(self, x))]
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let mut y = self.norm.normalise(x)?;
        for block in &self.block_stack {
            y = block.forward(&y, self.mode)?;
        }
        let y = self.plain_sequential.forward(&y.transpose(1, 2)?)?;
        Ok(y.transpose(1, 2)?)
    }
}

impl EffectModel for MicroTcn {
    fn model_type(&self) -> &'static str {
        "MicroTCN"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("plain_sequential", self.plain_sequential.state()?);
        for (i, block) in self.block_stack.iter().enumerate() {
            map.insert_node(format!("block_stack.{i}"), block.state()?);
        }
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        self.plain_sequential.load_state(
            require_node(state, "plain_sequential", "")?,
            "plain_sequential",
            &device,
        )?;
        for (i, block) in self.block_stack.iter_mut().enumerate() {
            let name = format!("block_stack.{i}");
            block.load_state(require_node(state, &name, "")?, &name, &device)?;
        }
        Ok(())
    }
}

/// Cascade of [`ConvClipper`] stages with doubling dilations: a learned
/// waveshaper for distortion-style effects.
#[derive(Debug, Clone)]
pub struct ConvWaveshaper {
    stack: Vec<ConvClipper>,
    config: ConvWaveshaperConfig,
    norm: Normalizer,
    device: Device,
}

impl ConvWaveshaper {
    /// Create with random initialization.
    pub fn new(
        config: ConvWaveshaperConfig,
        norm: NormConfig,
        device: &Device,
    ) -> ModelResult<Self> {
        config.validate()?;
        let norm = Normalizer::new(norm)?;

        let depth = config.depth_size;
        let channels = config.num_channels;
        let mut stack = Vec::with_capacity(depth);
        stack.push(ConvClipper::new(1, channels, config.kernel_size, 1, device)?);
        for i in 1..depth - 1 {
            stack.push(ConvClipper::new(
                channels,
                channels,
                config.kernel_size,
                1usize << i,
                device,
            )?);
        }
        stack.push(ConvClipper::new(
            channels,
            1,
            config.kernel_size,
            1usize << (depth - 1),
            device,
        )?);

        info!("ConvWaveshaper: {depth} stages, {channels} channels");

        Ok(Self {
            stack,
            config,
            norm,
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &ConvWaveshaperConfig {
        &self.config
    }

    /// Process a `[batch, 1, time]` buffer.
    #[instrument(skip(self, x))]
    pub fn forward(&self, x: &Tensor) -> ModelResult<Tensor> {
        let mut y = self.norm.normalise(x)?;
        for clipper in &self.stack {
            y = clipper.forward(&y)?;
        }
        Ok(y)
    }
}

impl EffectModel for ConvWaveshaper {
    fn model_type(&self) -> &'static str {
        "ConvWaveshaper"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        for (i, clipper) in self.stack.iter().enumerate() {
            map.insert_node(format!("stack.{i}"), clipper.state()?);
        }
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        for (i, clipper) in self.stack.iter_mut().enumerate() {
            let name = format!("stack.{i}");
            clipper.load_state(require_node(state, &name, "")?, &name, &device)?;
        }
        Ok(())
    }
}

/// Hammerstein-Wiener model: static input nonlinearity, LSTM memory stage,
/// static output nonlinearity, plus a dry skip path from the raw input.
#[derive(Debug, Clone)]
pub struct HammersteinWiener {
    input_linear: Linear,
    lstm: Lstm,
    hidden_linear: Linear,
    output_linear: Linear,
    skip_linear: Linear,
    config: HammersteinWienerConfig,
    norm: Normalizer,
    device: Device,
}

impl HammersteinWiener {
    /// Create with random initialization. The skip path starts as a halved
    /// identity so the model begins close to a scaled dry passthrough.
    pub fn new(
        config: HammersteinWienerConfig,
        norm: NormConfig,
        device: &Device,
    ) -> ModelResult<Self> {
        config.validate()?;
        let norm = Normalizer::new(norm)?;

        let mut skip_weight = vec![0f32; config.output_size * config.input_size];
        for i in 0..config.output_size.min(config.input_size) {
            skip_weight[i * config.input_size + i] = 0.5;
        }
        let skip_linear = Linear::new(
            Tensor::from_vec(
                skip_weight,
                (config.output_size, config.input_size),
                device,
            )?,
            None,
        );

        info!(
            "HammersteinWiener: {} -> {} -> {} -> {} -> {}",
            config.input_size,
            config.linear_input_size,
            config.linear_output_size,
            config.hidden_size,
            config.output_size
        );

        Ok(Self {
            input_linear: init_linear(config.input_size, config.linear_input_size, device)?,
            lstm: Lstm::new(config.linear_input_size, config.linear_output_size, device)?,
            hidden_linear: init_linear(config.linear_output_size, config.hidden_size, device)?,
            output_linear: init_linear(config.hidden_size, config.output_size, device)?,
            skip_linear,
            config,
            norm,
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &HammersteinWienerConfig {
        &self.config
    }

    /// All-zero recurrent state for the given batch size.
    pub fn zero_state(&self, batch_size: usize) -> ModelResult<LstmState> {
        LstmState::zeros(self.config.linear_output_size, batch_size, &self.device)
    }

    /// Process a `[batch, input_size, time]` buffer with caller-owned state.
    #[instrument(skip(self, x, state))]
    pub fn forward(&self, x: &Tensor, state: &LstmState) -> ModelResult<(Tensor, LstmState)> {
        let y = self.norm.normalise(x)?.transpose(1, 2)?;
        let y = self.input_linear.forward(&y)?.tanh()?;
        let (y, next_state) = self.lstm.forward(&y, state)?;
        let y = self.hidden_linear.forward(&y)?.tanh()?;
        let y = self.output_linear.forward(&y)?.transpose(1, 2)?;
        // Dry passthrough plus learned coloration; the skip path sees the
        // raw, un-normalized input.
        let skip = self
            .skip_linear
            .forward(&x.transpose(1, 2)?)?
            .transpose(1, 2)?;
        Ok(((skip + y)?, next_state))
    }
}

impl EffectModel for HammersteinWiener {
    fn model_type(&self) -> &'static str {
        "HammersteinWiener"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("input_linear", linear_state(&self.input_linear)?);
        map.insert_node("lstm", self.lstm.state()?);
        map.insert_node("hidden_linear", linear_state(&self.hidden_linear)?);
        map.insert_node("output_linear", linear_state(&self.output_linear)?);
        map.insert_node("skip_linear", linear_state(&self.skip_linear)?);
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        load_linear(
            &mut self.input_linear,
            require_node(state, "input_linear", "")?,
            "input_linear",
            &device,
        )?;
        self.lstm
            .load_state(require_node(state, "lstm", "")?, "lstm", &device)?;
        load_linear(
            &mut self.hidden_linear,
            require_node(state, "hidden_linear", "")?,
            "hidden_linear",
            &device,
        )?;
        load_linear(
            &mut self.output_linear,
            require_node(state, "output_linear", "")?,
            "output_linear",
            &device,
        )?;
        load_linear(
            &mut self.skip_linear,
            require_node(state, "skip_linear", "")?,
            "skip_linear",
            &device,
        )
    }
}

/// Residual LSTM: recurrent stage plus [`PlainSequential`] head, with the
/// residual shortcut taken from the raw (pre-normalization) input so the
/// network learns a correction on top of the untouched signal.
#[derive(Debug, Clone)]
pub struct ResLstm {
    rnn: Lstm,
    plain_sequential: PlainSequential,
    config: ResRnnConfig,
    norm: Normalizer,
    device: Device,
}

impl ResLstm {
    /// Create with random initialization.
    pub fn new(config: ResRnnConfig, norm: NormConfig, device: &Device) -> ModelResult<Self> {
        config.validate("ResLSTM")?;
        let norm = Normalizer::new(norm)?;

        info!(
            "ResLSTM: {} hidden units, head {}x{}",
            config.hidden_size, config.ps_num_hidden_layers, config.ps_hidden_size
        );

        Ok(Self {
            rnn: Lstm::new(config.input_size, config.hidden_size, device)?,
            plain_sequential: PlainSequential::new(
                config.hidden_size,
                config.output_size,
                config.ps_hidden_size,
                config.ps_num_hidden_layers,
                device,
            )?,
            config,
            norm,
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &ResRnnConfig {
        &self.config
    }

    /// All-zero recurrent state for the given batch size.
    pub fn zero_state(&self, batch_size: usize) -> ModelResult<LstmState> {
        LstmState::zeros(self.config.hidden_size, batch_size, &self.device)
    }

    /// Process a `[batch, input_size, time]` buffer with caller-owned state.
    #[instrument(skip(self, x, state))]
    pub fn forward(&self, x: &Tensor, state: &LstmState) -> ModelResult<(Tensor, LstmState)> {
        let norm_x = self.norm.normalise(x)?;
        let (y, next_state) = self.rnn.forward(&norm_x.transpose(1, 2)?, state)?;
        let y = self.plain_sequential.forward(&y)?.transpose(1, 2)?;
        let out = if self.config.input_size == self.config.output_size {
            (x + y)?
        } else {
            y
        };
        Ok((out, next_state))
    }
}

impl EffectModel for ResLstm {
    fn model_type(&self) -> &'static str {
        "ResLSTM"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("rnn", self.rnn.state()?);
        map.insert_node("plain_sequential", self.plain_sequential.state()?);
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        self.rnn
            .load_state(require_node(state, "rnn", "")?, "rnn", &device)?;
        self.plain_sequential.load_state(
            require_node(state, "plain_sequential", "")?,
            "plain_sequential",
            &device,
        )
    }
}

/// Residual GRU: like [`ResLstm`] with a GRU memory stage.
#[derive(Debug, Clone)]
pub struct ResGru {
    rnn: Gru,
    plain_sequential: PlainSequential,
    config: ResRnnConfig,
    norm: Normalizer,
    device: Device,
}

impl ResGru {
    /// Create with random initialization.
    pub fn new(config: ResRnnConfig, norm: NormConfig, device: &Device) -> ModelResult<Self> {
        config.validate("ResGRU")?;
        let norm = Normalizer::new(norm)?;

        info!(
            "ResGRU: {} hidden units, head {}x{}",
            config.hidden_size, config.ps_num_hidden_layers, config.ps_hidden_size
        );

        Ok(Self {
            rnn: Gru::new(config.input_size, config.hidden_size, device)?,
            plain_sequential: PlainSequential::new(
                config.hidden_size,
                config.output_size,
                config.ps_hidden_size,
                config.ps_num_hidden_layers,
                device,
            )?,
            config,
            norm,
            device: device.clone(),
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &ResRnnConfig {
        &self.config
    }

    /// All-zero recurrent state for the given batch size.
    pub fn zero_state(&self, batch_size: usize) -> ModelResult<GruState> {
        GruState::zeros(self.config.hidden_size, batch_size, &self.device)
    }

    /// Process a `[batch, input_size, time]` buffer with caller-owned state.
    #[instrument(skip(self, x, state))]
    pub fn forward(&self, x: &Tensor, state: &GruState) -> ModelResult<(Tensor, GruState)> {
        let norm_x = self.norm.normalise(x)?;
        let (y, next_state) = self.rnn.forward(&norm_x.transpose(1, 2)?, state)?;
        let y = self.plain_sequential.forward(&y)?.transpose(1, 2)?;
        let out = if self.config.input_size == self.config.output_size {
            (x + y)?
        } else {
            y
        };
        Ok((out, next_state))
    }
}

impl EffectModel for ResGru {
    fn model_type(&self) -> &'static str {
        "ResGRU"
    }

    fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    fn hyper_parameters(&self) -> serde_json::Map<String, serde_json::Value> {
        config_map(&self.config)
    }

    fn state_dict(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_node("rnn", self.rnn.state()?);
        map.insert_node("plain_sequential", self.plain_sequential.state()?);
        Ok(map)
    }

    fn load_state_dict(&mut self, state: &ParamMap) -> ModelResult<()> {
        let device = self.device.clone();
        self.rnn
            .load_state(require_node(state, "rnn", "")?, "rnn", &device)?;
        self.plain_sequential.load_state(
            require_node(state, "plain_sequential", "")?,
            "plain_sequential",
            &device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavenet_config() -> WaveNetConfig {
        WaveNetConfig {
            input_size: 1,
            output_size: 1,
            num_channels: 4,
            kernel_size: 3,
            dilations: vec![1, 2, 4],
            stack_size: 2,
            gated: true,
            hidden_size: 8,
        }
    }

    fn tcn_config() -> TcnConfig {
        TcnConfig {
            input_size: 1,
            hidden_size: 4,
            output_size: 1,
            kernel_size: 3,
            stack_size: 3,
            ps_hidden_size: 8,
            ps_num_hidden_layers: 1,
        }
    }

    #[test]
    fn test_wavenet_forward_shape() {
        let device = Device::Cpu;
        let model = WaveNet::new(wavenet_config(), NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 256), &device).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 1, 256]);
    }

    #[test]
    fn test_wavenet_state_dict_layout() {
        let device = Device::Cpu;
        let model = WaveNet::new(wavenet_config(), NormConfig::default(), &device).unwrap();
        let state = model.state_dict().unwrap();

        let names: Vec<&str> = state.entries().map(|(name, _)| name).collect();
        assert_eq!(names[..3], ["input_conv", "post_conv1", "post_conv2"]);
        assert_eq!(names[3], "block_stack.0");
        assert_eq!(state.len(), 3 + 6);
    }

    #[test]
    fn test_tcn_forward_shape() {
        let device = Device::Cpu;
        let model = Tcn::new(tcn_config(), NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 128), &device).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 1, 128]);
    }

    #[test]
    fn test_micro_tcn_forward_shape() {
        let device = Device::Cpu;
        let model = MicroTcn::new(tcn_config(), NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (2, 1, 64), &device).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 1, 64]);
    }

    #[test]
    fn test_conv_waveshaper_forward_shape() {
        let device = Device::Cpu;
        let config = ConvWaveshaperConfig {
            kernel_size: 16,
            depth_size: 3,
            num_channels: 4,
        };
        let model = ConvWaveshaper::new(config, NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 256), &device).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 1, 256]);
    }

    #[test]
    fn test_hammerstein_wiener_forward_and_state() {
        let device = Device::Cpu;
        let config = HammersteinWienerConfig {
            input_size: 1,
            linear_input_size: 4,
            linear_output_size: 6,
            hidden_size: 8,
            output_size: 1,
        };
        let model = HammersteinWiener::new(config, NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 64), &device).unwrap();
        let state = model.zero_state(1).unwrap();
        let (y, next) = model.forward(&x, &state).unwrap();
        assert_eq!(y.dims(), &[1, 1, 64]);
        assert_eq!(next.h.dims(), &[1, 1, 6]);
    }

    #[test]
    fn test_res_lstm_residual_uses_raw_input() {
        let device = Device::Cpu;
        let config = ResRnnConfig {
            input_size: 1,
            output_size: 1,
            hidden_size: 4,
            ps_hidden_size: 4,
            ps_num_hidden_layers: 0,
        };
        // Strong offset normalization: if the residual used the normalized
        // input the output would sit far from the raw signal.
        let norm = NormConfig {
            norm_mean: 100.0,
            norm_std: 1.0,
        };
        let mut model = ResLstm::new(config, norm, &device).unwrap();

        // Zero every weight so the head contributes exactly nothing.
        let state = model.state_dict().unwrap();
        let zeroed = zero_state_dict(&state);
        model.load_state_dict(&zeroed).unwrap();

        let x = Tensor::randn(0f32, 1.0, (1, 1, 16), &device).unwrap();
        let rnn_state = model.zero_state(1).unwrap();
        let (y, _) = model.forward(&x, &rnn_state).unwrap();

        let x: Vec<f32> = x.flatten_all().unwrap().to_vec1().unwrap();
        let y: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-6, "expected raw-input residual");
        }
    }

    #[test]
    fn test_res_gru_forward_shape() {
        let device = Device::Cpu;
        let config = ResRnnConfig {
            input_size: 1,
            output_size: 1,
            hidden_size: 5,
            ps_hidden_size: 6,
            ps_num_hidden_layers: 1,
        };
        let model = ResGru::new(config, NormConfig::default(), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 1, 32), &device).unwrap();
        let state = model.zero_state(1).unwrap();
        let (y, next) = model.forward(&x, &state).unwrap();
        assert_eq!(y.dims(), &[1, 1, 32]);
        assert_eq!(next.h.dims(), &[1, 1, 5]);
    }

    /// Deep-copy a state dict with every value zeroed.
    fn zero_state_dict(map: &ParamMap) -> ParamMap {
        let mut out = ParamMap::new();
        for (name, entry) in map.entries() {
            match entry {
                amp_core::ParamEntry::Tensor(data) => {
                    out.insert_tensor(
                        name,
                        amp_core::TensorData::new(data.shape.clone(), vec![0.0; data.values.len()]),
                    );
                }
                amp_core::ParamEntry::Node(node) => {
                    out.insert_node(name, zero_state_dict(node));
                }
            }
        }
        out
    }
}
