//! # effect-model
//!
//! Causal neural building blocks and model compositions for audio effect
//! emulation (amp, distortion, and waveshaper modeling).
//!
//! This crate provides:
//! - Causal dilated convolution with exact length preservation
//! - Gated residual blocks with skip accumulation (WaveNet style)
//! - TCN and MicroTCN temporal blocks with batch normalization
//! - A fully-connected residual head (`PlainSequential`)
//! - Single-layer LSTM/GRU stages with caller-owned state
//! - Seven model compositions sharing one export surface ([`EffectModel`])
//!
//! # Architecture
//!
//! Every model is an explicit tree of small components connected by
//! ownership: a container exclusively owns its children, and each component
//! exposes a forward operation plus a state-dict description in declaration
//! order. Forward passes are pure functions over `&self`, so independent
//! passes may run concurrently on one model instance.
//!
//! # Example
//!
//! ```ignore
//! use effect_model::{NormConfig, WaveNet, WaveNetConfig};
//! use candle_core::{Device, Tensor};
//!
//! let config = WaveNetConfig {
//!     input_size: 1,
//!     output_size: 1,
//!     num_channels: 16,
//!     kernel_size: 3,
//!     dilations: vec![1, 2, 4, 8, 16],
//!     stack_size: 2,
//!     gated: true,
//!     hidden_size: 32,
//! };
//! let device = Device::Cpu;
//! let model = WaveNet::new(config, NormConfig::default(), &device)?;
//! let x = Tensor::zeros((1, 1, 1024), candle_core::DType::F32, &device)?;
//! let y = model.forward(&x)?;
//! ```

pub mod config;
pub mod layers;
pub mod models;
pub mod norm;
pub mod recurrent;
pub mod state;

// Re-exports for convenience
pub use config::{
    ConvWaveshaperConfig, HammersteinWienerConfig, NormConfig, ResRnnConfig, TcnConfig,
    WaveNetConfig,
};
pub use layers::{
    CausalConv1d, ConvClipper, MicroTcnBlock, PRelu, PlainSequential, ResidualBlock, TcnBlock,
};
pub use models::{ConvWaveshaper, HammersteinWiener, MicroTcn, ResGru, ResLstm, Tcn, WaveNet};
pub use norm::{BatchNorm1d, Normalizer};
pub use recurrent::{Gru, GruState, Lstm, LstmState};
pub use state::{tensor_data, tensor_from_data, EffectModel};
