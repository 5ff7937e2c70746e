//! Single-layer LSTM and GRU over the time axis.
//!
//! Weight layout and gate ordering match the training-framework convention
//! the export document uses: `weight_ih_l0` is `[gates * hidden, input]`,
//! `weight_hh_l0` is `[gates * hidden, hidden]`, gates ordered i,f,g,o for
//! the LSTM and r,z,n for the GRU. Hidden (and cell) state is provided by
//! the caller per invocation and returned updated — nothing is retained
//! across calls, so streaming use carries state explicitly.

use amp_core::{ModelError, ModelResult, ParamMap};
use candle_core::{Device, Tensor};
use candle_nn::ops::sigmoid;

use crate::state::{require_tensor, tensor_data};

/// Hidden and cell state for an LSTM, each `[num_layers, batch, hidden]`.
#[derive(Debug, Clone)]
pub struct LstmState {
    pub h: Tensor,
    pub c: Tensor,
}

impl LstmState {
    /// All-zero state for the given batch size.
    pub fn zeros(hidden_size: usize, batch_size: usize, device: &Device) -> ModelResult<Self> {
        Ok(Self {
            h: Tensor::zeros((1, batch_size, hidden_size), candle_core::DType::F32, device)?,
            c: Tensor::zeros((1, batch_size, hidden_size), candle_core::DType::F32, device)?,
        })
    }
}

/// Hidden state for a GRU, `[num_layers, batch, hidden]`.
#[derive(Debug, Clone)]
pub struct GruState {
    pub h: Tensor,
}

impl GruState {
    /// All-zero state for the given batch size.
    pub fn zeros(hidden_size: usize, batch_size: usize, device: &Device) -> ModelResult<Self> {
        Ok(Self {
            h: Tensor::zeros((1, batch_size, hidden_size), candle_core::DType::F32, device)?,
        })
    }
}

fn check_state_shape(
    component: &str,
    state: &Tensor,
    batch_size: usize,
    hidden_size: usize,
) -> ModelResult<()> {
    let dims = state.dims();
    if dims != [1, batch_size, hidden_size] {
        return Err(ModelError::shape_mismatch(
            component,
            format!("[1, {batch_size}, {hidden_size}]"),
            format!("{dims:?}"),
        ));
    }
    Ok(())
}

fn init_gate_weights(
    gates: usize,
    input_size: usize,
    hidden_size: usize,
    device: &Device,
) -> ModelResult<(Tensor, Tensor, Tensor, Tensor)> {
    let bound = (1.0 / hidden_size as f32).sqrt();
    let rows = gates * hidden_size;
    Ok((
        Tensor::rand(-bound, bound, (rows, input_size), device)?,
        Tensor::rand(-bound, bound, (rows, hidden_size), device)?,
        Tensor::rand(-bound, bound, (rows,), device)?,
        Tensor::rand(-bound, bound, (rows,), device)?,
    ))
}

/// Single-layer LSTM.
#[derive(Debug, Clone)]
pub struct Lstm {
    weight_ih: Tensor,
    weight_hh: Tensor,
    bias_ih: Tensor,
    bias_hh: Tensor,
    input_size: usize,
    hidden_size: usize,
}

impl Lstm {
    /// Create with uniform random initialization.
    pub fn new(input_size: usize, hidden_size: usize, device: &Device) -> ModelResult<Self> {
        if input_size == 0 || hidden_size == 0 {
            return Err(ModelError::construction("Lstm", "sizes must be >= 1"));
        }
        let (weight_ih, weight_hh, bias_ih, bias_hh) =
            init_gate_weights(4, input_size, hidden_size, device)?;
        Ok(Self {
            weight_ih,
            weight_hh,
            bias_ih,
            bias_hh,
            input_size,
            hidden_size,
        })
    }

    /// Hidden width.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run over `x` of shape `[batch, time, input]` with caller-provided
    /// state; returns `[batch, time, hidden]` and the updated state.
    pub fn forward(&self, x: &Tensor, state: &LstmState) -> ModelResult<(Tensor, LstmState)> {
        let (batch_size, steps, features) = x.dims3()?;
        if features != self.input_size {
            return Err(ModelError::shape_mismatch(
                "Lstm",
                format!("{} input features", self.input_size),
                format!("{features} input features"),
            ));
        }
        check_state_shape("Lstm", &state.h, batch_size, self.hidden_size)?;
        check_state_shape("Lstm", &state.c, batch_size, self.hidden_size)?;

        let w_ih = self.weight_ih.t()?;
        let w_hh = self.weight_hh.t()?;
        let mut h = state.h.narrow(0, 0, 1)?.squeeze(0)?;
        let mut c = state.c.narrow(0, 0, 1)?.squeeze(0)?;
        let hs = self.hidden_size;

        let mut outputs = Vec::with_capacity(steps);
        for step in 0..steps {
            let xt = x.narrow(1, step, 1)?.squeeze(1)?;
            let gates = (xt.matmul(&w_ih)? + h.matmul(&w_hh)?)?
                .broadcast_add(&self.bias_ih)?
                .broadcast_add(&self.bias_hh)?;

            let i = sigmoid(&gates.narrow(1, 0, hs)?)?;
            let f = sigmoid(&gates.narrow(1, hs, hs)?)?;
            let g = gates.narrow(1, 2 * hs, hs)?.tanh()?;
            let o = sigmoid(&gates.narrow(1, 3 * hs, hs)?)?;

            c = ((f * &c)? + (i * g)?)?;
            h = (o * c.tanh()?)?;
            outputs.push(h.unsqueeze(1)?);
        }

        let y = Tensor::cat(&outputs, 1)?;
        Ok((
            y,
            LstmState {
                h: h.unsqueeze(0)?,
                c: c.unsqueeze(0)?,
            },
        ))
    }

    /// Describe with the conventional `_l0` leaf names.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_tensor("weight_hh_l0", tensor_data(&self.weight_hh)?);
        map.insert_tensor("weight_ih_l0", tensor_data(&self.weight_ih)?);
        map.insert_tensor("bias_hh_l0", tensor_data(&self.bias_hh)?);
        map.insert_tensor("bias_ih_l0", tensor_data(&self.bias_ih)?);
        Ok(map)
    }

    /// Load all four leaves, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        let rows = 4 * self.hidden_size;
        self.weight_hh =
            require_tensor(map, "weight_hh_l0", prefix, &[rows, self.hidden_size], device)?;
        self.weight_ih =
            require_tensor(map, "weight_ih_l0", prefix, &[rows, self.input_size], device)?;
        self.bias_hh = require_tensor(map, "bias_hh_l0", prefix, &[rows], device)?;
        self.bias_ih = require_tensor(map, "bias_ih_l0", prefix, &[rows], device)?;
        Ok(())
    }
}

/// Single-layer GRU.
#[derive(Debug, Clone)]
pub struct Gru {
    weight_ih: Tensor,
    weight_hh: Tensor,
    bias_ih: Tensor,
    bias_hh: Tensor,
    input_size: usize,
    hidden_size: usize,
}

impl Gru {
    /// Create with uniform random initialization.
    pub fn new(input_size: usize, hidden_size: usize, device: &Device) -> ModelResult<Self> {
        if input_size == 0 || hidden_size == 0 {
            return Err(ModelError::construction("Gru", "sizes must be >= 1"));
        }
        let (weight_ih, weight_hh, bias_ih, bias_hh) =
            init_gate_weights(3, input_size, hidden_size, device)?;
        Ok(Self {
            weight_ih,
            weight_hh,
            bias_ih,
            bias_hh,
            input_size,
            hidden_size,
        })
    }

    /// Hidden width.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run over `x` of shape `[batch, time, input]` with caller-provided
    /// state; returns `[batch, time, hidden]` and the updated state.
    pub fn forward(&self, x: &Tensor, state: &GruState) -> ModelResult<(Tensor, GruState)> {
        let (batch_size, steps, features) = x.dims3()?;
        if features != self.input_size {
            return Err(ModelError::shape_mismatch(
                "Gru",
                format!("{} input features", self.input_size),
                format!("{features} input features"),
            ));
        }
        check_state_shape("Gru", &state.h, batch_size, self.hidden_size)?;

        let w_ih = self.weight_ih.t()?;
        let w_hh = self.weight_hh.t()?;
        let mut h = state.h.narrow(0, 0, 1)?.squeeze(0)?;
        let hs = self.hidden_size;

        let mut outputs = Vec::with_capacity(steps);
        for step in 0..steps {
            let xt = x.narrow(1, step, 1)?.squeeze(1)?;
            let gi = xt.matmul(&w_ih)?.broadcast_add(&self.bias_ih)?;
            let gh = h.matmul(&w_hh)?.broadcast_add(&self.bias_hh)?;

            let r = sigmoid(&(gi.narrow(1, 0, hs)? + gh.narrow(1, 0, hs)?)?)?;
            let z = sigmoid(&(gi.narrow(1, hs, hs)? + gh.narrow(1, hs, hs)?)?)?;
            // The reset gate scales only the hidden contribution of the
            // candidate, bias included.
            let n = (gi.narrow(1, 2 * hs, hs)? + (r * gh.narrow(1, 2 * hs, hs)?)?)?.tanh()?;

            h = (((1.0 - &z)? * n)? + (z * &h)?)?;
            outputs.push(h.unsqueeze(1)?);
        }

        let y = Tensor::cat(&outputs, 1)?;
        Ok((y, GruState { h: h.unsqueeze(0)? }))
    }

    /// Describe with the conventional `_l0` leaf names.
    pub fn state(&self) -> ModelResult<ParamMap> {
        let mut map = ParamMap::new();
        map.insert_tensor("weight_hh_l0", tensor_data(&self.weight_hh)?);
        map.insert_tensor("weight_ih_l0", tensor_data(&self.weight_ih)?);
        map.insert_tensor("bias_hh_l0", tensor_data(&self.bias_hh)?);
        map.insert_tensor("bias_ih_l0", tensor_data(&self.bias_ih)?);
        Ok(map)
    }

    /// Load all four leaves, checking shapes.
    pub fn load_state(&mut self, map: &ParamMap, prefix: &str, device: &Device) -> ModelResult<()> {
        let rows = 3 * self.hidden_size;
        self.weight_hh =
            require_tensor(map, "weight_hh_l0", prefix, &[rows, self.hidden_size], device)?;
        self.weight_ih =
            require_tensor(map, "weight_ih_l0", prefix, &[rows, self.input_size], device)?;
        self.bias_hh = require_tensor(map, "bias_hh_l0", prefix, &[rows], device)?;
        self.bias_ih = require_tensor(map, "bias_ih_l0", prefix, &[rows], device)?;
        Ok(())
    }
}
