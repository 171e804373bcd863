//! Reference integrate-and-fire backend with a dynamic firing threshold
//!
//! A stack of fully-connected TTFS layers. Each neuron integrates its
//! synaptic drive without leak and fires at most once per run, when the
//! membrane crosses a threshold that decays over simulated time and
//! inflates with recent drive. Rows of the dual batch are processed
//! independently, so the zero probe half yields the prospective spike
//! pattern of the dynamic threshold without disturbing the real half.

use crate::backend::{LayerKind, SpikingBackend};
use crate::error::*;
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Ix2};

/// Parameters of the dynamic-threshold TTFS neuron model
#[derive(Debug, Clone, PartialEq)]
pub struct TtfsParams {
    /// Base firing threshold
    pub v_thresh: f64,
    /// Multiplicative threshold decay per timestep
    pub thresh_decay: f64,
    /// Lower bound on the decayed threshold
    pub min_thresh: f64,
    /// Threshold inflation per unit of positive synaptic drive
    pub drive_gain: f64,
}

impl Default for TtfsParams {
    fn default() -> Self {
        Self {
            v_thresh: 1.0,
            thresh_decay: 0.95,
            min_thresh: 0.05,
            drive_gain: 0.1,
        }
    }
}

impl TtfsParams {
    /// Create new parameters with validation
    pub fn new(v_thresh: f64, thresh_decay: f64, min_thresh: f64, drive_gain: f64) -> Result<Self> {
        if v_thresh <= 0.0 {
            return Err(SimError::invalid_parameter(
                "v_thresh",
                v_thresh.to_string(),
                "> 0.0",
            ));
        }
        if !(0.0..=1.0).contains(&thresh_decay) || thresh_decay == 0.0 {
            return Err(SimError::invalid_parameter(
                "thresh_decay",
                thresh_decay.to_string(),
                "in (0.0, 1.0]",
            ));
        }
        if min_thresh <= 0.0 || min_thresh > v_thresh {
            return Err(SimError::invalid_parameter(
                "min_thresh",
                format!("{} (with v_thresh={})", min_thresh, v_thresh),
                "in (0.0, v_thresh]",
            ));
        }
        if drive_gain < 0.0 {
            return Err(SimError::invalid_parameter(
                "drive_gain",
                drive_gain.to_string(),
                ">= 0.0",
            ));
        }
        Ok(Self {
            v_thresh,
            thresh_decay,
            min_thresh,
            drive_gain,
        })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(
            self.v_thresh,
            self.thresh_decay,
            self.min_thresh,
            self.drive_gain,
        )?;
        Ok(())
    }
}

/// Mutable per-run state of one dense layer
#[derive(Debug, Clone)]
struct LayerState {
    mem: Array2<f64>,
    thresh: Array2<f64>,
    fired: Array2<f64>,
    spikes: ArrayD<f64>,
    mem_dyn: ArrayD<f64>,
}

/// One fully-connected TTFS layer
#[derive(Debug, Clone)]
struct DenseTtfsLayer {
    weights: Array2<f64>,
    bias: Array1<f64>,
    state: Option<LayerState>,
}

impl DenseTtfsLayer {
    fn units(&self) -> usize {
        self.weights.ncols()
    }

    fn inputs(&self) -> usize {
        self.weights.nrows()
    }
}

/// Dense TTFS network with a dynamic firing threshold
#[derive(Debug, Clone)]
pub struct DenseTtfsNetwork {
    params: TtfsParams,
    input_dim: usize,
    layers: Vec<DenseTtfsLayer>,
    time: f64,
    last_time: f64,
}

impl DenseTtfsNetwork {
    /// Number of output classes (units of the last layer)
    pub fn num_classes(&self) -> usize {
        self.layers.last().map(DenseTtfsLayer::units).unwrap_or(0)
    }

    /// Input dimension expected per batch row
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn step_layer(
        layer: &mut DenseTtfsLayer,
        params: &TtfsParams,
        input: &Array2<f64>,
        dt: f64,
    ) -> Array2<f64> {
        let rows = input.nrows();
        let units = layer.units();

        let state = layer.state.get_or_insert_with(|| LayerState {
            mem: Array2::zeros((rows, units)),
            thresh: Array2::from_elem((rows, units), params.v_thresh),
            fired: Array2::zeros((rows, units)),
            spikes: Array2::<f64>::zeros((rows, units)).into_dyn(),
            mem_dyn: Array2::<f64>::zeros((rows, units)).into_dyn(),
        });

        let mut drive = input.dot(&layer.weights);
        for mut row in drive.rows_mut() {
            row += &(&layer.bias * dt);
        }

        // Locked neurons (already fired) stop integrating
        let open = state.fired.mapv(|f| 1.0 - f);
        state.mem = &state.mem + &(&drive * &open);

        // Dynamic threshold: decay toward the floor, inflate with drive
        state.thresh.mapv_inplace(|v| (v * params.thresh_decay).max(params.min_thresh));
        state.thresh = &state.thresh + &drive.mapv(|d| params.drive_gain * d.max(0.0));

        let mut spikes = Array2::zeros((rows, units));
        for r in 0..rows {
            for u in 0..units {
                if state.fired[[r, u]] == 0.0 && state.mem[[r, u]] >= state.thresh[[r, u]] {
                    spikes[[r, u]] = 1.0;
                    state.fired[[r, u]] = 1.0;
                }
            }
        }

        state.spikes = spikes.clone().into_dyn();
        state.mem_dyn = state.mem.clone().into_dyn();
        spikes
    }
}

impl SpikingBackend for DenseTtfsNetwork {
    fn set_time(&mut self, t: f64) {
        self.last_time = self.time;
        self.time = t;
    }

    fn predict(&mut self, input: &ArrayD<f64>) -> Result<Array2<f64>> {
        let input = input
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| {
                SimError::shape_mismatch(
                    "backend input",
                    "[rows, features]",
                    format!("{:?}", input.shape()),
                )
            })?;
        if input.ncols() != self.input_dim {
            return Err(SimError::shape_mismatch(
                "backend input",
                format!("feature dim {}", self.input_dim),
                format!("{:?}", input.shape()),
            ));
        }

        let dt = (self.time - self.last_time).max(0.0);
        let mut activity = input.to_owned();
        for layer in &mut self.layers {
            activity = Self::step_layer(layer, &self.params, &activity, dt);
        }
        Ok(activity)
    }

    fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn layer_kind(&self, _layer: usize) -> LayerKind {
        LayerKind::SpikeAndMembrane
    }

    fn spike_train(&self, layer: usize) -> Option<ArrayViewD<'_, f64>> {
        self.layers
            .get(layer)
            .and_then(|l| l.state.as_ref())
            .map(|s| s.spikes.view())
    }

    fn membrane(&self, layer: usize) -> Option<ArrayViewD<'_, f64>> {
        self.layers
            .get(layer)
            .and_then(|l| l.state.as_ref())
            .map(|s| s.mem_dyn.view())
    }

    fn layer_output_shape(&self, layer: usize) -> Vec<usize> {
        vec![self.layers[layer].units()]
    }

    fn fanout(&self, parsed: usize) -> usize {
        // Parsed index 0 is the input layer; the last layer has no
        // downstream synapses.
        if parsed < self.layers.len() {
            self.layers[parsed].units()
        } else {
            0
        }
    }

    fn fanin(&self, parsed: usize) -> usize {
        if parsed == 0 {
            0
        } else {
            self.layers[parsed - 1].inputs()
        }
    }

    fn num_neurons(&self, parsed: usize) -> usize {
        if parsed == 0 {
            self.input_dim
        } else {
            self.layers[parsed - 1].units()
        }
    }

    fn num_neurons_with_bias(&self, parsed: usize) -> usize {
        if parsed == 0 {
            0
        } else {
            self.layers[parsed - 1]
                .bias
                .iter()
                .filter(|&&b| b != 0.0)
                .count()
        }
    }

    fn total_neurons(&self) -> usize {
        self.input_dim + self.layers.iter().map(DenseTtfsLayer::units).sum::<usize>()
    }

    fn reset(&mut self) {
        self.time = 0.0;
        self.last_time = 0.0;
        for layer in &mut self.layers {
            layer.state = None;
        }
    }
}

/// Builder for dense TTFS networks
#[derive(Debug)]
pub struct DenseTtfsBuilder {
    params: TtfsParams,
    input_dim: usize,
    layers: Vec<(Array2<f64>, Array1<f64>)>,
}

impl DenseTtfsBuilder {
    /// Create a builder for the given input dimension
    pub fn new(input_dim: usize) -> Self {
        Self {
            params: TtfsParams::default(),
            input_dim,
            layers: Vec::new(),
        }
    }

    /// Set the neuron model parameters
    pub fn with_params(mut self, params: TtfsParams) -> Self {
        self.params = params;
        self
    }

    /// Append a fully-connected layer
    pub fn layer(mut self, weights: Array2<f64>, bias: Array1<f64>) -> Self {
        self.layers.push((weights, bias));
        self
    }

    /// Build the network, validating parameters and layer chaining
    pub fn build(self) -> Result<DenseTtfsNetwork> {
        self.params.validate()?;
        if self.input_dim == 0 {
            return Err(SimError::invalid_parameter("input_dim", "0", "> 0"));
        }
        if self.layers.is_empty() {
            return Err(SimError::invalid_parameter("layers", "0", ">= 1"));
        }

        let mut expected = self.input_dim;
        let mut layers = Vec::with_capacity(self.layers.len());
        for (i, (weights, bias)) in self.layers.into_iter().enumerate() {
            if weights.nrows() != expected {
                return Err(SimError::shape_mismatch(
                    format!("layer {} weights", i),
                    format!("{} input rows", expected),
                    format!("{:?}", weights.shape()),
                ));
            }
            if bias.len() != weights.ncols() {
                return Err(SimError::shape_mismatch(
                    format!("layer {} bias", i),
                    format!("{} units", weights.ncols()),
                    format!("[{}]", bias.len()),
                ));
            }
            expected = weights.ncols();
            layers.push(DenseTtfsLayer {
                weights,
                bias,
                state: None,
            });
        }

        Ok(DenseTtfsNetwork {
            params: self.params,
            input_dim: self.input_dim,
            layers,
            time: 0.0,
            last_time: 0.0,
        })
    }
}
