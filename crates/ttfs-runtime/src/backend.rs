//! Backend interface for compiled spiking networks
//!
//! The timestep driver is generic over the tensor engine that evaluates one
//! forward pass of the compiled network. A backend accepts a dual-batch
//! input (real rows followed by an equal number of probe rows) and exposes
//! its per-layer state for readout immediately after the pass.

use crate::error::*;
use ndarray::{Array2, ArrayD, ArrayViewD};

/// Signal capabilities of one network layer
///
/// Layers are classified once at compile time; the driver dispatches on
/// this variant instead of probing for optional attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// No readable signals (input, flatten, concatenate, ...)
    Plain,
    /// Exposes a per-step spike train
    SpikeEmitting,
    /// Exposes a membrane potential trace
    MembraneTracking,
    /// Exposes both a spike train and a membrane potential
    SpikeAndMembrane,
}

impl LayerKind {
    /// Whether the layer exposes a spike-train signal
    pub fn emits_spikes(&self) -> bool {
        matches!(self, LayerKind::SpikeEmitting | LayerKind::SpikeAndMembrane)
    }

    /// Whether the layer exposes a membrane-potential signal
    pub fn tracks_membrane(&self) -> bool {
        matches!(self, LayerKind::MembraneTracking | LayerKind::SpikeAndMembrane)
    }
}

/// A compiled spiking network that can be stepped through time
///
/// All batched tensors use the dual-batch convention: the leading axis
/// holds `2 * batch_size` rows, the first half driven by the real input
/// frame and the second half by an all-zero probe frame. The probe half
/// exists solely so the driver can read prospective threshold-crossing
/// state without contaminating the recorded trace.
///
/// Topology counters (`fanout`, `fanin`, `num_neurons`,
/// `num_neurons_with_bias`) are indexed over parsed layers with the input
/// layer at index 0, followed by one entry per spike-emitting layer in
/// traversal order.
pub trait SpikingBackend {
    /// Publish the current simulated time before a forward pass
    ///
    /// Time-dependent backend internals (leak terms, threshold decay) read
    /// this value during `predict`.
    fn set_time(&mut self, t: f64);

    /// Evaluate one timestep of the network
    ///
    /// `input` carries `2 * batch_size` rows; the returned tensor holds the
    /// raw output-layer spikes with the same dual-batch leading axis and
    /// one column per class. Per-layer state remains readable through
    /// [`spike_train`](Self::spike_train) / [`membrane`](Self::membrane)
    /// until the next call.
    fn predict(&mut self, input: &ArrayD<f64>) -> Result<Array2<f64>>;

    /// Number of layers in traversal order
    fn num_layers(&self) -> usize;

    /// Signal capability of the given layer
    fn layer_kind(&self, layer: usize) -> LayerKind;

    /// Dual-batch spike train of the given layer, if it emits spikes
    fn spike_train(&self, layer: usize) -> Option<ArrayViewD<'_, f64>>;

    /// Dual-batch membrane potential of the given layer, if tracked
    fn membrane(&self, layer: usize) -> Option<ArrayViewD<'_, f64>>;

    /// Output shape of the given layer, excluding the batch axis
    fn layer_output_shape(&self, layer: usize) -> Vec<usize>;

    /// Downstream synaptic connections per neuron of a parsed layer
    fn fanout(&self, parsed: usize) -> usize;

    /// Upstream synaptic connections per neuron of a parsed layer
    fn fanin(&self, parsed: usize) -> usize;

    /// Neuron count of a parsed layer
    fn num_neurons(&self, parsed: usize) -> usize;

    /// Bias-bearing neuron count of a parsed layer
    fn num_neurons_with_bias(&self, parsed: usize) -> usize;

    /// Total neuron count across all parsed layers, input included
    fn total_neurons(&self) -> usize;

    /// Return membrane and threshold state to the start-of-run condition
    fn reset(&mut self);
}
