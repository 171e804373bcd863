//! Hardware-relevant cost metrics
//!
//! Tracks synaptic operations, neuron operations, and the average firing
//! rate across one run. The operation tensors are `[batch, time]` and only
//! exist when the configuration requests them.

use crate::config::SimConfig;
use ndarray::{Array2, ArrayViewD, Axis};

/// Spike-driven synaptic operation count per batch item
///
/// Each nonzero entry of the spike train triggers `fanout` downstream
/// synaptic updates.
pub fn layer_synaptic_ops(spiketrain: &ArrayViewD<'_, f64>, fanout: usize) -> Vec<f64> {
    let batch = spiketrain.shape().first().copied().unwrap_or(0);
    (0..batch)
        .map(|b| {
            let nonzero = spiketrain
                .index_axis(Axis(0), b)
                .iter()
                .filter(|&&v| v != 0.0)
                .count();
            (nonzero * fanout) as f64
        })
        .collect()
}

/// Running cost counters for one simulation run
#[derive(Debug, Clone)]
pub struct CostCounters {
    /// Raw spike count, normalized on finalization
    rate_count: f64,
    synaptic_ops: Option<Array2<f64>>,
    neuron_ops: Option<Array2<f64>>,
}

impl CostCounters {
    /// Allocate counters according to the configuration flags
    pub fn new(config: &SimConfig) -> Self {
        let shape = (config.batch_size, config.num_timesteps);
        Self {
            rate_count: 0.0,
            synaptic_ops: config.log_synaptic_ops.then(|| Array2::zeros(shape)),
            neuron_ops: config.log_neuron_ops.then(|| Array2::zeros(shape)),
        }
    }

    /// Accumulate raw spikes into the average-rate counter
    pub fn add_spike_count(&mut self, count: usize) {
        self.rate_count += count as f64;
    }

    /// Charge spike-driven synaptic operations for one layer at one step
    pub fn add_layer_synaptic_ops(
        &mut self,
        step: usize,
        spiketrain: &ArrayViewD<'_, f64>,
        fanout: usize,
    ) {
        if let Some(ops) = self.synaptic_ops.as_mut() {
            for (b, count) in layer_synaptic_ops(spiketrain, fanout).into_iter().enumerate() {
                ops[[b, step]] += count;
            }
        }
    }

    /// Charge one layer's bias-update cost for every batch item at one step
    pub fn add_layer_neuron_ops(&mut self, step: usize, neurons_with_bias: usize) {
        if let Some(ops) = self.neuron_ops.as_mut() {
            for b in 0..ops.nrows() {
                ops[[b, step]] += neurons_with_bias as f64;
            }
        }
    }

    /// Charge the one-time setup cost of a static input, at step 0 only
    ///
    /// `fanin` and `neurons` describe the first parsed layer after the
    /// input; the factor 2 accounts for the multiply and accumulate of the
    /// injected current.
    pub fn charge_static_input(&mut self, fanin: usize, neurons: usize) {
        if let Some(ops) = self.neuron_ops.as_mut() {
            let cost = (fanin * neurons * 2) as f64;
            for b in 0..ops.nrows() {
                ops[[b, 0]] += cost;
            }
        }
    }

    /// Normalize and return the average firing rate
    ///
    /// Divides the raw spike count by the upper bound on total possible
    /// spikes; the full timestep range is used even when the run finished
    /// early.
    pub fn finalize(&mut self, batch: usize, total_neurons: usize, num_timesteps: usize) -> f64 {
        let denom = (batch * total_neurons * num_timesteps) as f64;
        if denom > 0.0 {
            self.rate_count /= denom;
        }
        self.rate_count
    }

    /// Accumulated synaptic operations, if requested
    pub fn synaptic_ops(&self) -> Option<&Array2<f64>> {
        self.synaptic_ops.as_ref()
    }

    /// Accumulated neuron operations, if requested
    pub fn neuron_ops(&self) -> Option<&Array2<f64>> {
        self.neuron_ops.as_ref()
    }

    /// Consume the counters, yielding the operation tensors
    pub fn into_ops(self) -> (Option<Array2<f64>>, Option<Array2<f64>>) {
        (self.synaptic_ops, self.neuron_ops)
    }
}
