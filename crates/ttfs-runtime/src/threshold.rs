//! Threshold-correction tracker
//!
//! Dynamic-threshold layers recalibrate each step based on a prospective
//! (lookahead) spike pattern extracted from the probe half of the forward
//! pass. Each recalibration has its own operation cost, measured as the
//! element-wise change of the prospective pattern since the previous step.

use crate::backend::SpikingBackend;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// Per-layer prospective spike state, persisted across timesteps
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    prospective: Vec<ArrayD<f64>>,
}

impl ThresholdTracker {
    /// Allocate zeroed prospective state for every spike-emitting layer
    ///
    /// Slot order matches the backend's layer traversal order and must stay
    /// aligned with the driver's spike-layer enumeration.
    pub fn new<B: SpikingBackend>(backend: &B, batch: usize) -> Self {
        let prospective = (0..backend.num_layers())
            .filter(|&l| backend.layer_kind(l).emits_spikes())
            .map(|l| {
                let mut shape = vec![batch];
                shape.extend(backend.layer_output_shape(l));
                ArrayD::zeros(IxDyn(&shape))
            })
            .collect();
        Self { prospective }
    }

    /// Fold in the probe half of one layer's spike train
    ///
    /// Returns the correction delta `|probe - previous|` and stores the
    /// probe pattern as the new previous state.
    pub fn update(&mut self, slot: usize, probe: &ArrayViewD<'_, f64>) -> ArrayD<f64> {
        let previous = &mut self.prospective[slot];
        let delta = (probe - &*previous).mapv(f64::abs);
        previous.assign(probe);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_against_zero_initial_state() {
        let mut tracker = ThresholdTracker {
            prospective: vec![ArrayD::zeros(IxDyn(&[1, 3]))],
        };

        let mut probe = ArrayD::zeros(IxDyn(&[1, 3]));
        probe[[0, 1]] = 1.0;

        let delta = tracker.update(0, &probe.view());
        assert_eq!(delta[[0, 0]], 0.0);
        assert_eq!(delta[[0, 1]], 1.0);
    }

    #[test]
    fn test_delta_tracks_disappearing_spike() {
        let mut tracker = ThresholdTracker {
            prospective: vec![ArrayD::zeros(IxDyn(&[1, 2]))],
        };

        let mut probe = ArrayD::zeros(IxDyn(&[1, 2]));
        probe[[0, 0]] = 1.0;
        tracker.update(0, &probe.view());

        // Spike vanishes: the correction is charged again
        let silent = ArrayD::zeros(IxDyn(&[1, 2]));
        let delta = tracker.update(0, &silent.view());
        assert_eq!(delta[[0, 0]], 1.0);
        assert_eq!(delta[[0, 1]], 0.0);
    }

    #[test]
    fn test_stable_probe_costs_nothing() {
        let mut tracker = ThresholdTracker {
            prospective: vec![ArrayD::zeros(IxDyn(&[2, 2]))],
        };

        let probe = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0);
        tracker.update(0, &probe.view());
        let delta = tracker.update(0, &probe.view());
        assert!(delta.iter().all(|&v| v == 0.0));
    }
}
