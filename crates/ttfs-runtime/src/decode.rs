//! Output decoding for the TTFS spike code
//!
//! The class output of one run is a boolean trace `[batch, classes, time]`.
//! Information sits in the timing of the first spike: the predicted class
//! is the one that fired earliest. These helpers also provide the coarse
//! top-k spike-count test used for early stopping, and the post-processing
//! that turns the raw trace into the externally consumable cumulative form.

use ndarray::{Array2, Array3, ArrayView3, Axis};

/// First timestep at which each class spiked
///
/// Classes that never spiked get the sentinel value `num_timesteps`.
pub fn first_spike_times(output: ArrayView3<'_, f64>, num_timesteps: usize) -> Array2<usize> {
    let (batch, classes, steps) = output.dim();
    let mut times = Array2::from_elem((batch, classes), num_timesteps);
    for b in 0..batch {
        for l in 0..classes {
            if let Some(t) = (0..steps).find(|&t| output[[b, l, t]] > 0.0) {
                times[[b, l]] = t;
            }
        }
    }
    times
}

/// Decode the predicted class per batch item
///
/// The winner is the class with the earliest first spike. A batch item
/// with no output spike in any class yet is undecided and maps to `-1`
/// instead of an arbitrary class index.
pub fn decode_predictions(output: ArrayView3<'_, f64>, num_timesteps: usize) -> Vec<i64> {
    let (batch, classes, steps) = output.dim();
    let mut predictions = Vec::with_capacity(batch);

    for b in 0..batch {
        let mut first = vec![0usize; classes];
        let mut any_spike = false;
        for l in 0..classes {
            match (0..steps).find(|&t| output[[b, l, t]] > 0.0) {
                Some(t) => {
                    first[l] = t;
                    any_spike = true;
                }
                None => first[l] = num_timesteps,
            }
        }

        let guess = first
            .iter()
            .enumerate()
            .min_by_key(|&(_, t)| *t)
            .map(|(l, _)| l as i64)
            .unwrap_or(-1);
        predictions.push(if any_spike { guess } else { -1 });
    }

    predictions
}

/// Mean agreement between predictions and ground-truth labels
pub fn running_accuracy(predictions: &[i64], truth: &[i64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let hits = predictions
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / predictions.len() as f64
}

/// Coarse early-stop test: every batch item has accumulated at least
/// `top_k` nonzero output entries across classes and time
pub fn all_reached_top_k(output: ArrayView3<'_, f64>, top_k: usize) -> bool {
    output
        .axis_iter(Axis(0))
        .all(|sample| sample.iter().filter(|&&v| v != 0.0).count() >= top_k)
}

/// Make the output trace monotonic: once a class fires, it stays fired
///
/// Entries are binarized in the process, so downstream code can read off
/// the first-spike time as the position of the earliest 1.
pub fn sticky_spike_trace(output: &mut Array3<f64>) {
    let (batch, classes, steps) = output.dim();
    for b in 0..batch {
        for l in 0..classes {
            let mut fired = false;
            for t in 0..steps {
                if output[[b, l, t]] != 0.0 {
                    fired = true;
                }
                output[[b, l, t]] = if fired { 1.0 } else { 0.0 };
            }
        }
    }
}

/// Cumulative spike count along the time axis
///
/// Index `t` of the result holds the number of spikes observed in `[0, t]`.
pub fn cumulative_spikes(output: &Array3<f64>) -> Array3<f64> {
    let mut cumulative = output.clone();
    cumulative.accumulate_axis_inplace(Axis(2), |&prev, cur| *cur += prev);
    cumulative
}
