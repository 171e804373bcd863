//! End-to-end run of the timestep driver over the reference dense backend.

use ndarray::{Array1, Array2, ArrayD, IxDyn};
use ttfs_runtime::{
    decode, DenseTtfsBuilder, SimConfig, SimulateOptions, TtfsParams, TtfsSimulator,
};

fn identity_net(dim: usize) -> ttfs_runtime::DenseTtfsNetwork {
    DenseTtfsBuilder::new(dim)
        .with_params(TtfsParams::new(1.0, 0.95, 0.05, 0.0).unwrap())
        .layer(Array2::eye(dim), Array1::zeros(dim))
        .build()
        .unwrap()
}

#[test]
fn strongest_input_class_fires_first() {
    let net = identity_net(3);
    let config = SimConfig::new(1, 3, 10, 1.0)
        .unwrap()
        .with_top_k(2)
        .with_spiketrain_log(true)
        .with_membrane_log(true)
        .with_neuron_ops(true)
        .with_synaptic_ops(true)
        .with_verbose(1);
    let mut sim = TtfsSimulator::new(net, config).unwrap();

    let input =
        ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![2.0, 0.5, 0.0]).unwrap();
    let truth = [0i64];
    let outcome = sim
        .simulate(&input, SimulateOptions::default().with_truth(&truth))
        .unwrap();

    // Class 0 crosses the decaying threshold first, class 1 one step later;
    // with top_k = 2 the run stops as soon as both have fired.
    assert!(outcome.finished_early);
    assert_eq!(outcome.steps_executed, 2);

    let preds = decode::decode_predictions(outcome.output.view(), 10);
    assert_eq!(preds, vec![0]);

    // Cumulative output is non-decreasing along time for every class
    for l in 0..3 {
        for t in 1..10 {
            assert!(outcome.output[[0, l, t]] >= outcome.output[[0, l, t - 1]]);
        }
    }
    // Class 2 never fires
    assert_eq!(outcome.output[[0, 2, 9]], 0.0);

    // Normalized rate stays in [0, 1]; here 2 spikes against a bound of
    // 6 neurons over 10 steps
    assert!((outcome.avg_rate - 2.0 / 60.0).abs() < 1e-12);

    // Static input setup cost lands at step 0 only
    let neuron_ops = outcome.neuron_ops.as_ref().unwrap();
    assert_eq!(neuron_ops[[0, 0]], (3 * 3 * 2) as f64);
    assert_eq!(neuron_ops[[0, 1]], 0.0);

    // Recorded spike trains cover the full time range, zero past the stop
    let trains = outcome.recordings.spiketrains.as_ref().unwrap();
    assert_eq!(trains[0].shape(), &[1, 3, 10]);
    assert_eq!(trains[0][[0, 0, 0]], 1.0);
    assert_eq!(trains[0][[0, 1, 1]], 1.0);
    assert_eq!(trains[0][[0, 2, 9]], 0.0);
}

#[test]
fn top_k_above_attainable_spikes_runs_full_length() {
    let net = identity_net(3);
    // Only two classes can ever fire for this input; top_k = 3 is
    // unattainable, so the loop must run all timesteps.
    let config = SimConfig::new(1, 3, 6, 1.0).unwrap().with_top_k(3);
    let mut sim = TtfsSimulator::new(net, config).unwrap();

    let input =
        ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![2.0, 0.5, 0.0]).unwrap();
    let outcome = sim.simulate(&input, SimulateOptions::default()).unwrap();

    assert!(!outcome.finished_early);
    assert_eq!(outcome.steps_executed, 6);
}

#[test]
fn repeated_runs_reset_backend_state() {
    let net = identity_net(2);
    let config = SimConfig::new(1, 2, 4, 1.0).unwrap().with_top_k(1);
    let mut sim = TtfsSimulator::new(net, config).unwrap();

    let input = ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![3.0, 0.0]).unwrap();

    let first = sim.simulate(&input, SimulateOptions::default()).unwrap();
    let second = sim.simulate(&input, SimulateOptions::default()).unwrap();

    assert_eq!(first.steps_executed, second.steps_executed);
    assert_eq!(first.output, second.output);
}
