//! Spike recorder: per-timestep history buffers
//!
//! Buffers are allocated only for the signals the configuration requests;
//! recording into an absent buffer is a no-op. All buffers carry time as
//! their trailing axis and are written in place at index `[..., t]`.

use crate::backend::SpikingBackend;
use crate::config::SimConfig;
use crate::error::*;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// History buffers captured over one simulation run
#[derive(Debug, Clone)]
pub struct RunRecorder {
    /// Per spike-emitting layer: `[batch, ...layer shape, time]`
    pub spiketrains: Option<Vec<ArrayD<f64>>>,
    /// Per membrane-tracking layer: `[batch, ...layer shape, time]`
    ///
    /// Indexed independently of `spiketrains`; a layer may expose either
    /// signal without the other.
    pub membrane: Option<Vec<ArrayD<f64>>>,
    /// Input frame trace: `[batch, ...input shape, time]`
    pub input_trace: Option<ArrayD<f64>>,
}

fn traced_shape(batch: usize, layer_shape: &[usize], num_timesteps: usize) -> IxDyn {
    let mut shape = Vec::with_capacity(layer_shape.len() + 2);
    shape.push(batch);
    shape.extend_from_slice(layer_shape);
    shape.push(num_timesteps);
    IxDyn(&shape)
}

impl RunRecorder {
    /// Allocate buffers for one run according to the configuration flags
    pub fn new<B: SpikingBackend>(
        backend: &B,
        config: &SimConfig,
        input_shape: &[usize],
    ) -> Self {
        let batch = config.batch_size;
        let steps = config.num_timesteps;

        let spiketrains = config.log_spiketrains.then(|| {
            (0..backend.num_layers())
                .filter(|&l| backend.layer_kind(l).emits_spikes())
                .map(|l| ArrayD::zeros(traced_shape(batch, &backend.layer_output_shape(l), steps)))
                .collect()
        });

        let membrane = config.log_membrane.then(|| {
            (0..backend.num_layers())
                .filter(|&l| backend.layer_kind(l).tracks_membrane())
                .map(|l| ArrayD::zeros(traced_shape(batch, &backend.layer_output_shape(l), steps)))
                .collect()
        });

        let input_trace = config.log_input.then(|| {
            let mut shape = input_shape.to_vec();
            shape.push(steps);
            ArrayD::zeros(IxDyn(&shape))
        });

        Self {
            spiketrains,
            membrane,
            input_trace,
        }
    }

    /// Write one layer's spike indicator into the trace at timestep `step`
    pub fn record_spiketrain(
        &mut self,
        slot: usize,
        step: usize,
        spikes: &ArrayViewD<'_, f64>,
    ) -> Result<()> {
        if let Some(buffers) = self.spiketrains.as_mut() {
            let buf = buffers
                .get_mut(slot)
                .ok_or_else(|| SimError::layer_signal(slot, "spike-train slot out of range"))?;
            let time_axis = Axis(buf.ndim() - 1);
            buf.index_axis_mut(time_axis, step).assign(spikes);
        }
        Ok(())
    }

    /// Write one layer's membrane potential into the trace at timestep `step`
    pub fn record_membrane(
        &mut self,
        slot: usize,
        step: usize,
        potential: &ArrayViewD<'_, f64>,
    ) -> Result<()> {
        if let Some(buffers) = self.membrane.as_mut() {
            let buf = buffers
                .get_mut(slot)
                .ok_or_else(|| SimError::layer_signal(slot, "membrane slot out of range"))?;
            let time_axis = Axis(buf.ndim() - 1);
            buf.index_axis_mut(time_axis, step).assign(potential);
        }
        Ok(())
    }

    /// Write the current input frame into the trace at timestep `step`
    pub fn record_input(&mut self, step: usize, frame: &ArrayD<f64>) {
        if let Some(buf) = self.input_trace.as_mut() {
            let time_axis = Axis(buf.ndim() - 1);
            buf.index_axis_mut(time_axis, step).assign(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LayerKind;
    use ndarray::Array2;

    struct ShapeOnlyBackend;

    impl SpikingBackend for ShapeOnlyBackend {
        fn set_time(&mut self, _t: f64) {}
        fn predict(&mut self, _input: &ArrayD<f64>) -> Result<Array2<f64>> {
            unreachable!("not stepped in recorder tests")
        }
        fn num_layers(&self) -> usize {
            3
        }
        fn layer_kind(&self, layer: usize) -> LayerKind {
            match layer {
                0 => LayerKind::Plain,
                1 => LayerKind::SpikeAndMembrane,
                _ => LayerKind::SpikeEmitting,
            }
        }
        fn spike_train(&self, _layer: usize) -> Option<ArrayViewD<'_, f64>> {
            None
        }
        fn membrane(&self, _layer: usize) -> Option<ArrayViewD<'_, f64>> {
            None
        }
        fn layer_output_shape(&self, layer: usize) -> Vec<usize> {
            match layer {
                1 => vec![4],
                _ => vec![2],
            }
        }
        fn fanout(&self, _parsed: usize) -> usize {
            0
        }
        fn fanin(&self, _parsed: usize) -> usize {
            0
        }
        fn num_neurons(&self, _parsed: usize) -> usize {
            0
        }
        fn num_neurons_with_bias(&self, _parsed: usize) -> usize {
            0
        }
        fn total_neurons(&self) -> usize {
            0
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn test_buffers_allocated_per_flags() {
        let backend = ShapeOnlyBackend;
        let config = SimConfig::new(2, 10, 5, 1.0)
            .unwrap()
            .with_spiketrain_log(true)
            .with_membrane_log(true)
            .with_input_log(true);

        let recorder = RunRecorder::new(&backend, &config, &[2, 8]);

        let trains = recorder.spiketrains.as_ref().unwrap();
        assert_eq!(trains.len(), 2); // layers 1 and 2 emit spikes
        assert_eq!(trains[0].shape(), &[2, 4, 5]);
        assert_eq!(trains[1].shape(), &[2, 2, 5]);

        let mems = recorder.membrane.as_ref().unwrap();
        assert_eq!(mems.len(), 1); // only layer 1 tracks membrane
        assert_eq!(mems[0].shape(), &[2, 4, 5]);

        assert_eq!(recorder.input_trace.as_ref().unwrap().shape(), &[2, 8, 5]);
    }

    #[test]
    fn test_recording_skipped_without_buffers() {
        let backend = ShapeOnlyBackend;
        let config = SimConfig::new(2, 10, 5, 1.0).unwrap();
        let mut recorder = RunRecorder::new(&backend, &config, &[2, 8]);

        assert!(recorder.spiketrains.is_none());
        assert!(recorder.membrane.is_none());
        assert!(recorder.input_trace.is_none());

        // No-op without a buffer, even with an out-of-range slot
        let spikes = ArrayD::zeros(IxDyn(&[2, 4]));
        assert!(recorder.record_spiketrain(9, 0, &spikes.view()).is_ok());
        recorder.record_input(0, &spikes);
    }

    #[test]
    fn test_slice_write_at_timestep() {
        let backend = ShapeOnlyBackend;
        let config = SimConfig::new(2, 10, 5, 1.0)
            .unwrap()
            .with_spiketrain_log(true);
        let mut recorder = RunRecorder::new(&backend, &config, &[2, 8]);

        let spikes = ArrayD::from_elem(IxDyn(&[2, 4]), 1.0);
        recorder.record_spiketrain(0, 3, &spikes.view()).unwrap();

        let buf = &recorder.spiketrains.as_ref().unwrap()[0];
        assert_eq!(buf[[0, 0, 3]], 1.0);
        assert_eq!(buf[[1, 3, 3]], 1.0);
        assert_eq!(buf[[0, 0, 2]], 0.0);
    }
}
