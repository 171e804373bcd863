//! Timestep driver for TTFS inference
//!
//! Advances a compiled spiking network through discretized time: regenerate
//! the input frame, run one dual-batch forward pass, fan the per-layer
//! signals out to the recorder, threshold tracker, and cost counters, then
//! evaluate the early-stop condition. The run ends with the sticky
//! first-spike post-processing and rate normalization.

use crate::backend::SpikingBackend;
use crate::config::{InputMode, SimConfig};
use crate::decode;
use crate::error::*;
use crate::input::{EventFrameSource, StimulusSource};
use crate::metrics::CostCounters;
use crate::record::RunRecorder;
use crate::threshold::ThresholdTracker;
use ndarray::{concatenate, s, Array2, Array3, ArrayD, Axis, Slice};

/// Dynamic-threshold recalibration cost tracking. Fixed policy for this
/// simulator variant, not exposed through configuration.
const TRACK_THRESHOLD_OPS: bool = true;

/// Optional per-call inputs to [`TtfsSimulator::simulate`]
#[derive(Default)]
pub struct SimulateOptions<'a> {
    /// Ground-truth labels, enables the verbose accuracy echo
    pub truth: Option<&'a [i64]>,
    /// Event-frame stream, required in event-stream input mode
    pub events: Option<&'a mut dyn EventFrameSource>,
}

impl<'a> SimulateOptions<'a> {
    /// Attach ground-truth labels
    pub fn with_truth(mut self, truth: &'a [i64]) -> Self {
        self.truth = Some(truth);
        self
    }

    /// Attach an event-frame source
    pub fn with_events(mut self, events: &'a mut dyn EventFrameSource) -> Self {
        self.events = Some(events);
        self
    }
}

/// Result of one simulation run
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// Cumulative output spike counts, `[batch, classes, time]`,
    /// non-decreasing along the time axis
    pub output: Array3<f64>,
    /// Average firing rate, normalized to `[0, 1]`
    pub avg_rate: f64,
    /// Number of timesteps actually executed
    pub steps_executed: usize,
    /// Whether the top-k criterion ended the run before `num_timesteps`
    pub finished_early: bool,
    /// History buffers, populated according to the configuration flags
    pub recordings: RunRecorder,
    /// Synaptic operation counts `[batch, time]`, if requested
    pub synaptic_ops: Option<Array2<f64>>,
    /// Neuron operation counts `[batch, time]`, if requested
    pub neuron_ops: Option<Array2<f64>>,
}

/// Time-stepped simulator for a TTFS-converted spiking network
#[derive(Debug)]
pub struct TtfsSimulator<B: SpikingBackend> {
    backend: B,
    config: SimConfig,
}

impl<B: SpikingBackend> TtfsSimulator<B> {
    /// Create a simulator over a compiled backend
    pub fn new(backend: B, config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Get a reference to the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get a mutable reference to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Get the simulation configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Consume the simulator, returning the backend
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Drive the network through one full run over `input`
    ///
    /// `input` is the analog-valued batch `[batch, ...spatial dims]`; it is
    /// not mutated. Returns the cumulative first-spike-time trace along
    /// with rate and cost bookkeeping.
    pub fn simulate(
        &mut self,
        input: &ArrayD<f64>,
        mut options: SimulateOptions<'_>,
    ) -> Result<SimulationOutcome> {
        let batch = self.config.batch_size;
        let classes = self.config.num_classes;
        let num_timesteps = self.config.num_timesteps;

        if input.shape().first() != Some(&batch) {
            return Err(SimError::shape_mismatch(
                "input batch",
                format!("leading axis {}", batch),
                format!("{:?}", input.shape()),
            ));
        }

        log::info!(
            "Starting TTFS run: {} steps of dt={} over batch {}",
            num_timesteps,
            self.config.dt,
            batch
        );

        self.backend.reset();

        let mut output_b_l_t = Array3::<f64>::zeros((batch, classes, num_timesteps));
        let mut recorder = RunRecorder::new(&self.backend, &self.config, input.shape());
        let mut counters = CostCounters::new(&self.config);
        let mut tracker =
            TRACK_THRESHOLD_OPS.then(|| ThresholdTracker::new(&self.backend, batch));
        let mut stimulus = StimulusSource::new(input, &self.config, options.events.take())?;

        let mut steps_executed = 0;
        let mut finished_early = false;

        for step in 0..num_timesteps {
            let sim_time = (step as f64 + 1.0) * self.config.dt;
            self.backend.set_time(sim_time);

            let frame = stimulus.advance(step)?;

            // One forward pass over {real frame, zero probe frame}. The
            // probe half only feeds the prospective threshold state.
            let probe_frame = ArrayD::zeros(frame.raw_dim());
            let stacked = concatenate(Axis(0), &[frame.view(), probe_frame.view()])
                .map_err(|e| {
                    SimError::shape_mismatch("probe concatenation", "stackable halves", e.to_string())
                })?;
            let out_spikes = self.backend.predict(&stacked)?;

            if out_spikes.nrows() < batch || out_spikes.ncols() != classes {
                return Err(SimError::shape_mismatch(
                    "backend output",
                    format!("[{}, {}]", 2 * batch, classes),
                    format!("{:?}", out_spikes.shape()),
                ));
            }

            if self.config.remove_classifier {
                // No classifier head: record the max-margin winner index
                // into the class slots instead of per-class indicators.
                for b in 0..batch {
                    let winner = out_spikes
                        .row(b)
                        .iter()
                        .position(|&v| v > 0.0)
                        .unwrap_or(0);
                    output_b_l_t
                        .slice_mut(s![b, .., step])
                        .fill(winner as f64);
                }
            } else {
                for b in 0..batch {
                    for l in 0..classes {
                        if out_spikes[[b, l]] > 0.0 {
                            output_b_l_t[[b, l, step]] = 1.0;
                        }
                    }
                }
            }

            // Per-layer readout. The spike-layer and membrane-layer slots
            // advance independently; the spike slot also indexes the fanout
            // table (offset by one for the input layer) and the prospective
            // state.
            let mut spike_slot = 0;
            let mut mem_slot = 0;
            for layer in 0..self.backend.num_layers() {
                let kind = self.backend.layer_kind(layer);
                if kind.emits_spikes() {
                    let full = self.backend.spike_train(layer).ok_or_else(|| {
                        SimError::layer_signal(layer, "spike-emitting layer has no spike train")
                    })?;
                    if full.shape().first().copied().unwrap_or(0) < 2 * batch {
                        return Err(SimError::layer_signal(
                            layer,
                            "spike train does not cover the dual batch",
                        ));
                    }

                    let real = full.slice_axis(Axis(0), Slice::from(..batch));
                    counters.add_spike_count(real.iter().filter(|&&v| v != 0.0).count());
                    recorder.record_spiketrain(spike_slot, step, &real)?;
                    counters.add_layer_synaptic_ops(
                        step,
                        &real,
                        self.backend.fanout(spike_slot + 1),
                    );

                    if let Some(tracker) = tracker.as_mut() {
                        let probe = full.slice_axis(Axis(0), Slice::from(batch..2 * batch));
                        let delta = tracker.update(spike_slot, &probe);
                        counters.add_layer_synaptic_ops(
                            step,
                            &delta.view(),
                            self.backend.fanout(spike_slot + 1),
                        );
                    }

                    counters.add_layer_neuron_ops(
                        step,
                        self.backend.num_neurons_with_bias(spike_slot + 1),
                    );
                    spike_slot += 1;
                }
                if kind.tracks_membrane() {
                    let full = self.backend.membrane(layer).ok_or_else(|| {
                        SimError::layer_signal(layer, "membrane-tracking layer has no membrane")
                    })?;
                    let probe = full.slice_axis(Axis(0), Slice::from(batch..2 * batch));
                    recorder.record_membrane(mem_slot, step, &probe)?;
                    mem_slot += 1;
                }
            }

            recorder.record_input(step, frame);

            // Input-layer cost: a dynamic input is charged every step, a
            // static input once at the start of the run.
            match self.config.input_mode {
                InputMode::Poisson { .. } | InputMode::EventStream => {
                    counters.add_layer_synaptic_ops(step, &frame.view(), self.backend.fanout(0));
                }
                InputMode::Static => {
                    if step == 0 {
                        counters.charge_static_input(
                            self.backend.fanin(1),
                            self.backend.num_neurons(1),
                        );
                    }
                }
            }

            if self.config.verbose > 0 {
                if let Some(truth) = options.truth {
                    let guesses = decode::decode_predictions(output_b_l_t.view(), num_timesteps);
                    let accuracy = decode::running_accuracy(&guesses, truth);
                    log::info!(
                        "t={:.2}: running accuracy {:.2}%",
                        sim_time,
                        accuracy * 100.0
                    );
                }
            }

            steps_executed = step + 1;

            if decode::all_reached_top_k(output_b_l_t.view(), self.config.top_k) {
                log::info!("Finished early at step {}", step);
                finished_early = true;
                break;
            }
        }

        decode::sticky_spike_trace(&mut output_b_l_t);

        let avg_rate = counters.finalize(batch, self.backend.total_neurons(), num_timesteps);
        if recorder.spiketrains.is_none() {
            log::info!(
                "Average spike rate: {} spikes per simulation timestep",
                avg_rate
            );
        }

        let (synaptic_ops, neuron_ops) = counters.into_ops();
        let output = decode::cumulative_spikes(&output_b_l_t);

        log::info!(
            "Run complete: {} of {} steps executed",
            steps_executed,
            num_timesteps
        );

        Ok(SimulationOutcome {
            output,
            avg_rate,
            steps_executed,
            finished_early,
            recordings: recorder,
            synaptic_ops,
            neuron_ops,
        })
    }
}
