//! Per-timestep input-frame generation
//!
//! Static input is scaled once by the timestep resolution and then reused
//! unchanged; Poisson and event-stream input regenerate the frame on every
//! step.

use crate::config::{InputMode, SimConfig};
use crate::error::*;
use ndarray::{ArrayD, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A stateful stream of event frames (e.g. decoded from a DVS recording)
///
/// The cursor advances on every call; `None` signals exhaustion.
pub trait EventFrameSource {
    /// Pull the next batched event frame, shaped like the base input
    fn next_frame_batch(&mut self) -> Option<ArrayD<f64>>;
}

enum FrameGen<'a> {
    Static,
    Poisson {
        rates: ArrayD<f64>,
        rescale_fac: f64,
        budget: Option<usize>,
        // One event counter per batch row; the budget binds each sample
        // independently.
        emitted: Vec<usize>,
        rng: StdRng,
    },
    Events {
        source: &'a mut dyn EventFrameSource,
    },
}

/// Produces the driving input frame for each timestep
pub struct StimulusSource<'a> {
    current: ArrayD<f64>,
    gen: FrameGen<'a>,
}

impl<'a> StimulusSource<'a> {
    /// Create a stimulus source for one run from the base input batch
    ///
    /// Event-stream mode requires a frame source; the base input only
    /// contributes its shape in that mode.
    pub fn new(
        input: &ArrayD<f64>,
        config: &SimConfig,
        events: Option<&'a mut dyn EventFrameSource>,
    ) -> Result<Self> {
        let gen = match &config.input_mode {
            InputMode::Static => FrameGen::Static,
            InputMode::Poisson {
                rescale_fac,
                max_events_per_sample,
            } => {
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                FrameGen::Poisson {
                    rates: input.clone(),
                    rescale_fac: *rescale_fac,
                    budget: *max_events_per_sample,
                    emitted: vec![0; input.shape()[0]],
                    rng,
                }
            }
            InputMode::EventStream => {
                let source = events.ok_or_else(|| {
                    SimError::invalid_parameter(
                        "events",
                        "None",
                        "an event-frame source in EventStream mode",
                    )
                })?;
                FrameGen::Events { source }
            }
        };

        let current = match &gen {
            FrameGen::Static => input.mapv(|v| v * config.dt),
            _ => ArrayD::zeros(input.raw_dim()),
        };

        Ok(Self { current, gen })
    }

    /// Regenerate the frame for the given timestep and return it
    ///
    /// Static input returns the dt-scaled frame unchanged.
    pub fn advance(&mut self, step: usize) -> Result<&ArrayD<f64>> {
        match &mut self.gen {
            FrameGen::Static => {}
            FrameGen::Poisson {
                rates,
                rescale_fac,
                budget,
                emitted,
                rng,
            } => {
                let mut frame = ArrayD::zeros(rates.raw_dim());
                for (row, (mut out_row, rate_row)) in
                    frame.outer_iter_mut().zip(rates.outer_iter()).enumerate()
                {
                    if budget.map_or(false, |limit| emitted[row] >= limit) {
                        continue;
                    }
                    let mut spikes = 0usize;
                    Zip::from(&mut out_row).and(&rate_row).for_each(|out, &rate| {
                        let draw = rng.gen::<f64>() * *rescale_fac;
                        if draw <= rate.abs() && rate != 0.0 {
                            spikes += 1;
                            *out = rate.signum();
                        }
                    });
                    emitted[row] += spikes;
                }
                self.current = frame;
            }
            FrameGen::Events { source } => {
                self.current = source
                    .next_frame_batch()
                    .ok_or(SimError::InputExhausted { step })?;
            }
        }
        Ok(&self.current)
    }
}
