//! Time-stepped inference runtime for TTFS spiking neural networks
//!
//! This crate drives a compiled spiking network, converted from a trained
//! analog network, through discretized time. The output code is
//! time-to-first-spike with a dynamic firing threshold: the simulator
//! accumulates output spikes, decides per step whether classification is
//! already unambiguous, and tallies hardware-relevant cost metrics
//! (synaptic operations, neuron operations, firing rates) along the way.
//!
//! The tensor engine that evaluates one forward pass is pluggable through
//! [`SpikingBackend`]; a reference dense integrate-and-fire implementation
//! is provided in [`inisim`].

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod backend;
pub mod config;
pub mod decode;
pub mod error;
pub mod inisim;
pub mod input;
pub mod metrics;
pub mod record;
pub mod simulation;
pub mod threshold;

// Re-export essential types
pub use backend::{LayerKind, SpikingBackend};
pub use config::{InputMode, SimConfig};
pub use error::{Result, SimError};
pub use inisim::{DenseTtfsBuilder, DenseTtfsNetwork, TtfsParams};
pub use input::{EventFrameSource, StimulusSource};
pub use metrics::CostCounters;
pub use record::RunRecorder;
pub use simulation::{SimulateOptions, SimulationOutcome, TtfsSimulator};
pub use threshold::ThresholdTracker;

/// Runtime crate version for compatibility checking
pub const RUNTIME_VERSION: u32 = 1;

/// Default timestep resolution (ms of simulated time per step)
pub const DEFAULT_DT: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        // Test that all components can be imported and basic objects created
        let config = SimConfig::default();
        assert!(config.validate().is_ok());

        let params = TtfsParams::default();
        assert!(params.validate().is_ok());

        assert!(DEFAULT_DT > 0.0);
    }
}
