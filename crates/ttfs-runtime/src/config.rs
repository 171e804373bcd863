//! Simulation configuration

use crate::error::*;

/// How the driving input is produced at each timestep
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    /// Constant analog input, scaled once by the timestep resolution
    Static,
    /// Input resampled every step as a Poisson spike frame
    Poisson {
        /// Rescale factor applied to the uniform draw before comparing
        /// against the rate tensor
        rescale_fac: f64,
        /// Input spikes allowed per sample over one run; `None` disables
        /// the budget
        max_events_per_sample: Option<usize>,
    },
    /// Input pulled from a caller-supplied event-frame stream
    EventStream,
}

impl InputMode {
    /// Whether the input frame changes from one timestep to the next
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, InputMode::Static)
    }
}

/// Configuration for one simulation run
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of samples per batch
    pub batch_size: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Number of timesteps per run
    pub num_timesteps: usize,
    /// Timestep resolution (ms of simulated time per step)
    pub dt: f64,
    /// Output spikes required per sample before the run may finish early
    pub top_k: usize,
    /// Verbosity level; > 0 echoes running accuracy each step
    pub verbose: u8,
    /// Record the raw class output as an argmax index instead of per-class
    /// spike indicators (network compiled without its classifier)
    pub remove_classifier: bool,
    /// Input generation mode
    pub input_mode: InputMode,
    /// Seed for Poisson sampling; `None` draws from entropy
    pub seed: Option<u64>,
    /// Record the input frame trace
    pub log_input: bool,
    /// Record per-layer spike trains
    pub log_spiketrains: bool,
    /// Record per-layer membrane potential traces
    pub log_membrane: bool,
    /// Accumulate synaptic operation counts
    pub log_synaptic_ops: bool,
    /// Accumulate neuron operation counts
    pub log_neuron_ops: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            num_classes: 10,
            num_timesteps: 50,
            dt: 1.0,
            top_k: 1,
            verbose: 0,
            remove_classifier: false,
            input_mode: InputMode::Static,
            seed: None,
            log_input: false,
            log_spiketrains: false,
            log_membrane: false,
            log_synaptic_ops: false,
            log_neuron_ops: false,
        }
    }
}

impl SimConfig {
    /// Create a new configuration with validation
    pub fn new(
        batch_size: usize,
        num_classes: usize,
        num_timesteps: usize,
        dt: f64,
    ) -> Result<Self> {
        let config = Self {
            batch_size,
            num_classes,
            num_timesteps,
            dt,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the top-k early-stopping threshold
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the verbosity level
    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the input mode
    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// Set the random seed for reproducible Poisson sampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable the classifier-removed output mapping
    pub fn with_remove_classifier(mut self, enabled: bool) -> Self {
        self.remove_classifier = enabled;
        self
    }

    /// Enable input-trace recording
    pub fn with_input_log(mut self, enabled: bool) -> Self {
        self.log_input = enabled;
        self
    }

    /// Enable spike-train recording
    pub fn with_spiketrain_log(mut self, enabled: bool) -> Self {
        self.log_spiketrains = enabled;
        self
    }

    /// Enable membrane-potential recording
    pub fn with_membrane_log(mut self, enabled: bool) -> Self {
        self.log_membrane = enabled;
        self
    }

    /// Enable synaptic-operation accounting
    pub fn with_synaptic_ops(mut self, enabled: bool) -> Self {
        self.log_synaptic_ops = enabled;
        self
    }

    /// Enable neuron-operation accounting
    pub fn with_neuron_ops(mut self, enabled: bool) -> Self {
        self.log_neuron_ops = enabled;
        self
    }

    /// Total simulated duration covered by one run
    pub fn duration(&self) -> f64 {
        self.num_timesteps as f64 * self.dt
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SimError::invalid_parameter(
                "batch_size",
                self.batch_size.to_string(),
                "> 0",
            ));
        }
        if self.num_classes == 0 {
            return Err(SimError::invalid_parameter(
                "num_classes",
                self.num_classes.to_string(),
                "> 0",
            ));
        }
        if self.num_timesteps == 0 {
            return Err(SimError::invalid_parameter(
                "num_timesteps",
                self.num_timesteps.to_string(),
                "> 0",
            ));
        }
        if self.dt <= 0.0 {
            return Err(SimError::invalid_parameter(
                "dt",
                self.dt.to_string(),
                "> 0.0",
            ));
        }
        if self.top_k == 0 || self.top_k > self.num_classes {
            return Err(SimError::invalid_parameter(
                "top_k",
                format!("{} (with num_classes={})", self.top_k, self.num_classes),
                "in 1..=num_classes",
            ));
        }
        if let InputMode::Poisson { rescale_fac, .. } = self.input_mode {
            if rescale_fac <= 0.0 {
                return Err(SimError::invalid_parameter(
                    "rescale_fac",
                    rescale_fac.to_string(),
                    "> 0.0",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.input_mode, InputMode::Static);
        assert!(!config.input_mode.is_dynamic());
    }

    #[test]
    fn test_config_validation() {
        // Zero batch
        assert!(SimConfig::new(0, 10, 50, 1.0).is_err());

        // Zero timesteps
        assert!(SimConfig::new(1, 10, 0, 1.0).is_err());

        // Non-positive dt
        assert!(SimConfig::new(1, 10, 50, 0.0).is_err());

        // top_k out of range
        let config = SimConfig::new(1, 3, 50, 1.0).unwrap().with_top_k(4);
        assert!(config.validate().is_err());
        let config = SimConfig::new(1, 3, 50, 1.0).unwrap().with_top_k(0);
        assert!(config.validate().is_err());

        // Valid
        let config = SimConfig::new(2, 10, 50, 0.5).unwrap().with_top_k(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_poisson_validation() {
        let config = SimConfig::new(1, 10, 50, 1.0)
            .unwrap()
            .with_input_mode(InputMode::Poisson {
                rescale_fac: 0.0,
                max_events_per_sample: None,
            });
        assert!(config.validate().is_err());

        let config = SimConfig::new(1, 10, 50, 1.0)
            .unwrap()
            .with_input_mode(InputMode::Poisson {
                rescale_fac: 1.0,
                max_events_per_sample: Some(100),
            });
        assert!(config.validate().is_ok());
        assert!(config.input_mode.is_dynamic());
    }

    #[test]
    fn test_config_duration() {
        let config = SimConfig::new(1, 10, 40, 0.5).unwrap();
        assert_eq!(config.duration(), 20.0);
    }
}
