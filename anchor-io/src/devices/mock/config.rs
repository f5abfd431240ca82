//! Simulated radio configuration
//!
//! Every parameter has a default, so `[radio.simulation]` may be omitted
//! entirely:
//!
//! ```toml
//! [radio.simulation]
//! seed = 42                  # 0 = random each run
//! noise_stddev = 6.0         # ADC units, well under the default threshold
//! burst_amplitude = 2000.0
//! burst_probability = 0.05   # per batch, ignored when a pattern is given
//! activity_pattern = [true, true, false]
//! overflow_every = 0         # 0 = never
//! realtime = true
//! ```
//!
//! | Parameter | Default | Meaning |
//! |-----------|---------|---------|
//! | chips | 2 | Physical AD9361 chips (calibration flags) |
//! | noise_stddev | 6.0 | Gaussian noise on every scalar |
//! | burst_amplitude | 2000.0 | Tone amplitude in active batches |
//! | burst_probability | 0.05 | Chance a batch carries a burst |
//! | activity_pattern | [] | Deterministic per-batch activity, cycled |
//! | overflow_every | 0 | Report an overflow every N refills |
//! | realtime | true | Sleep for the buffer duration on refill |

use serde::{Deserialize, Serialize};

/// Simulated radio parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// RNG seed (0 = random)
    #[serde(default)]
    pub seed: u64,

    /// Number of simulated chips taking part in synchronization
    #[serde(default = "default_chips")]
    pub chips: usize,

    /// Background noise standard deviation (ADC units)
    #[serde(default = "default_noise_stddev")]
    pub noise_stddev: f32,

    /// Peak amplitude of the tone written into active batches
    #[serde(default = "default_burst_amplitude")]
    pub burst_amplitude: f32,

    /// Probability a batch is active when no pattern is configured
    #[serde(default = "default_burst_probability")]
    pub burst_probability: f32,

    /// Per-batch activity, repeated; overrides `burst_probability` when non-empty
    #[serde(default)]
    pub activity_pattern: Vec<bool>,

    /// Raise the overflow flag on every Nth refill (0 = never)
    #[serde(default)]
    pub overflow_every: u64,

    /// Pace refills at the configured sample rate
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

fn default_chips() -> usize {
    2
}
fn default_noise_stddev() -> f32 {
    6.0
}
fn default_burst_amplitude() -> f32 {
    2000.0
}
fn default_burst_probability() -> f32 {
    0.05
}
fn default_realtime() -> bool {
    true
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            chips: default_chips(),
            noise_stddev: default_noise_stddev(),
            burst_amplitude: default_burst_amplitude(),
            burst_probability: default_burst_probability(),
            activity_pattern: Vec::new(),
            overflow_every: 0,
            realtime: default_realtime(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: SimulationConfig = toml::from_str("").unwrap();
        assert_eq!(config.chips, 2);
        assert_eq!(config.noise_stddev, 6.0);
        assert!(config.activity_pattern.is_empty());
        assert!(config.realtime);
    }

    #[test]
    fn test_pattern_parses() {
        let config: SimulationConfig =
            toml::from_str("activity_pattern = [true, false]\noverflow_every = 4").unwrap();
        assert_eq!(config.activity_pattern, vec![true, false]);
        assert_eq!(config.overflow_every, 4);
    }
}
