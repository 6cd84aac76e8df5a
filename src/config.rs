//! Simulation configuration
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `CHORUS_*` environment variables. `CHORUS_SEED=42 chorus simulate`
//! overrides whatever the file says.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Settings for one simulator run.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Number of simulated devices on the shared network.
    pub devices: usize,

    /// Rounds to run in lockstep.
    pub rounds: u32,

    /// Delta-time reported to every device each round, in seconds.
    pub delta_time_secs: f64,

    /// Base seed; device `i` draws from `seed + i`.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            devices: 8,
            rounds: 10,
            delta_time_secs: 1.0,
            seed: 17,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = SimulationConfig::default();
        let mut builder = Config::builder()
            .set_default("devices", defaults.devices as i64)?
            .set_default("rounds", i64::from(defaults.rounds))?
            .set_default("delta_time_secs", defaults.delta_time_secs)?
            .set_default("seed", defaults.seed as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("CHORUS"));

        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration values")
    }
}
