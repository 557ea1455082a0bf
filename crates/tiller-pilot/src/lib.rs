pub mod command;
pub mod doctor;
pub mod reconcile;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Period of the telemetry cycle.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// `combined` reads the single `poll` record; `split` assembles the same
    /// record from the narrow get_course/get_heading/... endpoints, for
    /// older device firmware.
    #[serde(default)]
    pub mode: PollMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    #[default]
    Combined,
    Split,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms(), mode: PollMode::default() }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    1000
}

/// Course-change magnitudes offered to the helmsman, in degrees.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    #[serde(default = "default_big_deg")]
    pub big_deg: u32,
    #[serde(default = "default_small_deg")]
    pub small_deg: u32,
    #[serde(default = "default_tack_deg")]
    pub tack_deg: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            big_deg: default_big_deg(),
            small_deg: default_small_deg(),
            tack_deg: default_tack_deg(),
        }
    }
}

impl StepConfig {
    /// True when `delta` is plus or minus one of the configured steps.
    pub fn allows(&self, delta: i32) -> bool {
        delta != 0 && [self.big_deg, self.small_deg, self.tack_deg].contains(&delta.unsigned_abs())
    }
}

fn default_big_deg() -> u32 {
    10
}

fn default_small_deg() -> u32 {
    1
}

fn default_tack_deg() -> u32 {
    100
}
