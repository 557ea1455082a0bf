use anyhow::Result;
use crate::{PollConfig, StepConfig};

pub fn check_poll(poll: &PollConfig) -> Result<()> {
    anyhow::ensure!(poll.interval_ms >= 100, "poll.interval_ms too small; set >= 100");
    anyhow::ensure!(poll.interval_ms <= 60_000, "poll.interval_ms too large; set <= 60000");
    Ok(())
}

pub fn check_steps(steps: &StepConfig) -> Result<()> {
    for (name, deg) in [("big_deg", steps.big_deg), ("small_deg", steps.small_deg), ("tack_deg", steps.tack_deg)] {
        anyhow::ensure!((1..=180).contains(&deg), "steps.{} should be 1..180", name);
    }
    anyhow::ensure!(steps.big_deg > steps.small_deg, "steps.big_deg must exceed steps.small_deg");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(check_poll(&PollConfig::default()).is_ok());
        assert!(check_steps(&StepConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_values_fail() {
        assert!(check_poll(&PollConfig { interval_ms: 10, ..Default::default() }).is_err());
        assert!(check_steps(&StepConfig { tack_deg: 270, ..Default::default() }).is_err());
        assert!(check_steps(&StepConfig { big_deg: 1, small_deg: 5, tack_deg: 90 }).is_err());
    }
}
