use anyhow::{Context, Result};
use tiller_pilot::command::{CourseStep, Direction};
use tiller_pilot::reconcile::LimitSide;

/// One line typed at the `run` prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Course(i32),
    Step(CourseStep, Direction),
    Engage(bool),
    Toggle,
    Gains(f64, f64, f64),
    Limit(LimitSide),
    ResetBiases,
    Help,
    Quit,
}

pub const HELP: &str = "\
  +N | -N              change course by N degrees (configured steps only)
  port|stbd big|small|tack
  on | off | toggle    engage / release the autopilot
  pid P I D            set gains
  limit port|stbd      latch the current rudder reading as a limit
  biases reset         reset gyro/accelerometer biases
  help | quit";

pub fn parse(line: &str) -> Result<Action> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let action = match words.as_slice() {
        [] | ["help"] | ["?"] => Action::Help,
        ["quit"] | ["q"] | ["exit"] => Action::Quit,
        ["on"] => Action::Engage(true),
        ["off"] => Action::Engage(false),
        ["toggle"] => Action::Toggle,
        [side @ ("port" | "stbd" | "starboard"), step] => {
            let direction = if *side == "port" { Direction::Port } else { Direction::Starboard };
            let step = match *step {
                "big" => CourseStep::Big,
                "small" => CourseStep::Small,
                "tack" => CourseStep::Tack,
                other => anyhow::bail!("unknown step '{}' (big, small or tack)", other),
            };
            Action::Step(step, direction)
        }
        ["pid", p, i, d] => Action::Gains(gain(p)?, gain(i)?, gain(d)?),
        ["limit", "port"] => Action::Limit(LimitSide::Port),
        ["limit", "stbd" | "starboard"] => Action::Limit(LimitSide::Starboard),
        ["biases", "reset"] => Action::ResetBiases,
        [delta] if delta.starts_with(['+', '-']) => {
            Action::Course(delta.parse().with_context(|| format!("bad course change '{}'", delta))?)
        }
        _ => anyhow::bail!("unrecognised command '{}' (try 'help')", line.trim()),
    };
    Ok(action)
}

fn gain(s: &str) -> Result<f64> {
    let v: f64 = s.parse().with_context(|| format!("bad gain '{}'", s))?;
    anyhow::ensure!(v.is_finite(), "gain must be finite");
    Ok(v)
}
