use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tiller_link::{Transport, TransportError};
use tiller_proto::wire::Endpoint;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::reconcile::{LimitSide, Reconciler, Refresh};
use crate::state::StateModel;
use crate::StepConfig;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("course controls are disabled (no course held)")]
    ControlsDisabled,

    #[error("unsupported course step {0:+}")]
    UnsupportedStep(i32),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStep {
    Big,
    Small,
    Tack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Port,
    Starboard,
}

/// Non-blocking request for a telemetry cycle. Sending never waits, and a
/// request sent after the receiving loop is gone is dropped.
#[derive(Debug, Clone)]
pub struct RefreshTrigger(mpsc::UnboundedSender<Refresh>);

impl RefreshTrigger {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Refresh>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn notify(&self, request: Refresh) {
        if self.0.send(request).is_err() {
            debug!("pilot: refresh {:?} dropped, no cycle runner", request);
        }
    }
}

/// Turns helm actions into device requests.
///
/// Commands never update the state model themselves. Telemetry-affecting
/// commands ask for a refresh cycle without awaiting it, so the periodic
/// cycle and the refresh may race; whichever response lands last is shown.
/// Gains and biases are re-read directly since they are not polled.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    reconciler: Arc<Reconciler>,
    steps: StepConfig,
    refresh: RefreshTrigger,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        reconciler: Arc<Reconciler>,
        steps: StepConfig,
        refresh: RefreshTrigger,
    ) -> Self {
        Self { transport, reconciler, steps, refresh }
    }

    /// Signed course change for a step. Steps too large for an `i32`
    /// saturate, and `adjust_course` then refuses them.
    pub fn delta(&self, step: CourseStep, direction: Direction) -> i32 {
        let degrees = match step {
            CourseStep::Big => self.steps.big_deg,
            CourseStep::Small => self.steps.small_deg,
            CourseStep::Tack => self.steps.tack_deg,
        };
        let magnitude = i32::try_from(degrees).unwrap_or(i32::MAX);
        match direction {
            Direction::Port => -magnitude,
            Direction::Starboard => magnitude,
        }
    }

    pub async fn adjust(&self, step: CourseStep, direction: Direction) -> Result<(), CommandError> {
        self.adjust_course(self.delta(step, direction)).await
    }

    /// Changes the held course by `delta` degrees (negative = port).
    pub async fn adjust_course(&self, delta: i32) -> Result<(), CommandError> {
        if !self.steps.allows(delta) {
            return Err(CommandError::UnsupportedStep(delta));
        }
        if !self.reconciler.state().read(StateModel::controls_enabled) {
            return Err(CommandError::ControlsDisabled);
        }
        info!("pilot: adjust course {:+}", delta);
        let sent = self.send(Endpoint::AdjustCourse(delta), None).await;
        self.refresh.notify(Refresh::Telemetry);
        sent
    }

    /// Engages or releases the autopilot. The device may refuse (e.g. no
    /// valid course); the next cycle shows what it actually did.
    pub async fn set_engagement(&self, enabled: bool) -> Result<(), CommandError> {
        info!("pilot: {} autopilot", if enabled { "enabling" } else { "disabling" });
        let sent = self.send(Endpoint::SetStatus(enabled), None).await;
        self.refresh.notify(Refresh::Telemetry);
        sent
    }

    pub async fn toggle_engagement(&self) -> Result<(), CommandError> {
        info!("pilot: toggle autopilot");
        let sent = self.send(Endpoint::ToggleStatus, None).await;
        self.refresh.notify(Refresh::Telemetry);
        sent
    }

    /// Sends new gains, then re-reads what the device stored whatever the
    /// update's outcome. The device may clamp or reject values.
    pub async fn set_gains(&self, p: f64, i: f64, d: f64) -> Result<(), CommandError> {
        info!("pilot: set gains p={} i={} d={}", p, i, d);
        let body = json!({ "pid_p": p, "pid_i": i, "pid_d": d });
        let sent = self.send(Endpoint::SetPid, Some(&body)).await;
        if let Err(e) = self.reconciler.refresh_gains().await {
            warn!("pilot: gains re-read failed: {}", e);
        }
        sent
    }

    /// Latches the device's current rudder reading as the given limit.
    pub async fn set_limit(&self, side: LimitSide) -> Result<(), CommandError> {
        let endpoint = match side {
            LimitSide::Port => Endpoint::SetPortLimit,
            LimitSide::Starboard => Endpoint::SetStbdLimit,
        };
        info!("pilot: set {:?} limit", side);
        let sent = self.send(endpoint, None).await;
        self.refresh.notify(Refresh::AfterLimit(side));
        sent
    }

    pub async fn reset_biases(&self) -> Result<(), CommandError> {
        info!("pilot: reset sensor biases");
        let sent = self.send(Endpoint::ResetBiases, None).await;
        if let Err(e) = self.reconciler.refresh_biases().await {
            warn!("pilot: biases re-read failed: {}", e);
        }
        sent
    }

    async fn send(&self, endpoint: Endpoint, body: Option<&Value>) -> Result<(), CommandError> {
        match self.transport.request(endpoint, body).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("pilot: command failed: {}", e);
                Err(e.into())
            }
        }
    }
}
