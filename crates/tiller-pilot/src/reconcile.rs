use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tiller_link::{fetch, Transport, TransportError};
use tiller_proto::telemetry::{
    CourseRecord, HeadingRecord, HeelRecord, InterfaceParams, MessagesRecord, PidGains, PollRecord, SensorBiases,
};
use tiller_proto::wire::Endpoint;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::state::{Connectivity, DeviceSnapshot, SharedState, StateModel};
use crate::PollMode;

/// Shown in place of the course while none is held.
pub const COURSE_PLACEHOLDER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSide {
    Port,
    Starboard,
}

/// Advisory raised when the port limit is not below the starboard limit.
/// The wording depends on which limit the helmsman just set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWarning {
    PortNotBelowStarboard,
    StarboardNotAbovePort,
}

impl LimitWarning {
    fn after(side: Option<LimitSide>) -> Self {
        match side {
            Some(LimitSide::Starboard) => LimitWarning::StarboardNotAbovePort,
            Some(LimitSide::Port) | None => LimitWarning::PortNotBelowStarboard,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LimitWarning::PortNotBelowStarboard => "Port Limit should be less than Starboard Limit",
            LimitWarning::StarboardNotAbovePort => "Starboard Limit should be greater than Port Limit",
        }
    }
}

impl fmt::Display for LimitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Online,
    /// Device reachable but reporting an `ERROR` message.
    Fault,
    Disconnected,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Indicator::Online => "Online",
            Indicator::Fault => "Online (fault)",
            Indicator::Disconnected => "Disconnected",
        })
    }
}

/// What a cycle asks the renderer to show.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub indicator: Indicator,
    pub course_text: String,
    pub heading: Option<f64>,
    pub heel: Option<f64>,
    pub rudder_position: Option<f64>,
    pub engaged: bool,
    pub controls_enabled: bool,
    pub limit_warning: Option<LimitWarning>,
    pub status_message: String,
    /// Raw interface readings, for the diagnostics panel.
    pub diagnostics: String,
}

impl View {
    /// Derives the view from the current state. `limit_context` selects the
    /// wording of the limit advisory after a limit was just set.
    pub fn derive(state: &StateModel, limit_context: Option<LimitSide>) -> Self {
        let connected = state.connectivity() == Connectivity::Connected;
        let empty = DeviceSnapshot::default();
        let snap = state.snapshot().unwrap_or(&empty);

        let indicator = if !connected {
            Indicator::Disconnected
        } else if snap.is_fault() {
            Indicator::Fault
        } else {
            Indicator::Online
        };

        let controls_enabled = state.controls_enabled();
        let course_text = match snap.course {
            Some(c) if controls_enabled => format!("{:03.0}", c),
            _ => COURSE_PLACEHOLDER.to_string(),
        };

        Self {
            indicator,
            course_text,
            heading: snap.heading,
            heel: snap.heel,
            rudder_position: snap.rudder_position,
            engaged: snap.engaged,
            controls_enabled,
            limit_warning: state.limit_violation().then(|| LimitWarning::after(limit_context)),
            status_message: snap.status_message.clone(),
            diagnostics: format!(
                "plim={} slim={} motor={} rudder={} raw-rudder={} control={} turn_rate={}",
                raw(snap.port_limit),
                raw(snap.starboard_limit),
                raw(snap.motor),
                raw(snap.rudder_position),
                raw(snap.raw_rudder_position),
                raw(snap.control_output),
                raw(snap.turn_rate),
            ),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] course {}  heading {}  heel {}  rudder {}  clutch {}  controls {}",
            self.indicator,
            self.course_text,
            degrees(self.heading),
            heel(self.heel),
            raw(self.rudder_position),
            if self.engaged { "ON" } else { "off" },
            if self.controls_enabled { "enabled" } else { "disabled" },
        )?;
        if let Some(w) = self.limit_warning {
            write!(f, "\n  ! {}", w)?;
        }
        Ok(())
    }
}

fn raw(v: Option<f64>) -> String {
    v.map_or_else(|| "?".into(), |x| x.to_string())
}

fn degrees(v: Option<f64>) -> String {
    v.map_or_else(|| COURSE_PLACEHOLDER.into(), |x| format!("{:03.0}", x))
}

fn heel(v: Option<f64>) -> String {
    match v {
        None => COURSE_PLACEHOLDER.into(),
        Some(x) if x.abs() < 1.5 => "LEVEL".into(),
        Some(x) if x > 0.0 => format!("{:.0} STBD", x),
        Some(x) => format!("{:.0} PORT", -x),
    }
}

/// A request for an out-of-band telemetry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Telemetry,
    /// Re-poll after a limit was latched; the advisory names that side.
    AfterLimit(LimitSide),
}

/// Runs poll cycles against the device and publishes the resulting views.
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    state: SharedState,
    mode: PollMode,
    views: watch::Sender<View>,
    cycles: AtomicU64,
}

impl Reconciler {
    pub fn new(transport: Arc<dyn Transport>, state: SharedState, mode: PollMode) -> Self {
        let initial = state.read(|s| View::derive(s, None));
        let (views, _) = watch::channel(initial);
        Self { transport, state, mode, views, cycles: AtomicU64::new(0) }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Render sink: every cycle publishes its view here.
    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.views.subscribe()
    }

    pub async fn cycle(&self) -> View {
        self.run_cycle(None).await
    }

    pub async fn refresh(&self, request: Refresh) -> View {
        match request {
            Refresh::Telemetry => self.run_cycle(None).await,
            Refresh::AfterLimit(side) => self.run_cycle(Some(side)).await,
        }
    }

    /// Every event of a cycle, transport logging included, is recorded inside
    /// a `cycle{id}` span so overlapping cycles can be told apart.
    async fn run_cycle(&self, limit_context: Option<LimitSide>) -> View {
        let id = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.reconcile(limit_context).instrument(info_span!("cycle", id)).await
    }

    async fn reconcile(&self, limit_context: Option<LimitSide>) -> View {
        let fetched = self.fetch_snapshot().await;

        // Whichever cycle lands last wins; there is no sequencing between
        // overlapping cycles.
        let view = match fetched {
            Ok(snapshot) => {
                let (was, view) = self.state.update(|s| {
                    let was = s.apply_snapshot(snapshot);
                    (was, View::derive(s, limit_context))
                });
                if was == Connectivity::Disconnected {
                    info!("pilot: device online");
                }
                view
            }
            Err(e) => {
                let (was, view) = self.state.update(|s| {
                    let was = s.mark_disconnected();
                    (was, View::derive(s, limit_context))
                });
                if was == Connectivity::Connected {
                    warn!("pilot: device disconnected: {}", e);
                } else {
                    debug!("pilot: still disconnected: {}", e);
                }
                view
            }
        };

        if let Some(w) = view.limit_warning {
            warn!("pilot: {}", w);
        }
        debug!("pilot: cycle done, {}", view.indicator);
        self.views.send_replace(view.clone());
        view
    }

    async fn fetch_snapshot(&self) -> Result<DeviceSnapshot, TransportError> {
        let t = self.transport.as_ref();
        let record = match self.mode {
            PollMode::Combined => fetch::<PollRecord, _>(t, Endpoint::Poll).await?,
            PollMode::Split => PollRecord::assemble(
                fetch::<CourseRecord, _>(t, Endpoint::GetCourse).await?,
                fetch::<HeadingRecord, _>(t, Endpoint::GetHeading).await?,
                fetch::<HeelRecord, _>(t, Endpoint::GetHeel).await?,
                fetch::<MessagesRecord, _>(t, Endpoint::GetMessages).await?,
                fetch::<InterfaceParams, _>(t, Endpoint::GetInterfaceParams).await?,
            ),
        };
        Ok(record.into())
    }

    /// Fetches the device's stored gains and applies them.
    pub async fn refresh_gains(&self) -> Result<PidGains, TransportError> {
        let gains: PidGains = fetch(self.transport.as_ref(), Endpoint::GetPid).await?;
        self.state.update(|s| s.apply_gains(gains));
        info!("pilot: gains p={} i={} d={}", gains.p, gains.i, gains.d);
        Ok(gains)
    }

    /// Fetches the device's sensor biases and applies them.
    pub async fn refresh_biases(&self) -> Result<SensorBiases, TransportError> {
        let biases: SensorBiases = fetch(self.transport.as_ref(), Endpoint::GetBiases).await?;
        self.state.update(|s| s.apply_biases(biases));
        debug!("pilot: biases {:?}", biases);
        Ok(biases)
    }
}
