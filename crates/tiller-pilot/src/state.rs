use std::sync::{Arc, Mutex, PoisonError};
use tiller_proto::telemetry::{PidGains, PollRecord, SensorBiases};
use time::OffsetDateTime;

/// Last telemetry record received from the device. Numeric fields are `None`
/// when the device reported them as unavailable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub heading: Option<f64>,
    /// `None` while the autopilot holds no course.
    pub course: Option<f64>,
    pub heel: Option<f64>,
    pub rudder_position: Option<f64>,
    pub raw_rudder_position: Option<f64>,
    pub control_output: Option<f64>,
    pub turn_rate: Option<f64>,
    pub port_limit: Option<f64>,
    pub starboard_limit: Option<f64>,
    pub motor: Option<f64>,
    /// Clutch engaged.
    pub engaged: bool,
    pub status_message: String,
}

impl From<PollRecord> for DeviceSnapshot {
    fn from(r: PollRecord) -> Self {
        Self {
            heading: r.heading,
            course: r.course,
            heel: r.heel,
            rudder_position: r.rudder_position,
            raw_rudder_position: r.raw_rudder_position,
            control_output: r.control_output,
            turn_rate: r.turn_rate,
            port_limit: r.port_limit,
            starboard_limit: r.starboard_limit,
            motor: r.motor,
            engaged: r.clutch_status,
            status_message: r.messages,
        }
    }
}

impl DeviceSnapshot {
    pub fn holds_course(&self) -> bool {
        self.course.is_some()
    }

    pub fn is_fault(&self) -> bool {
        self.status_message.starts_with("ERROR")
    }

    /// Port limit at or beyond the starboard limit. Unknown limits never
    /// count as inverted.
    pub fn limits_inverted(&self) -> bool {
        matches!((self.port_limit, self.starboard_limit), (Some(p), Some(s)) if p >= s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    #[default]
    Disconnected,
}

/// Everything the console knows about the device.
#[derive(Debug, Clone, Default)]
pub struct StateModel {
    snapshot: Option<DeviceSnapshot>,
    gains: Option<PidGains>,
    biases: Option<SensorBiases>,
    connectivity: Connectivity,
    updated_at: Option<OffsetDateTime>,
}

impl StateModel {
    /// Replaces the snapshot wholesale and marks the link connected.
    /// Returns the connectivity before the call.
    pub fn apply_snapshot(&mut self, snapshot: DeviceSnapshot) -> Connectivity {
        self.snapshot = Some(snapshot);
        self.updated_at = Some(OffsetDateTime::now_utc());
        std::mem::replace(&mut self.connectivity, Connectivity::Connected)
    }

    /// Marks the link down. The previous snapshot stays visible.
    /// Returns the connectivity before the call.
    pub fn mark_disconnected(&mut self) -> Connectivity {
        std::mem::replace(&mut self.connectivity, Connectivity::Disconnected)
    }

    pub fn apply_gains(&mut self, gains: PidGains) {
        self.gains = Some(gains);
    }

    pub fn apply_biases(&mut self, biases: SensorBiases) {
        self.biases = Some(biases);
    }

    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn gains(&self) -> Option<PidGains> {
        self.gains
    }

    pub fn biases(&self) -> Option<SensorBiases> {
        self.biases
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn updated_at(&self) -> Option<OffsetDateTime> {
        self.updated_at
    }

    /// Course controls are usable only while the device holds a course.
    pub fn controls_enabled(&self) -> bool {
        self.snapshot.as_ref().is_some_and(DeviceSnapshot::holds_course)
    }

    /// Limit ordering violated on live data. Stale data never warns.
    pub fn limit_violation(&self) -> bool {
        self.connectivity == Connectivity::Connected
            && self.snapshot.as_ref().is_some_and(DeviceSnapshot::limits_inverted)
    }
}

/// Cloneable handle to the one [`StateModel`] of a session.
///
/// The lock is only taken for synchronous reads and replaces, never across an
/// await point.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<StateModel>>);

impl SharedState {
    pub fn new(model: StateModel) -> Self {
        Self(Arc::new(Mutex::new(model)))
    }

    pub fn read<R>(&self, f: impl FnOnce(&StateModel) -> R) -> R {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut StateModel) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(course: Option<f64>, port: f64, stbd: f64) -> DeviceSnapshot {
        DeviceSnapshot {
            heading: Some(100.0),
            course,
            port_limit: Some(port),
            starboard_limit: Some(stbd),
            status_message: "Ok".into(),
            ..Default::default()
        }
    }

    #[test]
    fn starts_disconnected_with_controls_disabled() {
        let m = StateModel::default();
        assert_eq!(m.connectivity(), Connectivity::Disconnected);
        assert!(!m.controls_enabled());
        assert!(m.snapshot().is_none());
    }

    #[test]
    fn apply_replaces_whole_record() {
        let mut m = StateModel::default();
        let mut first = snapshot(Some(90.0), 10.0, 20.0);
        first.turn_rate = Some(3.0);
        m.apply_snapshot(first);

        let second = snapshot(None, 30.0, 40.0);
        m.apply_snapshot(second.clone());
        assert_eq!(m.snapshot(), Some(&second));
        assert_eq!(m.snapshot().unwrap().turn_rate, None);
    }

    #[test]
    fn connectivity_flips_without_debounce() {
        let mut m = StateModel::default();
        assert_eq!(m.apply_snapshot(snapshot(Some(1.0), 1.0, 2.0)), Connectivity::Disconnected);
        assert_eq!(m.mark_disconnected(), Connectivity::Connected);
        assert_eq!(m.connectivity(), Connectivity::Disconnected);
        assert!(m.snapshot().is_some(), "stale snapshot stays visible");
        m.apply_snapshot(snapshot(Some(1.0), 1.0, 2.0));
        assert_eq!(m.connectivity(), Connectivity::Connected);
    }

    #[test]
    fn controls_follow_course_only() {
        let mut m = StateModel::default();
        let mut s = snapshot(None, 1.0, 2.0);
        s.engaged = true;
        m.apply_snapshot(s);
        assert!(!m.controls_enabled());
        m.apply_snapshot(snapshot(Some(0.0), 1.0, 2.0));
        assert!(m.controls_enabled());
    }

    #[test]
    fn limit_violation_needs_live_data() {
        let mut m = StateModel::default();
        m.apply_snapshot(snapshot(None, 50.0, 40.0));
        assert!(m.limit_violation());
        m.mark_disconnected();
        assert!(!m.limit_violation());
        m.apply_snapshot(snapshot(None, 40.0, 40.0));
        assert!(m.limit_violation(), "equal limits are inverted too");
        m.apply_snapshot(snapshot(None, 30.0, 40.0));
        assert!(!m.limit_violation());
    }

    #[test]
    fn unknown_limits_never_warn() {
        let mut s = snapshot(None, 50.0, 40.0);
        s.starboard_limit = None;
        assert!(!s.limits_inverted());
    }

    #[test]
    fn fault_prefix() {
        let mut s = DeviceSnapshot::default();
        s.status_message = "ERROR: rudder sensor".into();
        assert!(s.is_fault());
        s.status_message = "Ok ERROR".into();
        assert!(!s.is_fault());
    }
}
