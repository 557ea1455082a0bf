use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Every request the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Full telemetry record.
    Poll,
    GetPid,
    SetPid,
    GetBiases,
    ResetBiases,
    /// Latch the current rudder reading as the port limit.
    SetPortLimit,
    /// Latch the current rudder reading as the starboard limit.
    SetStbdLimit,
    /// Signed course change in degrees (negative = port).
    AdjustCourse(i32),
    ToggleStatus,
    SetStatus(bool),

    // Narrow per-field variants of `Poll`
    GetCourse,
    GetHeading,
    GetHeel,
    GetMessages,
    GetInterfaceParams,
}

impl Endpoint {
    /// Path relative to the device root, without a leading slash.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Poll => "poll".into(),
            Endpoint::GetPid => "get_pid".into(),
            Endpoint::SetPid => "set_pid".into(),
            Endpoint::GetBiases => "get_biases".into(),
            Endpoint::ResetBiases => "reset_biases".into(),
            Endpoint::SetPortLimit => "set_port_limit".into(),
            Endpoint::SetStbdLimit => "set_stbd_limit".into(),
            Endpoint::AdjustCourse(delta) => format!("adjust_course/{:+}", delta),
            Endpoint::ToggleStatus => "toggle_status".into(),
            Endpoint::SetStatus(true) => "set_status/enabled".into(),
            Endpoint::SetStatus(false) => "set_status/disabled".into(),
            Endpoint::GetCourse => "get_course".into(),
            Endpoint::GetHeading => "get_heading".into(),
            Endpoint::GetHeel => "get_heel".into(),
            Endpoint::GetMessages => "get_messages".into(),
            Endpoint::GetInterfaceParams => "get_interface_params".into(),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::SetPid => Method::Post,
            _ => Method::Get,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
