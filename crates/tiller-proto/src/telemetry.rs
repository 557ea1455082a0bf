use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// What the device reports as `course` while no course is held.
pub const COURSE_UNAVAILABLE: &str = "NAN";

/// Body of `poll`. Numeric fields are `None` when missing or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollRecord {
    #[serde(default, deserialize_with = "lenient_reading")]
    pub port_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub starboard_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub motor: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub rudder_position: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub raw_rudder_position: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub control_output: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub turn_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub course: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub heel: Option<f64>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub clutch_status: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub messages: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CourseRecord {
    #[serde(default, deserialize_with = "lenient_reading")]
    pub course: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeadingRecord {
    #[serde(default, deserialize_with = "lenient_reading")]
    pub heading: Option<f64>,
}

/// `get_heel` answers `"LEVEL"`, `"004 STBD"` or `"012 PORT"`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeelRecord {
    #[serde(default, deserialize_with = "lenient_heel")]
    pub heel: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessagesRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub messages: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InterfaceParams {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub clutch_status: bool,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub port_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub starboard_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub motor: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub rudder_position: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub raw_rudder_position: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub control_output: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub turn_rate: Option<f64>,
}

impl PollRecord {
    /// Builds the equivalent of a `poll` body from the narrow endpoints.
    pub fn assemble(
        course: CourseRecord,
        heading: HeadingRecord,
        heel: HeelRecord,
        messages: MessagesRecord,
        params: InterfaceParams,
    ) -> Self {
        Self {
            port_limit: params.port_limit,
            starboard_limit: params.starboard_limit,
            motor: params.motor,
            rudder_position: params.rudder_position,
            raw_rudder_position: params.raw_rudder_position,
            control_output: params.control_output,
            turn_rate: params.turn_rate,
            heading: heading.heading,
            course: course.course,
            heel: heel.heel,
            clutch_status: params.clutch_status,
            messages: messages.messages,
        }
    }
}

/// PID gains as stored on the device. Accepted as numbers or numeric strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    #[serde(rename = "pid_p", deserialize_with = "strict_reading")]
    pub p: f64,
    #[serde(rename = "pid_i", deserialize_with = "strict_reading")]
    pub i: f64,
    #[serde(rename = "pid_d", deserialize_with = "strict_reading")]
    pub d: f64,
}

/// Gyro and accelerometer zero offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorBiases {
    #[serde(deserialize_with = "strict_reading")]
    pub gyro_x: f64,
    #[serde(deserialize_with = "strict_reading")]
    pub gyro_y: f64,
    #[serde(deserialize_with = "strict_reading")]
    pub gyro_z: f64,
    #[serde(deserialize_with = "strict_reading")]
    pub accel_x: f64,
    #[serde(deserialize_with = "strict_reading")]
    pub accel_y: f64,
    #[serde(deserialize_with = "strict_reading")]
    pub accel_z: f64,
}

/// Numeric value of a JSON field, or `None` for the unavailable sentinel,
/// non-numeric text, non-finite numbers and anything that is not a number
/// or a string.
pub fn reading(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case(COURSE_UNAVAILABLE) {
                return None;
            }
            s.parse::<f64>().ok().filter(|x| x.is_finite())
        }
        _ => None,
    }
}

/// Engagement flag in any of the encodings the device uses.
pub fn flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
        _ => false,
    }
}

/// Heel in degrees, starboard positive.
pub fn heel(v: &Value) -> Option<f64> {
    if let Some(x) = reading(v) {
        return Some(x);
    }
    let s = v.as_str()?.trim();
    if s.eq_ignore_ascii_case("LEVEL") {
        return Some(0.0);
    }
    let (magnitude, side) = s.split_once(char::is_whitespace)?;
    let magnitude: f64 = magnitude.trim().parse().ok()?;
    match side.trim().to_ascii_uppercase().as_str() {
        "STBD" => Some(magnitude),
        "PORT" => Some(-magnitude),
        _ => None,
    }
}

fn lenient_reading<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(reading(&Value::deserialize(d)?))
}

fn lenient_heel<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(heel(&Value::deserialize(d)?))
}

fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(flag(&Value::deserialize(d)?))
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn strict_reading<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    reading(&v).ok_or_else(|| de::Error::custom(format!("expected a number, got {}", v)))
}
