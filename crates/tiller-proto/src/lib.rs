//! Wire model of the autopilot's HTTP interface: the endpoint set and the
//! records it exchanges.

pub mod telemetry;
pub mod wire;
