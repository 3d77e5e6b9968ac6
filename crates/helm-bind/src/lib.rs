pub mod doctor;
pub mod error;
pub mod geo;
pub mod host;
pub mod manager;
pub mod modes;
pub mod param;
pub mod registry;
pub mod resubscribe;
pub mod sim;

use serde::Deserialize;

pub use error::{BindingError, Result};
pub use host::{
    BindingRegistry, BoundValue, ConnectivityRelay, FlightState, Host, SteeringAuthorities,
    SteeringAuthority, Vessels,
};
pub use manager::{AttachState, ControlBindingManager};
pub use modes::{AutopilotMode, NavMode};
pub use param::{ChannelKind, ControlParameter};
pub use registry::{ControlHandle, ControlRegistry, SharedRegistry};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Updates to wait before re-installing the autopilot hook while the relay
    /// reports it has dropped it.
    pub resubscribe_period: u32,

    /// Wheel steering leaves the frame alone at or below this horizontal
    /// surface speed (m/s).
    pub wheel_steer_min_speed: f64,

    /// Bearing error in degrees that maps to full wheel deflection.
    pub wheel_steer_deg_per_unit: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            resubscribe_period: 25,
            wheel_steer_min_speed: 0.1,
            wheel_steer_deg_per_unit: 10.0,
        }
    }
}
