//! Seams to everything the binding manager drives but does not own: the
//! vessel/world view, the connectivity relay, the steering authority and the
//! scripting layer's binding table.

use helm_proto::{CommandValue, GeoCoordinates, OwnerId, VesselId, VesselRef};

use crate::modes::{AutopilotMode, NavMode};
use crate::param::ChannelKind;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightState {
    pub position: GeoCoordinates,
    pub heading_deg: f64,
    pub velocity_heading_deg: f64,
    pub horizontal_srf_speed: f64,
    /// Throttle the vessel is actually running at.
    pub main_throttle: f32,
}

pub trait Vessels {
    /// Vessel the scripting context's part belongs to right now.
    fn host_vessel(&self) -> Option<VesselRef>;

    /// Current view of a vessel; None once it no longer exists.
    fn vessel(&self, id: VesselId) -> Option<VesselRef>;

    fn is_loaded(&self, id: VesselId) -> bool;

    fn flight_state(&self, id: VesselId) -> Option<FlightState>;

    fn active_vessel(&self) -> Option<VesselId>;

    fn has_target(&self) -> bool;

    fn autopilot_mode(&self, id: VesselId) -> Option<AutopilotMode>;

    /// False when the pilot/probe lacks the mode or it needs a node/target that isn't there.
    fn can_set_autopilot_mode(&self, id: VesselId, mode: AutopilotMode) -> bool;

    fn set_autopilot_mode(&mut self, id: VesselId, mode: AutopilotMode);

    fn nav_mode(&self) -> NavMode;

    fn set_nav_mode(&mut self, mode: NavMode);

    fn show_autopilot_mode(&mut self, code: i32);
}

/// Relay that delivers per physics step autopilot callbacks. It may drop a
/// hook on its own and then asks for it to be installed again.
pub trait ConnectivityRelay {
    /// Installing a hook that is already present must not add a second one.
    fn install_hook(&mut self, vessel: VesselId, hook: OwnerId);

    fn remove_hook(&mut self, vessel: VesselId, hook: OwnerId);

    fn needs_resubscribe(&self) -> bool;
}

pub trait SteeringAuthority {
    fn enabled(&self) -> bool;

    fn controlling_owner(&self) -> Option<OwnerId>;

    fn enable_control(&mut self, owner: OwnerId);

    fn disable_control(&mut self, owner: OwnerId);

    /// Validation is the authority's business; the error text goes back to the script.
    fn update_value(&mut self, value: CommandValue, owner: OwnerId) -> Result<(), String>;

    fn value(&self) -> Option<CommandValue>;
}

pub trait SteeringAuthorities {
    fn steering(&mut self, vessel: VesselId) -> Option<&mut dyn SteeringAuthority>;
}

/// What a scripting name reads and writes. The scripting layer hands it back
/// to `ControlBindingManager::get_bound` / `set_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundValue {
    Channel(ChannelKind),
    AutopilotMode,
    NavMode,
}

pub trait BindingRegistry {
    fn add_getter(&mut self, name: &str, target: BoundValue);

    fn add_setter(&mut self, name: &str, target: BoundValue);
}

pub trait Host: Vessels + ConnectivityRelay + SteeringAuthorities + BindingRegistry {}

impl<T: Vessels + ConnectivityRelay + SteeringAuthorities + BindingRegistry> Host for T {}
