//! In-memory world implementing every host seam. Backs the tests and the
//! `helm run` scenario replay.

use std::collections::{BTreeMap, BTreeSet};

use helm_proto::{CommandValue, OwnerId, RootPartId, VesselId, VesselRef};
use tracing::debug;

use crate::host::{
    BindingRegistry, BoundValue, ConnectivityRelay, FlightState, SteeringAuthorities,
    SteeringAuthority, Vessels,
};
use crate::modes::{AutopilotMode, NavMode};

#[derive(Debug, Clone)]
pub struct SimVessel {
    pub id: VesselId,
    pub root: Option<RootPartId>,
    pub loaded: bool,
    pub state: FlightState,
    pub autopilot: AutopilotMode,
    /// Maneuver hold needs a node
    pub has_node: bool,
}

impl SimVessel {
    fn new(id: VesselId, root: Option<RootPartId>) -> Self {
        Self {
            id,
            root,
            loaded: true,
            state: FlightState::default(),
            autopilot: AutopilotMode::StabilityAssist,
            has_node: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimSteering {
    pub enabled: bool,
    pub owner: Option<OwnerId>,
    pub value: Option<CommandValue>,
}

impl SteeringAuthority for SimSteering {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn controlling_owner(&self) -> Option<OwnerId> {
        self.owner
    }

    fn enable_control(&mut self, owner: OwnerId) {
        self.enabled = true;
        self.owner = Some(owner);
    }

    fn disable_control(&mut self, _owner: OwnerId) {
        self.enabled = false;
        self.owner = None;
    }

    fn update_value(&mut self, value: CommandValue, _owner: OwnerId) -> Result<(), String> {
        match value {
            CommandValue::Text(_) | CommandValue::Bool(_) => {
                Err(format!("cannot steer to a {}", value.kind_name()))
            }
            v => {
                self.value = Some(v);
                Ok(())
            }
        }
    }

    fn value(&self) -> Option<CommandValue> {
        self.value.clone()
    }
}

#[derive(Debug)]
pub struct SimWorld {
    pub vessels: BTreeMap<VesselId, SimVessel>,
    /// Vessel the scripting part sits in
    pub host: Option<VesselId>,
    pub active: Option<VesselId>,
    pub target_selected: bool,
    pub nav_mode: NavMode,

    pub hooks: BTreeSet<(VesselId, OwnerId)>,
    pub hook_installs: usize,
    pub resubscribe_needed: bool,
    /// When false the relay swallows install requests (keeps asking for resubscription)
    pub relay_accepts: bool,

    pub steering: BTreeMap<VesselId, SimSteering>,
    pub getters: BTreeMap<String, BoundValue>,
    pub setters: BTreeMap<String, BoundValue>,
    pub indicator: Vec<i32>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            vessels: BTreeMap::new(),
            host: None,
            active: None,
            target_selected: false,
            nav_mode: NavMode::Orbit,
            hooks: BTreeSet::new(),
            hook_installs: 0,
            resubscribe_needed: false,
            relay_accepts: true,
            steering: BTreeMap::new(),
            getters: BTreeMap::new(),
            setters: BTreeMap::new(),
            indicator: Vec::new(),
        }
    }

    /// Add (or replace) a loaded vessel.
    pub fn add_vessel(&mut self, id: VesselId, root: Option<RootPartId>) -> &mut SimVessel {
        let slot = self.vessels.entry(id).or_insert_with(|| SimVessel::new(id, root));
        *slot = SimVessel::new(id, root);
        slot
    }

    pub fn vessel_mut(&mut self, id: VesselId) -> Option<&mut SimVessel> {
        self.vessels.get_mut(&id)
    }

    pub fn board(&mut self, id: VesselId) {
        self.host = Some(id);
    }

    /// The scripting part breaks off into a new vessel, keeping the old one's motion.
    pub fn separate(&mut self, new_id: VesselId, root: Option<RootPartId>) -> &mut SimVessel {
        let state = self
            .host
            .and_then(|id| self.vessels.get(&id))
            .map(|v| v.state)
            .unwrap_or_default();
        debug!("sim: host part separates into {}", new_id);
        self.host = Some(new_id);
        let v = self.add_vessel(new_id, root);
        v.state = state;
        v
    }

    pub fn unload(&mut self, id: VesselId) {
        if let Some(v) = self.vessels.get_mut(&id) {
            v.loaded = false;
        }
    }

    /// Vessel no longer exists at all.
    pub fn destroy(&mut self, id: VesselId) {
        self.vessels.remove(&id);
        self.steering.remove(&id);
    }

    /// Relay loses every hook without telling anyone except through the resubscribe flag.
    pub fn drop_hooks(&mut self) {
        self.hooks.clear();
        self.resubscribe_needed = true;
    }

    pub fn has_hook(&self, vessel: VesselId, owner: OwnerId) -> bool {
        self.hooks.contains(&(vessel, owner))
    }

    pub fn hooks_on(&self, vessel: VesselId) -> Vec<OwnerId> {
        self.hooks
            .iter()
            .filter(|(v, _)| *v == vessel)
            .map(|(_, o)| *o)
            .collect()
    }

    pub fn steering_of(&mut self, vessel: VesselId) -> &mut SimSteering {
        self.steering.entry(vessel).or_default()
    }
}

impl Vessels for SimWorld {
    fn host_vessel(&self) -> Option<VesselRef> {
        self.host.and_then(|id| self.vessel(id))
    }

    fn vessel(&self, id: VesselId) -> Option<VesselRef> {
        self.vessels.get(&id).map(|v| VesselRef { id, root: v.root })
    }

    fn is_loaded(&self, id: VesselId) -> bool {
        self.vessels.get(&id).map_or(false, |v| v.loaded)
    }

    fn flight_state(&self, id: VesselId) -> Option<FlightState> {
        self.vessels.get(&id).map(|v| v.state)
    }

    fn active_vessel(&self) -> Option<VesselId> {
        self.active
    }

    fn has_target(&self) -> bool {
        self.target_selected
    }

    fn autopilot_mode(&self, id: VesselId) -> Option<AutopilotMode> {
        self.vessels.get(&id).map(|v| v.autopilot)
    }

    fn can_set_autopilot_mode(&self, id: VesselId, mode: AutopilotMode) -> bool {
        let Some(v) = self.vessels.get(&id) else { return false };
        match mode {
            AutopilotMode::Maneuver => v.has_node,
            AutopilotMode::Target | AutopilotMode::AntiTarget => self.target_selected,
            _ => true,
        }
    }

    fn set_autopilot_mode(&mut self, id: VesselId, mode: AutopilotMode) {
        if let Some(v) = self.vessels.get_mut(&id) {
            v.autopilot = mode;
        }
    }

    fn nav_mode(&self) -> NavMode {
        self.nav_mode
    }

    fn set_nav_mode(&mut self, mode: NavMode) {
        self.nav_mode = mode;
    }

    fn show_autopilot_mode(&mut self, code: i32) {
        self.indicator.push(code);
    }
}

impl ConnectivityRelay for SimWorld {
    fn install_hook(&mut self, vessel: VesselId, hook: OwnerId) {
        self.hook_installs += 1;
        if !self.relay_accepts {
            debug!("sim relay: install of {} on {} swallowed", hook, vessel);
            return;
        }
        self.hooks.insert((vessel, hook));
        self.resubscribe_needed = false;
    }

    fn remove_hook(&mut self, vessel: VesselId, hook: OwnerId) {
        self.hooks.remove(&(vessel, hook));
    }

    fn needs_resubscribe(&self) -> bool {
        self.resubscribe_needed
    }
}

impl SteeringAuthorities for SimWorld {
    fn steering(&mut self, vessel: VesselId) -> Option<&mut dyn SteeringAuthority> {
        if !self.vessels.contains_key(&vessel) {
            return None;
        }
        Some(self.steering.entry(vessel).or_default())
    }
}

impl BindingRegistry for SimWorld {
    fn add_getter(&mut self, name: &str, target: BoundValue) {
        self.getters.insert(name.to_string(), target);
    }

    fn add_setter(&mut self, name: &str, target: BoundValue) {
        self.setters.insert(name.to_string(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_install_is_idempotent() {
        let mut w = SimWorld::new();
        w.install_hook(VesselId(1), OwnerId(1));
        w.install_hook(VesselId(1), OwnerId(1));
        assert_eq!(w.hooks_on(VesselId(1)), vec![OwnerId(1)]);
        assert_eq!(w.hook_installs, 2);
    }

    #[test]
    fn test_drop_hooks_requests_resubscribe() {
        let mut w = SimWorld::new();
        w.install_hook(VesselId(1), OwnerId(1));
        w.drop_hooks();
        assert!(w.needs_resubscribe());
        assert!(!w.has_hook(VesselId(1), OwnerId(1)));
        w.install_hook(VesselId(1), OwnerId(1));
        assert!(!w.needs_resubscribe());
    }

    #[test]
    fn test_failing_relay_keeps_flag() {
        let mut w = SimWorld::new();
        w.relay_accepts = false;
        w.drop_hooks();
        w.install_hook(VesselId(1), OwnerId(1));
        assert!(w.needs_resubscribe());
        assert!(w.hooks.is_empty());
    }

    #[test]
    fn test_separate_moves_host_part() {
        let mut w = SimWorld::new();
        w.add_vessel(VesselId(1), Some(RootPartId(10))).state.heading_deg = 45.0;
        w.board(VesselId(1));
        w.separate(VesselId(2), None);
        let host = w.host_vessel().unwrap();
        assert_eq!(host.id, VesselId(2));
        assert!(!host.is_valid());
        assert_eq!(w.flight_state(VesselId(2)).unwrap().heading_deg, 45.0);
        assert!(w.vessel(VesselId(1)).is_some());
    }

    #[test]
    fn test_steering_only_for_existing_vessels() {
        let mut w = SimWorld::new();
        assert!(w.steering(VesselId(1)).is_none());
        w.add_vessel(VesselId(1), Some(RootPartId(10)));
        assert!(w.steering(VesselId(1)).is_some());
    }
}
