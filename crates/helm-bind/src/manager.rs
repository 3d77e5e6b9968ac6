//! Binds one scripting context's fly-by-wire channels to whatever vessel its
//! part currently belongs to.
//!
//! Two call sources drive a manager: `update` once per simulation tick
//! (attach, re-home after separation, relay resubscription) and
//! `on_fly_by_wire` once per physics step from the relay hook. Both run on
//! the host's update thread.
//!
//! State transitions:
//! - `Unattached` -> `Attached`: `attach`, or `update` once the host vessel is valid
//! - `Attached` -> `Attached`: `update` sees a new, valid host vessel
//! - `Attached` -> `PendingReattach`: `update` sees a new host vessel with no root part yet
//! - `PendingReattach` -> `Attached`: `update` once that vessel is valid
//! - any -> `Unattached`: `detach` / `dispose`
//!
//! Channels reach their vessel through their registry handle, not through
//! the attach state, so unlocking still lets go of the vessel's actuators
//! while the manager is between vessels.

use std::collections::BTreeMap;

use helm_proto::{CommandValue, ControlFrame, OwnerId, VesselId, VesselRef};
use tracing::{debug, info, warn};

use crate::error::{BindingError, Result};
use crate::host::{BoundValue, Host};
use crate::modes::{AutopilotMode, NavMode};
use crate::param::{ChannelKind, ControlParameter};
use crate::registry::{ControlHandle, SharedRegistry};
use crate::resubscribe::ResubscribeGate;
use crate::BindingConfig;

const AUTOPILOT_BINDING: &str = "SASMODE";
const NAV_BINDING: &str = "NAVMODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Unattached,
    /// Hooked into the relay for exactly this vessel.
    Attached(VesselRef),
    /// Left the previous vessel, waiting for the new one to become valid.
    PendingReattach,
}

pub struct ControlBindingManager {
    owner: OwnerId,
    cfg: BindingConfig,
    state: AttachState,
    channels: BTreeMap<ChannelKind, ControlParameter>,
    gate: ResubscribeGate,
    registry: SharedRegistry,
    modes_registered: bool,
    /// Set by `detach`; `update` leaves a parked manager alone until the next `attach`.
    parked: bool,
}

impl ControlBindingManager {
    pub fn new(owner: OwnerId, cfg: BindingConfig, registry: SharedRegistry) -> Self {
        let gate = ResubscribeGate::new(cfg.resubscribe_period);
        Self {
            owner,
            cfg,
            state: AttachState::Unattached,
            channels: BTreeMap::new(),
            gate,
            registry,
            modes_registered: false,
            parked: false,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn state(&self) -> AttachState {
        self.state
    }

    pub fn bound_vessel(&self) -> Option<VesselId> {
        match self.state {
            AttachState::Attached(v) => Some(v.id),
            _ => None,
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&ControlParameter> {
        self.channels.get(&kind)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ControlParameter> {
        self.channels.values()
    }

    pub fn resubscribe_counter(&self) -> u32 {
        self.gate.counter()
    }

    /// Attach to the vessel the scripting part is in. When that vessel is not
    /// ready the error is informational: `update` keeps retrying.
    pub fn attach<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let Some(vessel) = host.host_vessel() else {
            warn!("binding: attach of {} skipped: no host vessel", self.owner);
            return Err(BindingError::UnsupportedContext("no host vessel".into()));
        };
        if !vessel.is_valid() {
            warn!("binding: attach of {} skipped: {} has no root part", self.owner, vessel.id);
            return Err(BindingError::UnsupportedContext(format!("{} has no root part", vessel.id)));
        }
        if let AttachState::Attached(current) = self.state {
            if current.id == vessel.id {
                return Ok(());
            }
            self.detach(host);
        }

        info!("binding: attaching {} to {}", self.owner, vessel.id);
        self.parked = false;
        self.bind_to(vessel, host);
        Ok(())
    }

    /// Once per simulation tick.
    pub fn update<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.parked {
            return;
        }
        self.unbind_unloaded(host);

        let current = host.host_vessel();
        if let (AttachState::Attached(bound), Some(now)) = (self.state, current) {
            if bound.id == now.id {
                if self.gate.tick(host.needs_resubscribe()) {
                    info!(
                    "binding: relay dropped the autopilot hook, re-installing on {}",
                    bound.id
                );
                    host.install_hook(bound.id, self.owner);
                }
                return;
            }
        }

        // The scripting part now lives in a different vessel (undock, decouple,
        // breakage), or has not been attached yet.
        if let AttachState::Attached(previous) = self.state {
            info!(
                "binding: {} left {} (now in {:?})",
                self.owner,
                previous.id,
                current.map(|v| v.id)
            );
            if host.vessel(previous.id).map_or(false, |v| v.is_valid()) {
                host.remove_hook(previous.id, self.owner);
            }
            self.state = AttachState::PendingReattach;
        }

        let Some(next) = current.filter(|v| v.is_valid()) else {
            debug!("binding: {} waiting for a valid host vessel", self.owner);
            return;
        };
        self.bind_to(next, host);
    }

    /// Relay callback, once per physics step.
    pub fn on_fly_by_wire<H: Host + ?Sized>(
        &mut self,
        frame: &mut ControlFrame,
        host: &mut H,
    ) -> Result<()> {
        if !matches!(self.state, AttachState::Attached(_)) {
            return Ok(());
        }
        let owner = self.owner;
        let cfg = &self.cfg;
        let registry = self.registry.borrow();
        let mut first_err = None;
        for param in self.channels.values_mut().filter(|p| p.enabled()) {
            let Some(vessel) = registry.vessel_of(param.control()) else { continue };
            if let Err(e) = param.apply(frame, vessel, owner, cfg, host) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Lock or unlock a channel by name. Unlocking drops its pending value.
    pub fn toggle<H: Host + ?Sized>(
        &mut self,
        name: &str,
        enabled: bool,
        host: &mut H,
    ) -> Result<()> {
        info!("binding: toggle {} {}", name, enabled);
        let kind = self.kind_of(name)?;
        let vessel = self.channel_vessel(kind);
        let owner = self.owner;
        let param = self.channel_mut(kind)?;
        param.set_enabled(enabled, vessel, owner, host);
        Ok(())
    }

    pub fn get<H: Host + ?Sized>(&self, name: &str, host: &mut H) -> Result<Option<CommandValue>> {
        let kind = self.kind_of(name)?;
        self.get_channel(kind, host)
    }

    pub fn set<H: Host + ?Sized>(
        &mut self,
        name: &str,
        value: CommandValue,
        host: &mut H,
    ) -> Result<()> {
        let kind = self.kind_of(name)?;
        let vessel = self.channel_vessel(kind);
        let owner = self.owner;
        self.channel_mut(kind)?.set_value(value, vessel, owner, host)
    }

    /// Read side of a name registered through the binding registry.
    pub fn get_bound<H: Host + ?Sized>(
        &self,
        target: BoundValue,
        host: &mut H,
    ) -> Result<Option<CommandValue>> {
        match target {
            BoundValue::Channel(kind) => self.get_channel(kind, host),
            BoundValue::AutopilotMode => Ok(Some(self.autopilot_mode_name(&*host)?.into())),
            BoundValue::NavMode => Ok(Some(self.nav_mode_name(&*host)?.into())),
        }
    }

    /// Write side of a name registered through the binding registry. `None` is an unset value.
    pub fn set_bound<H: Host + ?Sized>(
        &mut self,
        target: BoundValue,
        value: Option<CommandValue>,
        host: &mut H,
    ) -> Result<()> {
        match target {
            BoundValue::Channel(kind) => {
                let vessel = self.channel_vessel(kind);
                let owner = self.owner;
                let param = self.channel_mut(kind)?;
                match value {
                    Some(v) => param.set_value(v, vessel, owner, host),
                    None => {
                        param.clear_value();
                        Ok(())
                    }
                }
            }
            BoundValue::AutopilotMode => self.select_autopilot_mode_value(value.as_ref(), host),
            BoundValue::NavMode => self.set_nav_mode_value(value.as_ref(), host),
        }
    }

    pub fn select_autopilot_mode<H: Host + ?Sized>(
        &mut self,
        mode: AutopilotMode,
        host: &mut H,
    ) -> Result<()> {
        let vessel = self.require_attached(AUTOPILOT_BINDING)?;
        if host.autopilot_mode(vessel) == Some(mode) {
            return Ok(());
        }
        if !host.can_set_autopilot_mode(vessel, mode) {
            return Err(BindingError::SituationallyInvalid(format!(
                "Cannot set autopilot value, pilot/probe does not support {:?}, \
                 or there is no node/target",
                mode
            )));
        }
        host.set_autopilot_mode(vessel, mode);
        host.show_autopilot_mode(mode.code());
        info!("binding: {} autopilot mode {:?}", vessel, mode);
        Ok(())
    }

    pub fn select_autopilot_mode_name<H: Host + ?Sized>(
        &mut self,
        name: &str,
        host: &mut H,
    ) -> Result<()> {
        let mode = AutopilotMode::from_script_name(name)?;
        self.select_autopilot_mode(mode, host)
    }

    pub fn select_autopilot_mode_value<H: Host + ?Sized>(
        &mut self,
        value: Option<&CommandValue>,
        host: &mut H,
    ) -> Result<()> {
        let mode = AutopilotMode::from_value(value)?;
        self.select_autopilot_mode(mode, host)
    }

    pub fn autopilot_mode_name<H: Host + ?Sized>(&self, host: &H) -> Result<&'static str> {
        let vessel = self.require_attached(AUTOPILOT_BINDING)?;
        let mode = host.autopilot_mode(vessel).ok_or_else(|| {
            BindingError::SituationallyInvalid(format!("{} has no autopilot", vessel))
        })?;
        Ok(mode.script_name())
    }

    pub fn set_nav_mode<H: Host + ?Sized>(&mut self, mode: NavMode, host: &mut H) -> Result<()> {
        self.require_active(&*host)?;
        if mode == NavMode::Target && !host.has_target() {
            return Err(BindingError::NoTarget);
        }
        host.set_nav_mode(mode);
        Ok(())
    }

    pub fn set_nav_mode_name<H: Host + ?Sized>(&mut self, name: &str, host: &mut H) -> Result<()> {
        self.require_active(&*host)?;
        let mode = NavMode::from_script_name(name)?;
        self.set_nav_mode(mode, host)
    }

    pub fn set_nav_mode_value<H: Host + ?Sized>(
        &mut self,
        value: Option<&CommandValue>,
        host: &mut H,
    ) -> Result<()> {
        let mode = NavMode::from_value(value)?;
        self.set_nav_mode(mode, host)
    }

    pub fn nav_mode_name<H: Host + ?Sized>(&self, host: &H) -> Result<&'static str> {
        self.require_active(&*host)?;
        Ok(host.nav_mode().script_name())
    }

    /// Stop piloting the bound vessel: unlock every channel and give back this
    /// manager's registry holds. Safe to call repeatedly.
    pub fn detach<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let AttachState::Attached(v) = self.state {
            if host.vessel(v.id).map_or(false, |v| v.is_valid()) {
                host.remove_hook(v.id, self.owner);
            }
            info!("binding: {} detached from {}", self.owner, v.id);
        }
        self.release_channels(host);
        let handles = self.handles();
        self.release_handles(&handles, None);
        self.state = AttachState::Unattached;
        self.parked = true;
    }

    /// Unlock every channel and let go of the vessels' actuators.
    pub fn unbind<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.release_channels(host);
        let mut registry = self.registry.borrow_mut();
        for handle in self.handles() {
            let resolvable = registry
                .vessel_of(handle)
                .and_then(|v| host.vessel(v))
                .map_or(false, |v| v.is_valid());
            if resolvable {
                registry.unbind(handle);
            }
        }
    }

    /// Teardown of the owning scripting context. Safe to call repeatedly.
    pub fn dispose<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.unbind(host);
        self.detach(host);
        self.channels.clear();
    }

    fn bind_to<H: Host + ?Sized>(&mut self, vessel: VesselRef, host: &mut H) {
        host.install_hook(vessel.id, self.owner);
        self.state = AttachState::Attached(vessel);
        self.gate.reset();

        let previous: Vec<(ChannelKind, VesselId)> = {
            let registry = self.registry.borrow();
            let on: Vec<_> = self
                .channels
                .iter()
                .filter_map(|(kind, p)| registry.vessel_of(p.control()).map(|v| (*kind, v)))
                .collect();
            on
        };
        let Some(handle) = self.registry.borrow_mut().acquire(vessel, self.owner) else { return };
        let owner = self.owner;
        for (kind, from) in previous {
            if from == vessel.id {
                continue;
            }
            if let Some(param) = self.channels.get(&kind) {
                param.hand_over(from, owner, host);
            }
        }
        let stale = self.handles();
        for param in self.channels.values_mut() {
            param.retarget(handle);
        }
        self.release_handles(&stale, Some(handle));

        for kind in ChannelKind::ALL {
            if !self.channels.contains_key(&kind) {
                debug!("binding: {} adding channel {}", self.owner, kind.name());
                self.channels.insert(kind, ControlParameter::new(kind, handle, host));
            }
        }
        if !self.modes_registered {
            host.add_getter(AUTOPILOT_BINDING, BoundValue::AutopilotMode);
            host.add_setter(AUTOPILOT_BINDING, BoundValue::AutopilotMode);
            host.add_getter(NAV_BINDING, BoundValue::NavMode);
            host.add_setter(NAV_BINDING, BoundValue::NavMode);
            self.modes_registered = true;
        }
    }

    /// Sweep the shared registry and drop channels whose control state went with it.
    fn unbind_unloaded<H: Host + ?Sized>(&mut self, host: &mut H) {
        let mut registry = self.registry.borrow_mut();
        registry.sweep(|v| host.is_loaded(v));
        self.channels.retain(|kind, param| {
            let keep = registry.contains(param.control());
            if !keep {
                debug!("binding: channel {} lost its control state", kind.name());
            }
            keep
        });
    }

    fn release_channels<H: Host + ?Sized>(&mut self, host: &mut H) {
        let owner = self.owner;
        let registry = self.registry.borrow();
        for param in self.channels.values_mut() {
            let vessel = registry.vessel_of(param.control());
            param.release(vessel, owner, host);
        }
    }

    /// Give back this manager's hold on `handles`, removing entries nobody holds any more.
    fn release_handles(&self, handles: &[ControlHandle], keep: Option<ControlHandle>) {
        let mut registry = self.registry.borrow_mut();
        for handle in handles.iter().copied().filter(|h| Some(*h) != keep) {
            if registry.release(handle, self.owner) == 0 {
                registry.dispose(handle);
            }
        }
    }

    fn handles(&self) -> Vec<ControlHandle> {
        let mut out: Vec<ControlHandle> = Vec::new();
        for p in self.channels.values() {
            if !out.contains(&p.control()) {
                out.push(p.control());
            }
        }
        out
    }

    fn kind_of(&self, name: &str) -> Result<ChannelKind> {
        ChannelKind::from_name(name)
            .filter(|kind| self.channels.contains_key(kind))
            .ok_or_else(|| BindingError::UnknownChannel(name.to_string()))
    }

    /// Vessel a channel's registry entry points at, if the entry still exists.
    fn channel_vessel(&self, kind: ChannelKind) -> Option<VesselId> {
        let param = self.channels.get(&kind)?;
        self.registry.borrow().vessel_of(param.control())
    }

    fn channel_mut(&mut self, kind: ChannelKind) -> Result<&mut ControlParameter> {
        self.channels
            .get_mut(&kind)
            .ok_or_else(|| BindingError::UnknownChannel(kind.name().to_string()))
    }

    fn get_channel<H: Host + ?Sized>(
        &self,
        kind: ChannelKind,
        host: &mut H,
    ) -> Result<Option<CommandValue>> {
        let param = self
            .channels
            .get(&kind)
            .ok_or_else(|| BindingError::UnknownChannel(kind.name().to_string()))?;
        match self.channel_vessel(kind) {
            Some(vessel) => Ok(param.get_value(vessel, host)),
            None => Ok(param.pending().cloned()),
        }
    }

    fn require_attached(&self, what: &str) -> Result<VesselId> {
        self.bound_vessel().ok_or_else(|| {
            BindingError::SituationallyInvalid(format!("{} needs an attached vessel", what))
        })
    }

    fn require_active<H: Host + ?Sized>(&self, host: &H) -> Result<()> {
        match self.bound_vessel() {
            Some(v) if host.active_vessel() == Some(v) => Ok(()),
            _ => Err(BindingError::SituationallyInvalid(
                "NAVMODE can only be accessed for the active vessel".into(),
            )),
        }
    }
}
