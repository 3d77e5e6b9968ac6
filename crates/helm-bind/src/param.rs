//! A single fly-by-wire channel: whether the script has it locked, the value
//! it was last set to, and how that value turns into a control frame
//! contribution.

use std::fmt;

use helm_proto::{CommandValue, ControlFrame, GeoCoordinates, OwnerId, VesselId};
use tracing::{debug, warn};

use crate::error::{BindingError, Result};
use crate::geo;
use crate::host::{BindingRegistry, BoundValue, SteeringAuthorities, Vessels};
use crate::registry::ControlHandle;
use crate::BindingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Throttle,
    Steering,
    WheelThrottle,
    WheelSteering,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Throttle,
        ChannelKind::Steering,
        ChannelKind::WheelThrottle,
        ChannelKind::WheelSteering,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Throttle => "throttle",
            ChannelKind::Steering => "steering",
            ChannelKind::WheelThrottle => "wheelthrottle",
            ChannelKind::WheelSteering => "wheelsteering",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Name used in error messages shown to scripts.
    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::Throttle => "THROTTLE",
            ChannelKind::Steering => "STEERING",
            ChannelKind::WheelThrottle => "WHEELTHROTTLE",
            ChannelKind::WheelSteering => "WHEELSTEER",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            ChannelKind::Throttle => "Number in the range [0..1]",
            ChannelKind::WheelThrottle => "Number in the range [-1..1]",
            ChannelKind::WheelSteering => "Vessel, LATLNG, or Number (compass heading)",
            ChannelKind::Steering => "Direction, Vector, Vessel or LATLNG",
        }
    }
}

enum SteerTarget {
    Vessel(VesselId),
    Point(GeoCoordinates),
    Heading(f64),
}

#[derive(Debug, Clone)]
pub struct ControlParameter {
    kind: ChannelKind,
    enabled: bool,
    value: Option<CommandValue>,
    control: ControlHandle,
}

impl ControlParameter {
    /// Disabled channel on `control`, exposed to scripts under its name.
    pub fn new<H>(kind: ChannelKind, control: ControlHandle, host: &mut H) -> Self
    where
        H: BindingRegistry + ?Sized,
    {
        host.add_getter(kind.name(), BoundValue::Channel(kind));
        host.add_setter(kind.name(), BoundValue::Channel(kind));
        Self { kind, enabled: false, value: None, control }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending(&self) -> Option<&CommandValue> {
        self.value.as_ref()
    }

    pub fn control(&self) -> ControlHandle {
        self.control
    }

    pub fn retarget(&mut self, control: ControlHandle) {
        self.control = control;
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Throttle reads back the vessel's real throttle while unlocked, steering
    /// reads whatever the steering authority holds.
    pub fn get_value<H>(&self, vessel: VesselId, host: &mut H) -> Option<CommandValue>
    where
        H: Vessels + SteeringAuthorities + ?Sized,
    {
        match self.kind {
            ChannelKind::Throttle if !self.enabled => host
                .flight_state(vessel)
                .map(|s| CommandValue::Number(f64::from(s.main_throttle))),
            ChannelKind::Steering => host.steering(vessel).and_then(|auth| auth.value()),
            _ => self.value.clone(),
        }
    }

    /// Stores the value for the next physics step; it is only checked there.
    /// An unlocked channel keeps no value. Steering values go straight to the
    /// steering authority.
    pub fn set_value<H>(
        &mut self,
        value: CommandValue,
        vessel: Option<VesselId>,
        owner: OwnerId,
        host: &mut H,
    ) -> Result<()>
    where
        H: SteeringAuthorities + ?Sized,
    {
        if self.kind != ChannelKind::Steering {
            if self.enabled {
                self.value = Some(value);
            } else {
                debug!("channel {}: not locked, value dropped", self.kind.name());
            }
            return Ok(());
        }
        if let Some(vessel) = vessel {
            if let Some(auth) = host.steering(vessel) {
                auth.update_value(value, owner).map_err(BindingError::Steering)?;
            }
        }
        Ok(())
    }

    pub fn set_enabled<H>(
        &mut self,
        enabled: bool,
        vessel: Option<VesselId>,
        owner: OwnerId,
        host: &mut H,
    ) where
        H: SteeringAuthorities + ?Sized,
    {
        debug!("channel {}: enabled {} => {}", self.kind.name(), self.enabled, enabled);
        if !enabled {
            self.value = None;
        }
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;

        if self.kind == ChannelKind::Steering {
            if let Some(vessel) = vessel {
                if let Some(auth) = host.steering(vessel) {
                    if enabled {
                        auth.enable_control(owner);
                    } else {
                        auth.disable_control(owner);
                    }
                }
            }
        }
    }

    /// Teardown variant of disabling: steering is only handed back if this owner holds it.
    pub fn release<H>(&mut self, vessel: Option<VesselId>, owner: OwnerId, host: &mut H)
    where
        H: SteeringAuthorities + ?Sized,
    {
        self.value = None;
        if !self.enabled {
            return;
        }
        self.enabled = false;
        if let (ChannelKind::Steering, Some(vessel)) = (self.kind, vessel) {
            self.sync_steering(vessel, owner, host);
        }
    }

    /// Write this channel's contribution into `frame`. A value of the wrong
    /// shape unlocks the channel so the error surfaces once.
    pub fn apply<H>(
        &mut self,
        frame: &mut ControlFrame,
        vessel: VesselId,
        owner: OwnerId,
        cfg: &BindingConfig,
        host: &mut H,
    ) -> Result<()>
    where
        H: Vessels + SteeringAuthorities + ?Sized,
    {
        if !self.enabled {
            return Ok(());
        }
        match self.kind {
            ChannelKind::Steering => {
                self.sync_steering(vessel, owner, host);
                Ok(())
            }
            ChannelKind::Throttle => {
                if let Some(n) = self.pending_number()? {
                    frame.main_throttle = n.clamp(0.0, 1.0) as f32;
                }
                Ok(())
            }
            ChannelKind::WheelThrottle => {
                if let Some(n) = self.pending_number()? {
                    frame.wheel_throttle = n.clamp(-1.0, 1.0) as f32;
                }
                Ok(())
            }
            ChannelKind::WheelSteering => self.wheel_steer(frame, vessel, cfg, host),
        }
    }

    fn wheel_steer<H>(
        &mut self,
        frame: &mut ControlFrame,
        vessel: VesselId,
        cfg: &BindingConfig,
        host: &mut H,
    ) -> Result<()>
    where
        H: Vessels + ?Sized,
    {
        let Some(value) = &self.value else { return Ok(()) };
        let target = match value {
            CommandValue::Vessel(id) => SteerTarget::Vessel(*id),
            CommandValue::Geo(point) => SteerTarget::Point(*point),
            other => match other.as_number() {
                Some(heading) => SteerTarget::Heading(heading),
                None => {
                    let found = other.kind_name();
                    return Err(self.reject(found));
                }
            },
        };

        let Some(state) = host.flight_state(vessel) else { return Ok(()) };
        let bearing = match target {
            SteerTarget::Vessel(id) => match host.flight_state(id) {
                Some(other) => geo::relative_bearing(&state, other.position),
                None => {
                    debug!("channel wheelsteering: target {} not found, centring", id);
                    0.0
                }
            },
            SteerTarget::Point(point) => geo::relative_bearing(&state, point),
            SteerTarget::Heading(heading) => geo::compass_bearing(heading, state.heading_deg),
        };
        if !bearing.is_finite() {
            debug!("channel wheelsteering: no usable bearing, leaving wheels alone");
            return Ok(());
        }

        if !(state.horizontal_srf_speed > cfg.wheel_steer_min_speed) {
            return Ok(());
        }

        let steer = (bearing / -cfg.wheel_steer_deg_per_unit).clamp(-1.0, 1.0);
        // rolling backwards: same correction needs the opposite wheel angle
        let forward = geo::angle_delta(state.heading_deg, state.velocity_heading_deg).abs() <= 90.0;
        frame.wheel_steer = if forward { steer as f32 } else { -steer as f32 };
        Ok(())
    }

    /// The channel is moving to another vessel. Steering this owner holds on
    /// `from` is handed back; the next fan-out takes it on the new vessel.
    pub fn hand_over<H>(&self, from: VesselId, owner: OwnerId, host: &mut H)
    where
        H: SteeringAuthorities + ?Sized,
    {
        if self.kind != ChannelKind::Steering || !self.enabled {
            return;
        }
        let Some(auth) = host.steering(from) else { return };
        if auth.enabled() && auth.controlling_owner() == Some(owner) {
            auth.disable_control(owner);
        }
    }

    fn sync_steering<H>(&self, vessel: VesselId, owner: OwnerId, host: &mut H)
    where
        H: SteeringAuthorities + ?Sized,
    {
        let Some(auth) = host.steering(vessel) else { return };
        if self.enabled {
            if !auth.enabled() {
                auth.enable_control(owner);
            }
        } else if auth.enabled() && auth.controlling_owner() == Some(owner) {
            auth.disable_control(owner);
        }
    }

    /// NaN is treated as "no command" rather than an error.
    fn pending_number(&mut self) -> Result<Option<f64>> {
        let Some(value) = &self.value else { return Ok(None) };
        match value.as_number() {
            Some(n) if n.is_nan() => Ok(None),
            Some(n) => Ok(Some(n)),
            None => {
                let found = value.kind_name();
                Err(self.reject(found))
            }
        }
    }

    fn reject(&mut self, found: &'static str) -> BindingError {
        self.enabled = false;
        self.value = None;
        let err = BindingError::TypeMismatch {
            channel: self.kind.label(),
            found,
            expected: self.kind.expected(),
        };
        warn!("channel {}: {}, unlocking", self.kind.name(), err);
        err
    }
}

impl fmt::Display for ControlParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={} enabled={}", self.kind.name(), self.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ControlRegistry;
    use crate::sim::SimWorld;
    use helm_proto::{RootPartId, VesselRef};

    const OWNER: OwnerId = OwnerId(7);
    const ROVER: VesselId = VesselId(1);

    fn setup(kind: ChannelKind) -> (SimWorld, ControlParameter) {
        let mut world = SimWorld::new();
        world.add_vessel(ROVER, Some(RootPartId(10)));
        world.board(ROVER);
        let mut reg = ControlRegistry::new();
        let handle = reg
            .acquire(VesselRef { id: ROVER, root: Some(RootPartId(10)) }, OWNER)
            .unwrap();
        let param = ControlParameter::new(kind, handle, &mut world);
        (world, param)
    }

    fn apply(
        param: &mut ControlParameter,
        world: &mut SimWorld,
        frame: &mut ControlFrame,
    ) -> Result<()> {
        param.apply(frame, ROVER, OWNER, &BindingConfig::default(), world)
    }

    #[test]
    fn test_new_channel_is_disabled_and_registered() {
        let (world, param) = setup(ChannelKind::WheelThrottle);
        assert!(!param.enabled());
        assert!(param.pending().is_none());
        let bound = BoundValue::Channel(ChannelKind::WheelThrottle);
        assert_eq!(world.getters.get("wheelthrottle"), Some(&bound));
        assert_eq!(world.setters.get("wheelthrottle"), Some(&bound));
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(ChannelKind::from_name("WheelSteering"), Some(ChannelKind::WheelSteering));
        assert_eq!(ChannelKind::from_name("THROTTLE"), Some(ChannelKind::Throttle));
        assert_eq!(ChannelKind::from_name("rudder"), None);
    }

    #[test]
    fn test_throttle_clamps() {
        let (mut world, mut p) = setup(ChannelKind::Throttle);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        let mut frame = ControlFrame::default();

        p.set_value(CommandValue::Number(1.5), Some(ROVER), OWNER, &mut world).unwrap();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.main_throttle, 1.0);

        p.set_value(CommandValue::Number(-0.5), Some(ROVER), OWNER, &mut world).unwrap();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.main_throttle, 0.0);
    }

    #[test]
    fn test_throttle_nan_leaves_frame_alone() {
        let (mut world, mut p) = setup(ChannelKind::Throttle);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Number(f64::NAN), Some(ROVER), OWNER, &mut world).unwrap();
        let mut frame = ControlFrame { main_throttle: 0.3, ..Default::default() };
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.main_throttle, 0.3);
        assert!(p.enabled());
    }

    #[test]
    fn test_throttle_getter_passes_through_when_unlocked() {
        let (mut world, mut p) = setup(ChannelKind::Throttle);
        world.vessel_mut(ROVER).unwrap().state.main_throttle = 0.25;
        assert_eq!(p.get_value(ROVER, &mut world), Some(CommandValue::Number(0.25)));

        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Number(0.8), Some(ROVER), OWNER, &mut world).unwrap();
        assert_eq!(p.get_value(ROVER, &mut world), Some(CommandValue::Number(0.8)));
    }

    #[test]
    fn test_disabled_channel_contributes_nothing() {
        let (mut world, mut p) = setup(ChannelKind::Throttle);
        p.set_value(CommandValue::Number(1.0), Some(ROVER), OWNER, &mut world).unwrap();
        let mut frame = ControlFrame::default();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.main_throttle, 0.0);
    }

    #[test]
    fn test_wheelthrottle_bad_value_fails_once() {
        let (mut world, mut p) = setup(ChannelKind::WheelThrottle);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Text("fast".into()), Some(ROVER), OWNER, &mut world).unwrap();

        let mut frame = ControlFrame::default();
        let err = apply(&mut p, &mut world, &mut frame).unwrap_err();
        assert_eq!(
            err,
            BindingError::TypeMismatch {
                channel: "WHEELTHROTTLE",
                found: "String",
                expected: "Number in the range [-1..1]",
            }
        );
        assert!(!p.enabled());
        assert!(p.pending().is_none());

        // second physics step: nothing left to complain about
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame, ControlFrame::default());
    }

    #[test]
    fn test_wheelthrottle_clamps_both_ways() {
        let (mut world, mut p) = setup(ChannelKind::WheelThrottle);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        let mut frame = ControlFrame::default();
        p.set_value(CommandValue::Number(-3.0), Some(ROVER), OWNER, &mut world).unwrap();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_throttle, -1.0);
        p.set_value(CommandValue::Text("0.5".into()), Some(ROVER), OWNER, &mut world).unwrap();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_throttle, 0.5);
    }

    #[test]
    fn test_disable_clears_pending_value() {
        let (mut world, mut p) = setup(ChannelKind::WheelThrottle);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Number(0.4), Some(ROVER), OWNER, &mut world).unwrap();
        p.set_enabled(false, Some(ROVER), OWNER, &mut world);
        assert!(p.pending().is_none());

        // also when it was never enabled
        p.set_value(CommandValue::Number(0.4), Some(ROVER), OWNER, &mut world).unwrap();
        p.set_enabled(false, Some(ROVER), OWNER, &mut world);
        assert!(p.pending().is_none());
    }

    #[test]
    fn test_wheelsteer_holds_still_when_stationary() {
        let (mut world, mut p) = setup(ChannelKind::WheelSteering);
        world.vessel_mut(ROVER).unwrap().state.horizontal_srf_speed = 0.1;
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Number(90.0), Some(ROVER), OWNER, &mut world).unwrap();
        let mut frame = ControlFrame { wheel_steer: 0.2, ..Default::default() };
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_steer, 0.2);
    }

    #[test]
    fn test_wheelsteer_heading_forward_and_reverse() {
        let (mut world, mut p) = setup(ChannelKind::WheelSteering);
        {
            let s = &mut world.vessel_mut(ROVER).unwrap().state;
            s.heading_deg = 0.0;
            s.velocity_heading_deg = 0.0;
            s.horizontal_srf_speed = 5.0;
        }
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.set_value(CommandValue::Number(5.0), Some(ROVER), OWNER, &mut world).unwrap();

        let mut frame = ControlFrame::default();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert!((frame.wheel_steer + 0.5).abs() < 1e-6);

        // moving backwards relative to facing flips the correction
        world.vessel_mut(ROVER).unwrap().state.velocity_heading_deg = 180.0;
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert!((frame.wheel_steer - 0.5).abs() < 1e-6);

        // large errors saturate
        p.set_value(CommandValue::Number(270.0), Some(ROVER), OWNER, &mut world).unwrap();
        world.vessel_mut(ROVER).unwrap().state.velocity_heading_deg = 0.0;
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_steer, 1.0);
    }

    #[test]
    fn test_wheelsteer_towards_point_and_vessel() {
        let (mut world, mut p) = setup(ChannelKind::WheelSteering);
        {
            let s = &mut world.vessel_mut(ROVER).unwrap().state;
            s.heading_deg = 0.0;
            s.horizontal_srf_speed = 2.0;
        }
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);

        // due east: 90 degrees right, full deflection
        let east = GeoCoordinates { lat: 0.0, lon: 0.01 };
        p.set_value(CommandValue::Geo(east), Some(ROVER), OWNER, &mut world).unwrap();
        let mut frame = ControlFrame::default();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_steer, -1.0);

        let west = GeoCoordinates { lat: 0.0, lon: -0.01 };
        world.add_vessel(VesselId(2), Some(RootPartId(20))).state.position = west;
        p.set_value(CommandValue::Vessel(VesselId(2)), Some(ROVER), OWNER, &mut world).unwrap();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_steer, 1.0);
    }

    #[test]
    fn test_wheelsteer_ignores_point_without_bearing() {
        let (mut world, mut p) = setup(ChannelKind::WheelSteering);
        world.vessel_mut(ROVER).unwrap().state.horizontal_srf_speed = 3.0;
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        let nowhere = GeoCoordinates { lat: f64::NAN, lon: 0.0 };
        p.set_value(CommandValue::Geo(nowhere), Some(ROVER), OWNER, &mut world).unwrap();

        let mut frame = ControlFrame { wheel_steer: 0.3, ..Default::default() };
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert_eq!(frame.wheel_steer, 0.3);
        assert!(p.enabled());
    }

    #[test]
    fn test_wheelsteer_bad_value_fails_even_when_stationary() {
        let (mut world, mut p) = setup(ChannelKind::WheelSteering);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        let dir = CommandValue::Direction { pitch: 0.0, yaw: 0.0, roll: 0.0 };
        p.set_value(dir, Some(ROVER), OWNER, &mut world).unwrap();
        let mut frame = ControlFrame::default();
        let err = apply(&mut p, &mut world, &mut frame).unwrap_err();
        assert!(matches!(
            err,
            BindingError::TypeMismatch { channel: "WHEELSTEER", found: "Direction", .. }
        ));
        assert!(!p.enabled());
    }

    #[test]
    fn test_steering_delegates_to_authority() {
        let (mut world, mut p) = setup(ChannelKind::Steering);
        let dir = CommandValue::Direction { pitch: 10.0, yaw: 0.0, roll: 0.0 };
        p.set_value(dir.clone(), Some(ROVER), OWNER, &mut world).unwrap();
        assert!(p.pending().is_none());
        assert_eq!(p.get_value(ROVER, &mut world), Some(dir));

        let err = p
            .set_value(CommandValue::Text("up".into()), Some(ROVER), OWNER, &mut world)
            .unwrap_err();
        assert!(matches!(err, BindingError::Steering(_)));
    }

    #[test]
    fn test_steering_toggle_drives_authority() {
        let (mut world, mut p) = setup(ChannelKind::Steering);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        assert!(world.steering_of(ROVER).enabled);
        assert_eq!(world.steering_of(ROVER).owner, Some(OWNER));

        // authority dropped elsewhere; the next physics step takes it back
        world.steering_of(ROVER).enabled = false;
        let mut frame = ControlFrame::default();
        apply(&mut p, &mut world, &mut frame).unwrap();
        assert!(world.steering_of(ROVER).enabled);

        p.set_enabled(false, Some(ROVER), OWNER, &mut world);
        assert!(!world.steering_of(ROVER).enabled);
    }

    #[test]
    fn test_steering_release_only_if_owned() {
        let (mut world, mut p) = setup(ChannelKind::Steering);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        world.steering_of(ROVER).owner = Some(OwnerId(99));

        p.release(Some(ROVER), OWNER, &mut world);
        assert!(!p.enabled());
        assert!(world.steering_of(ROVER).enabled);
    }

    #[test]
    fn test_steering_hand_over_frees_old_vessel() {
        let (mut world, mut p) = setup(ChannelKind::Steering);
        p.set_enabled(true, Some(ROVER), OWNER, &mut world);
        p.hand_over(ROVER, OWNER, &mut world);
        assert!(!world.steering_of(ROVER).enabled);
        assert!(p.enabled(), "still locked, just not on the old vessel");

        // somebody else's control is left alone
        let auth = world.steering_of(ROVER);
        auth.enabled = true;
        auth.owner = Some(OwnerId(99));
        p.hand_over(ROVER, OWNER, &mut world);
        assert!(world.steering_of(ROVER).enabled);
    }

    #[test]
    fn test_display() {
        let (_world, p) = setup(ChannelKind::WheelSteering);
        assert_eq!(p.to_string(), "name=wheelsteering enabled=false");
    }
}
