use anyhow::Result;
use helm_bind::sim::SimWorld;
use helm_bind::{BindingConfig, BindingError, ControlBindingManager, ControlRegistry};
use helm_proto::{CommandValue, ControlFrame, GeoCoordinates, OwnerId, RootPartId, VesselId};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Part the scripting context runs on
    pub owner: OwnerId,
    pub host_vessel: VesselId,
    pub active_vessel: Option<VesselId>,
    #[serde(default)]
    pub target_selected: bool,
    /// Pace steps at this rate; unset replays as fast as possible.
    pub rate_hz: Option<f32>,
    pub vessels: Vec<VesselCfg>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VesselCfg {
    pub id: VesselId,
    pub root: Option<RootPartId>,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub heading_deg: f64,
    /// Defaults to heading_deg (rolling forwards)
    pub velocity_heading_deg: Option<f64>,
    #[serde(default)]
    pub srf_speed: f64,
    #[serde(default)]
    pub throttle: f32,
    #[serde(default)]
    pub has_node: bool,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    /// Simulation ticks (manager update)
    Tick {
        #[serde(default = "one")]
        count: u32,
    },
    /// Physics steps (relay callback)
    Physics {
        #[serde(default = "one")]
        count: u32,
    },
    Set { name: String, value: CommandValue },
    Get { name: String },
    Toggle { name: String, enabled: bool },
    Sasmode { mode: String },
    Navmode { mode: String },
    Separate { vessel: VesselId, root: Option<RootPartId> },
    Unload { vessel: VesselId },
    Drophooks {
        #[serde(default)]
        relay_fails: bool,
    },
    Target { selected: bool },
}

impl Scenario {
    pub fn check(&self) -> Result<()> {
        anyhow::ensure!(!self.vessels.is_empty(), "scenario.vessels is empty");
        anyhow::ensure!(
            self.vessels.iter().any(|v| v.id == self.host_vessel),
            "scenario.host_vessel {} not among scenario.vessels",
            self.host_vessel
        );
        let mut ids: Vec<u64> = self.vessels.iter().map(|v| v.id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        anyhow::ensure!(ids.len() == self.vessels.len(), "scenario.vessels has duplicate ids");
        if let Some(hz) = self.rate_hz {
            anyhow::ensure!(hz > 0.0 && hz <= 1000.0, "scenario.rate_hz should be in (0, 1000]");
        }
        Ok(())
    }

    pub fn build_world(&self) -> SimWorld {
        let mut world = SimWorld::new();
        for v in &self.vessels {
            let sv = world.add_vessel(v.id, v.root);
            sv.state.position = GeoCoordinates { lat: v.lat, lon: v.lon };
            sv.state.heading_deg = v.heading_deg;
            sv.state.velocity_heading_deg = v.velocity_heading_deg.unwrap_or(v.heading_deg);
            sv.state.horizontal_srf_speed = v.srf_speed;
            sv.state.main_throttle = v.throttle;
            sv.has_node = v.has_node;
        }
        world.board(self.host_vessel);
        world.active = self.active_vessel.or(Some(self.host_vessel));
        world.target_selected = self.target_selected;
        world
    }
}

pub struct Replay {
    world: SimWorld,
    manager: ControlBindingManager,
    frame: ControlFrame,
    physics_steps: u64,
}

impl Replay {
    pub fn new(cfg: BindingConfig, scenario: &Scenario) -> Self {
        let world = scenario.build_world();
        let manager = ControlBindingManager::new(scenario.owner, cfg, ControlRegistry::shared());
        Self { world, manager, frame: ControlFrame::default(), physics_steps: 0 }
    }

    pub fn attach(&mut self) {
        if let Err(e) = self.manager.attach(&mut self.world) {
            warn!("replay: {}; will retry on tick", e);
        }
    }

    pub fn apply(&mut self, step: &Step) -> Result<(), BindingError> {
        match step {
            Step::Tick { count } => {
                for _ in 0..*count {
                    self.manager.update(&mut self.world);
                }
                Ok(())
            }
            Step::Physics { count } => {
                for _ in 0..*count {
                    self.physics()?;
                }
                Ok(())
            }
            Step::Set { name, value } => self.manager.set(name, value.clone(), &mut self.world),
            Step::Get { name } => {
                let v = self.manager.get(name, &mut self.world)?;
                println!("{} = {:?}", name, v);
                Ok(())
            }
            Step::Toggle { name, enabled } => self.manager.toggle(name, *enabled, &mut self.world),
            Step::Sasmode { mode } => {
                self.manager.select_autopilot_mode_name(mode, &mut self.world)?;
                println!("SASMODE = {}", self.manager.autopilot_mode_name(&self.world)?);
                Ok(())
            }
            Step::Navmode { mode } => {
                self.manager.set_nav_mode_name(mode, &mut self.world)?;
                println!("NAVMODE = {}", self.manager.nav_mode_name(&self.world)?);
                Ok(())
            }
            Step::Separate { vessel, root } => {
                self.world.separate(*vessel, *root);
                info!("replay: host part now in {}", vessel);
                Ok(())
            }
            Step::Unload { vessel } => {
                self.world.unload(*vessel);
                Ok(())
            }
            Step::Drophooks { relay_fails } => {
                self.world.drop_hooks();
                self.world.relay_accepts = !relay_fails;
                Ok(())
            }
            Step::Target { selected } => {
                self.world.target_selected = *selected;
                Ok(())
            }
        }
    }

    pub fn finish(&mut self) {
        info!(
            "replay: done after {} physics steps, state={:?}, hook installs={}",
            self.physics_steps,
            self.manager.state(),
            self.world.hook_installs
        );
        self.manager.dispose(&mut self.world);
    }

    /// The relay only calls back while the hook is in place.
    fn physics(&mut self) -> Result<(), BindingError> {
        self.physics_steps += 1;
        let Some(vessel) = self.manager.bound_vessel() else {
            println!("physics {}: not attached", self.physics_steps);
            return Ok(());
        };
        if !self.world.has_hook(vessel, self.manager.owner()) {
            println!("physics {}: no hook on {}", self.physics_steps, vessel);
            return Ok(());
        }
        let res = self.manager.on_fly_by_wire(&mut self.frame, &mut self.world);
        if let Some(v) = self.world.vessel_mut(vessel) {
            v.state.main_throttle = self.frame.main_throttle;
        }
        println!(
            "physics {}: {} main_throttle={:.3} wheel_throttle={:.3} wheel_steer={:.3}",
            self.physics_steps,
            vessel,
            self.frame.main_throttle,
            self.frame.wheel_throttle,
            self.frame.wheel_steer
        );
        res
    }
}

#[cfg(test)]
impl Replay {
    fn manager(&self) -> &ControlBindingManager {
        &self.manager
    }

    fn world(&self) -> &SimWorld {
        &self.world
    }

    fn frame(&self) -> ControlFrame {
        self.frame
    }
}
