use serde::{Deserialize, Serialize};

/// Per physics step actuator state. Each channel writes its own field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    /// 0..1
    pub main_throttle: f32,
    /// -1..1
    pub wheel_throttle: f32,
    /// -1..1, positive steers left
    pub wheel_steer: f32,
}
