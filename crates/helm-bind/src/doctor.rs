use anyhow::Result;

use crate::BindingConfig;

pub fn check_config(cfg: &BindingConfig) -> Result<()> {
    anyhow::ensure!(cfg.resubscribe_period >= 3, "binding.resubscribe_period should be >= 3");
    anyhow::ensure!(
        cfg.wheel_steer_min_speed.is_finite() && cfg.wheel_steer_min_speed >= 0.0,
        "binding.wheel_steer_min_speed must be a non-negative number"
    );
    anyhow::ensure!(
        cfg.wheel_steer_deg_per_unit.is_finite() && cfg.wheel_steer_deg_per_unit > 0.0,
        "binding.wheel_steer_deg_per_unit must be > 0"
    );
    Ok(())
}
