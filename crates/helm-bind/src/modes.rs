//! Autopilot (SAS) and navigation speed-display modes, and the names scripts
//! use for them.
//!
//! The host has RadialIn and RadialOut inverted. Scripts have always seen the
//! inverted names, so "radialin" selects `RadialOut` and `RadialOut` reports
//! itself as "RADIALIN" (and the other way round). Keep both directions in
//! sync.

use helm_proto::CommandValue;

use crate::error::{BindingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutopilotMode {
    StabilityAssist,
    Prograde,
    Retrograde,
    Normal,
    Antinormal,
    RadialIn,
    RadialOut,
    Target,
    AntiTarget,
    Maneuver,
}

impl AutopilotMode {
    /// Integer code used by the autopilot indicator.
    pub fn code(self) -> i32 {
        match self {
            AutopilotMode::StabilityAssist => 0,
            AutopilotMode::Prograde => 1,
            AutopilotMode::Retrograde => 2,
            AutopilotMode::Normal => 3,
            AutopilotMode::Antinormal => 4,
            AutopilotMode::RadialIn => 5,
            AutopilotMode::RadialOut => 6,
            AutopilotMode::Target => 7,
            AutopilotMode::AntiTarget => 8,
            AutopilotMode::Maneuver => 9,
        }
    }

    pub fn from_script_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Ok(AutopilotMode::StabilityAssist);
        }
        let mode = match name.to_ascii_lowercase().as_str() {
            "maneuver" => AutopilotMode::Maneuver,
            "prograde" => AutopilotMode::Prograde,
            "retrograde" => AutopilotMode::Retrograde,
            "normal" => AutopilotMode::Normal,
            "antinormal" => AutopilotMode::Antinormal,
            "radialin" => AutopilotMode::RadialOut,
            "radialout" => AutopilotMode::RadialIn,
            "target" => AutopilotMode::Target,
            "antitarget" => AutopilotMode::AntiTarget,
            "stability" | "stabilityassist" => AutopilotMode::StabilityAssist,
            _ => {
                return Err(BindingError::InvalidMode {
                    setting: "SAS mode",
                    name: name.to_string(),
                })
            }
        };
        Ok(mode)
    }

    pub fn script_name(self) -> &'static str {
        match self {
            AutopilotMode::StabilityAssist => "STABILITYASSIST",
            AutopilotMode::Prograde => "PROGRADE",
            AutopilotMode::Retrograde => "RETROGRADE",
            AutopilotMode::Normal => "NORMAL",
            AutopilotMode::Antinormal => "ANTINORMAL",
            AutopilotMode::RadialIn => "RADIALOUT",
            AutopilotMode::RadialOut => "RADIALIN",
            AutopilotMode::Target => "TARGET",
            AutopilotMode::AntiTarget => "ANTITARGET",
            AutopilotMode::Maneuver => "MANEUVER",
        }
    }

    /// Mode requested through the SASMODE binding. An unset value means stability assist.
    pub fn from_value(value: Option<&CommandValue>) -> Result<Self> {
        match value {
            None => Ok(AutopilotMode::StabilityAssist),
            Some(CommandValue::Text(name)) => Self::from_script_name(name),
            Some(v @ CommandValue::Direction { .. }) => Err(BindingError::TypeMismatch {
                channel: "SASMODE",
                found: v.kind_name(),
                expected: "name of the SAS mode as a string (e.g. \"PROGRADE\"); \
                           use LOCK STEERING to hold a direction",
            }),
            Some(v) => Err(BindingError::TypeMismatch {
                channel: "SASMODE",
                found: v.kind_name(),
                expected: "name of the SAS mode (as string)",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NavMode {
    #[default]
    Orbit,
    Surface,
    Target,
}

impl NavMode {
    pub fn from_script_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Ok(NavMode::Orbit);
        }
        match name.to_ascii_lowercase().as_str() {
            "orbit" => Ok(NavMode::Orbit),
            "surface" => Ok(NavMode::Surface),
            "target" => Ok(NavMode::Target),
            _ => Err(BindingError::InvalidMode {
                setting: "navigation mode",
                name: name.to_string(),
            }),
        }
    }

    pub fn script_name(self) -> &'static str {
        match self {
            NavMode::Orbit => "ORBIT",
            NavMode::Surface => "SURFACE",
            NavMode::Target => "TARGET",
        }
    }

    pub fn from_value(value: Option<&CommandValue>) -> Result<Self> {
        match value {
            None => Ok(NavMode::Orbit),
            Some(CommandValue::Text(name)) => Self::from_script_name(name),
            Some(v) => Err(BindingError::TypeMismatch {
                channel: "NAVMODE",
                found: v.kind_name(),
                expected: "string (\"ORBIT\", \"SURFACE\" or \"TARGET\")",
            }),
        }
    }
}
