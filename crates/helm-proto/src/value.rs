use serde::{Deserialize, Serialize};

use crate::VesselId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Command value as handed over by the scripting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Vessel(VesselId),
    Geo(GeoCoordinates),
    Direction { pitch: f64, yaw: f64, roll: f64 },
}

impl CommandValue {
    /// Numeric view of the value. Booleans count as 1/0, text must parse as a real number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CommandValue::Number(n) => Some(*n),
            CommandValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CommandValue::Text(s) => s.trim().parse::<f64>().ok(),
            CommandValue::Vessel(_) | CommandValue::Geo(_) | CommandValue::Direction { .. } => None,
        }
    }

    /// Type name as scripts see it.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CommandValue::Number(_) => "Scalar",
            CommandValue::Text(_) => "String",
            CommandValue::Bool(_) => "Boolean",
            CommandValue::Vessel(_) => "Vessel",
            CommandValue::Geo(_) => "GeoCoordinates",
            CommandValue::Direction { .. } => "Direction",
        }
    }
}

impl From<f64> for CommandValue {
    fn from(v: f64) -> Self {
        CommandValue::Number(v)
    }
}

impl From<&str> for CommandValue {
    fn from(v: &str) -> Self {
        CommandValue::Text(v.to_string())
    }
}
