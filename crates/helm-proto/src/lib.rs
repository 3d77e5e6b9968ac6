pub mod frame;
pub mod value;

use serde::{Deserialize, Serialize};

pub use frame::ControlFrame;
pub use value::{CommandValue, GeoCoordinates};

/// Vessel identity. Changes whenever a vessel splits or merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselId(pub u64);

/// Flight id of a vessel's root part; survives renames and is what control state is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootPartId(pub u32);

/// Part hosting a scripting context. Used as hook identity and steering owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselRef {
    pub id: VesselId,
    /// None while the vessel is still being assembled (not structurally valid yet)
    pub root: Option<RootPartId>,
}

impl VesselRef {
    pub fn is_valid(&self) -> bool {
        self.root.is_some()
    }
}

impl std::fmt::Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vessel#{}", self.0)
    }
}

impl std::fmt::Display for RootPartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "part#{}", self.0)
    }
}
