//! Instance and asset identifiers for server-tracked entities

use serde::{Deserialize, Serialize};

/// Version tag for templates backed by the live reconstruction rather than a
/// published asset version
pub const LIVE_VERSION: &str = "__LIVE_VERSION";

/// Server-assigned identifier for a tracked entity instance
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct InstanceId(pub i64);

impl InstanceId {
    /// Sentinel parent id meaning "attached to the room root"
    pub const ROOT: InstanceId = InstanceId(-1);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for InstanceId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Identifies a shared geometry definition by asset id and version.
/// Two instances with the same AssetId share one template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    pub id: String,
    pub version: String,
}

impl AssetId {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// A live-reconstruction asset, reloaded when the server publishes a new
    /// reconstruction for this id
    pub fn live(id: impl Into<String>) -> Self {
        Self::new(id, LIVE_VERSION)
    }

    pub fn is_live(&self) -> bool {
        self.version == LIVE_VERSION
    }

    /// Template cache key
    pub fn key(&self) -> String {
        format!("{}_{}", self.id, self.version)
    }

    /// The wire carries asset ids as a two-element `[id, version]` array
    pub fn from_wire(pair: &[String; 2]) -> Self {
        Self::new(pair[0].clone(), pair[1].clone())
    }

    pub fn to_wire(&self) -> [String; 2] {
        [self.id.clone(), self.version.clone()]
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Server object kind tags, as annotations reference their target on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Model,
    Marker,
    Measurement,
}

impl EntityKind {
    /// Wire tag values; 0 is the server's "invalid" sentinel
    pub fn from_wire(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Model),
            2 => Some(Self::Marker),
            3 => Some(Self::Measurement),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Self::Model => 1,
            Self::Marker => 2,
            Self::Measurement => 3,
        }
    }
}

/// Input device a collaborator is using, from presence records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceInputKind {
    Pc,
    Vr,
}

impl DeviceInputKind {
    pub fn from_wire(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Pc),
            2 => Some(Self::Vr),
            _ => None,
        }
    }
}

impl Default for DeviceInputKind {
    fn default() -> Self {
        Self::Pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_sentinel() {
        assert!(InstanceId(-1).is_root());
        assert!(!InstanceId(0).is_root());
        assert_eq!(InstanceId::ROOT, InstanceId(-1));
    }

    #[test]
    fn test_asset_key() {
        let asset = AssetId::new("warehouse", "v3");
        assert_eq!(asset.key(), "warehouse_v3");
        assert_eq!(AssetId::from_wire(&asset.to_wire()), asset);
    }

    #[test]
    fn test_live_asset() {
        let asset = AssetId::live("site-scan");
        assert!(asset.is_live());
        assert_eq!(asset.key(), format!("site-scan_{LIVE_VERSION}"));
    }

    #[test]
    fn test_entity_kind_tags() {
        assert_eq!(EntityKind::from_wire(1), Some(EntityKind::Model));
        assert_eq!(EntityKind::from_wire(2), Some(EntityKind::Marker));
        assert_eq!(EntityKind::from_wire(0), None);
        assert_eq!(EntityKind::from_wire(7), None);
        assert_eq!(EntityKind::Marker.to_wire(), 2);
    }
}
