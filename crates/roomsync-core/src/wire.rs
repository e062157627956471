//! Wire records exchanged with the editing server
//!
//! Field names mirror the server's JSON exactly (including its mixed
//! camelCase), so every record round-trips without a translation layer.
//! Rotations are degrees on the wire; positions and scales are plain
//! 3-element arrays.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Point3;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown entity kind tag: {0}")]
    UnknownEntityKind(u32),
    #[error("invalid marker action: {0}")]
    InvalidAction(u8),
}

/// Marker batch actions. The wire carries these as bare integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    Update,
    Create,
    Delete,
}

impl MarkerAction {
    /// Returns `None` for out-of-range values; callers log and ignore the
    /// record rather than failing the batch.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Update),
            1 => Some(Self::Create),
            2 => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Update => 0,
            Self::Create => 1,
            Self::Delete => 2,
        }
    }
}

/// Serialized state of one model instance, shared by outbound batches and
/// (with the extra fields in [`MeshUpdate`]) inbound updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStateRecord {
    pub mesh_instance_id: i64,
    pub parent_id: i64,
    pub position: [f64; 3],
    /// Euler rotation in degrees
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    #[serde(default)]
    pub mark_delete: bool,
}

/// Marker payload nested inside outbound marker actions and inbound updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub marker_instance_id: i64,
    pub position: [f64; 3],
    pub normal: [f64; 3],
    #[serde(rename = "type")]
    pub marker_type: u32,
    pub visibility: bool,
}

/// One outbound marker request: the marker payload plus the action to take
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerStateRecord {
    pub marker_info: MarkerInfo,
    /// Raw action tag; see [`MarkerAction::from_wire`]
    pub action: u8,
}

/// The periodic client -> server batch. Avatar pose is always present;
/// the state arrays carry only entities that changed since the last send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundBatch {
    pub user_position: [f64; 3],
    /// Degrees
    pub user_rotation: [f64; 3],
    #[serde(default)]
    pub model_states: Vec<ModelStateRecord>,
    #[serde(default)]
    pub marker_states: Vec<MarkerStateRecord>,
}

impl OutboundBatch {
    /// True when only the avatar pose would be sent
    pub fn is_pose_only(&self) -> bool {
        self.model_states.is_empty() && self.marker_states.is_empty()
    }
}

/// Inbound model record: the shared state fields plus the asset binding and
/// edit permission the server attaches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshUpdate {
    pub mesh_instance_id: i64,
    pub parent_id: i64,
    /// `[asset id, asset version]`
    pub asset_id: [String; 2],
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    #[serde(default)]
    pub mark_delete: bool,
    #[serde(default)]
    pub editable: bool,
}

/// Collaborator presence record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdate {
    pub id: i64,
    pub username: String,
    pub color: [f64; 3],
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    #[serde(default)]
    pub deleted: bool,
    /// Input device tag (1 = desktop, 2 = VR); absent from older servers
    #[serde(default)]
    pub device_input: Option<u32>,
}

/// Inbound marker record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerUpdate {
    pub marker_instance_id: i64,
    pub position: [f64; 3],
    pub normal: [f64; 3],
    #[serde(rename = "type")]
    pub marker_type: u32,
    pub visibility: bool,
    #[serde(default)]
    pub mark_delete: bool,
}

/// Inbound annotation record. The server names these fields in camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationUpdate {
    pub annotation_instance_id: i64,
    /// Entity kind tag of the annotated object; see [`crate::EntityKind`]
    #[serde(rename = "annotated_objectState_type")]
    pub annotated_object_type: u32,
    #[serde(rename = "annotated_objectState_id")]
    pub annotated_object_id: i64,
    pub title: String,
    pub description: String,
    pub auditor: String,
    #[serde(rename = "safetyCheckStatus")]
    pub safety_check_status: bool,
    #[serde(rename = "markedForDeletion", default)]
    pub marked_for_deletion: bool,
}

/// Inbound measurement record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementUpdate {
    pub measurement_instance_id: i64,
    #[serde(rename = "startPoint")]
    pub start_point: Point3,
    #[serde(rename = "endPoint")]
    pub end_point: Point3,
    #[serde(rename = "distanceMeasured")]
    pub distance_measured: f64,
    #[serde(rename = "markedForDeletion", default)]
    pub marked_for_deletion: bool,
}

/// Incremental server -> client delta batch, applied on receipt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomUpdate {
    #[serde(default)]
    pub mesh_updates: Vec<MeshUpdate>,
    #[serde(default)]
    pub user_updates: Vec<UserUpdate>,
    #[serde(default)]
    pub marker_updates: Vec<MarkerUpdate>,
    #[serde(default)]
    pub annotation_updates: Vec<AnnotationUpdate>,
    #[serde(default)]
    pub measurement_updates: Vec<MeasurementUpdate>,
}

impl RoomUpdate {
    pub fn is_empty(&self) -> bool {
        self.mesh_updates.is_empty()
            && self.user_updates.is_empty()
            && self.marker_updates.is_empty()
            && self.annotation_updates.is_empty()
            && self.measurement_updates.is_empty()
    }
}

/// Full authoritative room state fetched on join
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default)]
    pub user_instances: Vec<UserUpdate>,
    #[serde(default)]
    pub mesh_instances: Vec<MeshUpdate>,
    #[serde(default)]
    pub marker_instances: Vec<MarkerUpdate>,
    #[serde(default)]
    pub measurement_instances: Vec<MeasurementUpdate>,
    #[serde(default)]
    pub annotation_instances: Vec<AnnotationUpdate>,
}

impl RoomSnapshot {
    /// View the snapshot as a delta batch; snapshot application shares the
    /// delta code path after clearing local state
    pub fn as_update(&self) -> RoomUpdate {
        RoomUpdate {
            mesh_updates: self.mesh_instances.clone(),
            user_updates: self.user_instances.clone(),
            marker_updates: self.marker_instances.clone(),
            annotation_updates: self.annotation_instances.clone(),
            measurement_updates: self.measurement_instances.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_action_tags() {
        assert_eq!(MarkerAction::from_wire(0), Some(MarkerAction::Update));
        assert_eq!(MarkerAction::from_wire(1), Some(MarkerAction::Create));
        assert_eq!(MarkerAction::from_wire(2), Some(MarkerAction::Delete));
        assert_eq!(MarkerAction::from_wire(3), None);
        assert_eq!(MarkerAction::Create.to_wire(), 1);
    }

    #[test]
    fn test_mesh_update_round_trip() {
        let update = MeshUpdate {
            mesh_instance_id: 5,
            parent_id: -1,
            asset_id: ["crane".to_string(), "v2".to_string()],
            position: [1.0, 2.5, -3.0],
            rotation: [0.0, 90.0, 0.0],
            scale: [1.0, 1.0, 1.0],
            mark_delete: false,
            editable: true,
        };
        let json = serde_json::to_string(&update).unwrap();
        let back: MeshUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mesh_instance_id, 5);
        assert_eq!(back.asset_id[0], "crane");
        assert!(back.editable);
        for axis in 0..3 {
            assert!((back.rotation[axis] - update.rotation[axis]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_annotation_wire_names() {
        let json = r#"{
            "annotation_instance_id": 12,
            "annotated_objectState_type": 2,
            "annotated_objectState_id": 7,
            "title": "loose railing",
            "description": "second floor walkway",
            "auditor": "j.doe",
            "safetyCheckStatus": false,
            "markedForDeletion": false
        }"#;
        let update: AnnotationUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.annotated_object_type, 2);
        assert_eq!(update.annotated_object_id, 7);
        assert_eq!(update.title, "loose railing");
    }

    #[test]
    fn test_measurement_wire_names() {
        let json = r#"{
            "measurement_instance_id": 3,
            "startPoint": {"x": 0.0, "y": 0.0, "z": 0.0},
            "endPoint": {"x": 3.0, "y": 4.0, "z": 0.0},
            "distanceMeasured": 5.0
        }"#;
        let update: MeasurementUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.end_point.y, 4.0);
        assert!(!update.marked_for_deletion);
    }

    #[test]
    fn test_room_update_defaults_empty() {
        let update: RoomUpdate = serde_json::from_str(r#"{"mesh_updates": []}"#).unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_outbound_pose_only() {
        let batch = OutboundBatch {
            user_position: [0.0, 1.7, 0.0],
            user_rotation: [0.0, 45.0, 0.0],
            model_states: Vec::new(),
            marker_states: Vec::new(),
        };
        assert!(batch.is_pose_only());
        let json = serde_json::to_string(&batch).unwrap();
        let back: OutboundBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_rotation[1], 45.0);
    }
}
