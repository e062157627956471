//! Local replica records, one type per server entity kind

use chrono::{DateTime, Utc};
use roomsync_core::{
    AssetId, DeviceInputKind, InstanceId, MarkerInfo, ModelStateRecord, Point3, Transform, Vec3,
};

use crate::geometry::GeometryId;

/// A placed model instance. `transform` holds the last state agreed with the
/// server, in wire units (degrees); live drag state lives on the geometry
/// nodes until the drift scan reconciles it.
#[derive(Debug)]
pub struct ModelReplica {
    pub id: InstanceId,
    pub asset: AssetId,
    pub transform: Transform,
    pub parent: InstanceId,
    pub children: Vec<InstanceId>,
    pub editable: bool,
    pub visible: bool,
    pub mark_delete: bool,
    pub solid: Option<GeometryId>,
    pub point_cloud: Option<GeometryId>,
    pub annotation: Option<InstanceId>,
}

impl ModelReplica {
    pub fn new(id: InstanceId, asset: AssetId, transform: Transform) -> Self {
        Self {
            id,
            asset,
            transform,
            parent: InstanceId::ROOT,
            children: Vec::new(),
            editable: false,
            visible: true,
            mark_delete: false,
            solid: None,
            point_cloud: None,
            annotation: None,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.solid.is_some() || self.point_cloud.is_some()
    }

    /// The variant the user can pick and drag. When both exist the point
    /// cloud wins; the solid mesh stays a visual backdrop.
    pub fn interactive_geometry(&self) -> Option<GeometryId> {
        self.point_cloud.or(self.solid)
    }

    pub fn to_state_record(&self) -> ModelStateRecord {
        ModelStateRecord {
            mesh_instance_id: self.id.0,
            parent_id: self.parent.0,
            position: self.transform.position.to_array(),
            rotation: self.transform.rotation.to_array(),
            scale: self.transform.scale.to_array(),
            mark_delete: self.mark_delete,
        }
    }
}

/// A collaborator's presence in the room
#[derive(Debug)]
pub struct UserReplica {
    pub id: InstanceId,
    pub username: String,
    pub color: [f64; 3],
    pub transform: Transform,
    pub device: DeviceInputKind,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A placed marker. `dirty` flags a type or visibility change the render
/// layer has not picked up yet.
#[derive(Debug)]
pub struct MarkerReplica {
    pub id: InstanceId,
    pub position: Vec3,
    pub normal: Vec3,
    pub marker_type: u32,
    pub visibility: bool,
    pub dirty: bool,
    pub mark_delete: bool,
    pub annotation: Option<InstanceId>,
}

impl MarkerReplica {
    pub fn to_info(&self) -> MarkerInfo {
        MarkerInfo {
            marker_instance_id: self.id.0,
            position: self.position.to_array(),
            normal: self.normal.to_array(),
            marker_type: self.marker_type,
            visibility: self.visibility,
        }
    }
}

/// What an annotation is pinned to. Only models and markers can carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationTarget {
    Model(InstanceId),
    Marker(InstanceId),
}

impl AnnotationTarget {
    pub fn instance(self) -> InstanceId {
        match self {
            Self::Model(id) | Self::Marker(id) => id,
        }
    }
}

/// A safety annotation attached to another entity. Create-only; the server
/// never updates these in place.
#[derive(Debug)]
pub struct AnnotationReplica {
    pub id: InstanceId,
    pub target: AnnotationTarget,
    pub title: String,
    pub description: String,
    pub auditor: String,
    pub safety_check_status: bool,
    /// False while the annotated entity has not arrived yet
    pub resolved: bool,
}

/// A distance measurement between two points. Create-only.
#[derive(Debug)]
pub struct MeasurementReplica {
    pub id: InstanceId,
    pub start_point: Point3,
    pub end_point: Point3,
    pub distance: f64,
}
