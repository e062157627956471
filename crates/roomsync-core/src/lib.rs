//! Roomsync Core - Wire protocol records, transform math, and entity ids
//!
//! This crate provides the foundational types for the roomsync client:
//! - Wire records for the periodic outbound batch and inbound room updates
//! - Transform math (degrees on the wire, radians at the geometry boundary)
//! - Instance ids, asset ids, and entity-kind tags

pub mod id;
pub mod math;
pub mod wire;

pub use id::{AssetId, DeviceInputKind, EntityKind, InstanceId, LIVE_VERSION};
pub use math::{Point3, Transform, Vec3};
pub use wire::{
    AnnotationUpdate, MarkerAction, MarkerInfo, MarkerStateRecord, MarkerUpdate,
    MeasurementUpdate, MeshUpdate, ModelStateRecord, OutboundBatch, RoomSnapshot, RoomUpdate,
    UserUpdate, WireError,
};
