//! Roomsync Client - replicated-object synchronization engine
//!
//! This crate maintains a local mirror of every entity the editing server
//! tracks in a room (model instances, collaborators, markers, annotations,
//! measurements), reconciles inbound delta batches against locally-owned
//! edits, shares geometry between instances through a template/clone cache,
//! and drains local mutations into outbound batches on a fixed cadence.
//!
//! Components, leaves first:
//! - [`geometry`] - per-instance geometry handles backed by shared data
//! - [`template`] - load-once geometry templates with pending clone queues
//! - [`replica`] - per-entity-kind replica records
//! - [`ownership`] - exclusivity guard for locally-manipulated instances
//! - [`dirty`] - tracks instances that diverged from their synced state
//! - [`store`] - the entity replica store (snapshot/delta application)
//! - [`session`] - the fixed-interval sync driver

pub mod config;
pub mod dirty;
pub mod events;
pub mod geometry;
pub mod ownership;
pub mod replica;
pub mod session;
pub mod store;
pub mod template;

pub use config::SyncConfig;
pub use events::SessionEvent;
pub use geometry::{GeometryData, GeometryId, GeometryPool, GeometryVariant};
pub use ownership::OwnershipGuard;
pub use replica::{
    AnnotationReplica, AnnotationTarget, MarkerReplica, MeasurementReplica, ModelReplica,
    UserReplica,
};
pub use session::{RoomSession, SessionChannels, SessionPhase};
pub use store::{ReplicaStore, StoreError};
pub use template::{LoadError, LoadRequest, LoadResult, Template, TemplateCache, TemplateMeta};
