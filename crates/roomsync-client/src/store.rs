//! The entity replica store
//!
//! Owns the local mirror of every server-tracked entity in the joined room
//! and reconciles it against inbound snapshots and delta batches. Inbound
//! model records are applied in two passes: pass one creates, deletes, and
//! updates each instance in isolation; pass two rewires parent links for
//! previously-known instances, so records in one batch can arrive in any
//! order. Instances created this batch resolve their parents right after
//! pass one, once every sibling from the batch exists.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use roomsync_core::{
    AnnotationUpdate, AssetId, DeviceInputKind, EntityKind, InstanceId, MarkerAction, MarkerInfo,
    MarkerStateRecord, MarkerUpdate, MeasurementUpdate, MeshUpdate, OutboundBatch, RoomSnapshot,
    RoomUpdate, Transform, UserUpdate, Vec3,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::dirty::DirtyTracker;
use crate::events::SessionEvent;
use crate::geometry::GeometryPool;
use crate::ownership::OwnershipGuard;
use crate::replica::{
    AnnotationReplica, AnnotationTarget, MarkerReplica, MeasurementReplica, ModelReplica,
    UserReplica,
};
use crate::template::{LoadError, LoadRequest, LoadResult, TemplateCache};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no model instance {0}")]
    UnknownModel(InstanceId),
    #[error("no marker instance {0}")]
    UnknownMarker(InstanceId),
    #[error("model instance {0} is not editable")]
    NotEditable(InstanceId),
    #[error("model instance {0} has no geometry yet")]
    NoGeometry(InstanceId),
}

pub struct ReplicaStore {
    self_user: Option<InstanceId>,
    models: HashMap<InstanceId, ModelReplica>,
    users: HashMap<InstanceId, UserReplica>,
    markers: HashMap<InstanceId, MarkerReplica>,
    annotations: HashMap<InstanceId, AnnotationReplica>,
    measurements: HashMap<InstanceId, MeasurementReplica>,
    templates: TemplateCache,
    pool: GeometryPool,
    dirty: DirtyTracker,
    guard: OwnershipGuard,
    dirty_epsilon: f64,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl ReplicaStore {
    pub fn new(
        dirty_epsilon: f64,
        guard: OwnershipGuard,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            self_user: None,
            models: HashMap::new(),
            users: HashMap::new(),
            markers: HashMap::new(),
            annotations: HashMap::new(),
            measurements: HashMap::new(),
            templates: TemplateCache::new(),
            pool: GeometryPool::new(),
            dirty: DirtyTracker::new(),
            guard,
            dirty_epsilon,
            event_tx,
        }
    }

    /// Our own presence id; presence records for it are ignored so the
    /// server's echo never moves the local avatar
    pub fn set_self_user(&mut self, id: InstanceId) {
        self.self_user = Some(id);
    }

    /// Replace all local state with an authoritative room snapshot. Returns
    /// the template loads the caller must dispatch.
    pub fn apply_snapshot(&mut self, snapshot: &RoomSnapshot) -> Vec<LoadRequest> {
        self.clear_room();
        self.apply_update(&snapshot.as_update())
    }

    /// Apply one inbound delta batch. Entity kinds are processed in a fixed
    /// order so annotations can usually attach within the same batch.
    pub fn apply_update(&mut self, update: &RoomUpdate) -> Vec<LoadRequest> {
        let mut loads = Vec::new();
        if !update.mesh_updates.is_empty() {
            self.update_models(&update.mesh_updates, &mut loads);
        }
        if !update.user_updates.is_empty() {
            self.update_users(&update.user_updates);
        }
        if !update.marker_updates.is_empty() {
            self.update_markers(&update.marker_updates);
        }
        if !update.annotation_updates.is_empty() {
            self.update_annotations(&update.annotation_updates);
        }
        if !update.measurement_updates.is_empty() {
            self.update_measurements(&update.measurement_updates);
        }
        self.resolve_annotations();
        loads
    }

    fn update_models(&mut self, records: &[MeshUpdate], loads: &mut Vec<LoadRequest>) {
        let mut created: HashSet<InstanceId> = HashSet::new();

        // pass one: per-instance create, delete, update
        for rec in records {
            let id = InstanceId(rec.mesh_instance_id);
            if self.models.contains_key(&id) {
                if rec.mark_delete {
                    self.remove_model(id);
                } else if self.guard.is_held(id) {
                    debug!(instance = %id, "held locally, inbound transform skipped");
                } else {
                    let transform = record_transform(rec);
                    if let Some(replica) = self.models.get_mut(&id) {
                        replica.transform = transform;
                        replica.editable = rec.editable;
                    }
                    self.apply_replica_transform(id);
                }
            } else {
                if rec.mark_delete {
                    // delete for an id we never knew is a no-op
                    continue;
                }
                self.create_model(rec, loads);
                created.insert(id);
            }
        }

        // instances created this batch attach once all siblings exist
        for rec in records {
            let id = InstanceId(rec.mesh_instance_id);
            if !created.contains(&id) {
                continue;
            }
            let declared = InstanceId(rec.parent_id);
            if !declared.is_root() {
                self.attach_to_parent(id, declared);
            }
        }

        // pass two: rewire previously-known instances whose parent changed
        for rec in records {
            let id = InstanceId(rec.mesh_instance_id);
            if created.contains(&id) {
                continue;
            }
            let Some(current) = self.models.get(&id).map(|m| m.parent) else {
                continue;
            };
            let declared = InstanceId(rec.parent_id);
            if current == declared {
                continue;
            }
            self.detach_from_parent(id);
            if !declared.is_root() {
                self.attach_to_parent(id, declared);
            }
        }
    }

    fn create_model(&mut self, rec: &MeshUpdate, loads: &mut Vec<LoadRequest>) {
        let id = InstanceId(rec.mesh_instance_id);
        let asset = AssetId::from_wire(&rec.asset_id);
        let mut replica = ModelReplica::new(id, asset.clone(), record_transform(rec));
        replica.editable = rec.editable;
        self.models.insert(id, replica);

        let loaded = {
            let (template, request) = self.templates.get_or_create(&asset);
            template.bind(id);
            if let Some(request) = request {
                loads.push(request);
            }
            if template.is_loaded() {
                true
            } else {
                template.enqueue_pending(id);
                false
            }
        };
        debug!(instance = %id, asset = %asset, "model instance created");
        if loaded {
            self.attach_geometry(id);
        }
    }

    fn remove_model(&mut self, id: InstanceId) {
        let Some(replica) = self.models.remove(&id) else {
            return;
        };
        if let Some(gid) = replica.solid {
            self.pool.dispose(gid);
        }
        if let Some(gid) = replica.point_cloud {
            self.pool.dispose(gid);
        }
        if let Some(template) = self.templates.get_mut(&replica.asset.key()) {
            template.unbind(id);
        }
        if !replica.parent.is_root() {
            if let Some(parent) = self.models.get_mut(&replica.parent) {
                parent.children.retain(|c| *c != id);
            }
        }
        // children keep the dead parent id; their own deltas rewire them
        if self.guard.release_instance(id) {
            debug!(instance = %id, "hold released, held instance deleted by server");
        }
        self.dirty.forget_model(id);
        debug!(instance = %id, "model instance removed");
    }

    /// Push the replica's synced transform down to its geometry nodes
    fn apply_replica_transform(&mut self, id: InstanceId) {
        let Some(replica) = self.models.get(&id) else {
            return;
        };
        let transform = replica.transform;
        let nodes = [replica.solid, replica.point_cloud];
        for gid in nodes.into_iter().flatten() {
            self.pool.apply_transform(gid, &transform);
        }
    }

    fn would_cycle(&self, id: InstanceId, new_parent: InstanceId) -> bool {
        let mut current = new_parent;
        let mut depth = 0;
        while !current.is_root() {
            if current == id {
                return true;
            }
            let Some(replica) = self.models.get(&current) else {
                return false;
            };
            current = replica.parent;
            depth += 1;
            if depth > 256 {
                return true;
            }
        }
        false
    }

    fn attach_to_parent(&mut self, id: InstanceId, parent: InstanceId) {
        if !self.models.contains_key(&parent) {
            debug!(instance = %id, parent = %parent, "parent not present yet, staying at root");
            return;
        }
        if self.would_cycle(id, parent) {
            warn!(instance = %id, parent = %parent, "reparent would create a cycle, keeping at root");
            return;
        }
        if let Some(replica) = self.models.get_mut(&id) {
            replica.parent = parent;
        }
        if let Some(parent_replica) = self.models.get_mut(&parent) {
            if !parent_replica.children.contains(&id) {
                parent_replica.children.push(id);
            }
        }
        self.link_geometry_parent(id);
        self.apply_replica_transform(id);
    }

    fn detach_from_parent(&mut self, id: InstanceId) {
        let Some(old_parent) = self.models.get(&id).map(|m| m.parent) else {
            return;
        };
        if old_parent.is_root() {
            return;
        }
        if let Some(parent) = self.models.get_mut(&old_parent) {
            parent.children.retain(|c| *c != id);
        }
        if let Some(replica) = self.models.get_mut(&id) {
            replica.parent = InstanceId::ROOT;
        }
        self.link_geometry_parent(id);
        self.apply_replica_transform(id);
    }

    /// Point this instance's nodes at its parent's anchor node, or the root
    fn link_geometry_parent(&mut self, id: InstanceId) {
        let Some(replica) = self.models.get(&id) else {
            return;
        };
        let solid = replica.solid;
        let point_cloud = replica.point_cloud;
        let parent_gid = if replica.parent.is_root() {
            None
        } else {
            self.models
                .get(&replica.parent)
                .and_then(|p| p.solid.or(p.point_cloud))
        };
        for gid in [solid, point_cloud].into_iter().flatten() {
            self.pool.set_parent(gid, parent_gid);
        }
    }

    /// Clone the instance's template geometry into the pool. Safe to call
    /// when the instance was deleted while its load was in flight.
    fn attach_geometry(&mut self, id: InstanceId) {
        let Some(replica) = self.models.get(&id) else {
            debug!(instance = %id, "instance removed before its geometry arrived");
            return;
        };
        let key = replica.asset.key();
        let editable = replica.editable;
        let visible = replica.visible;
        let (solid_data, pc_data, clone_idx) = {
            let Some(template) = self.templates.get_mut(&key) else {
                return;
            };
            if !template.is_loaded() {
                return;
            }
            (
                template.solid.clone(),
                template.point_cloud.clone(),
                template.next_clone_index(),
            )
        };
        let solid = solid_data.map(|d| self.pool.insert(format!("{key}_{clone_idx}"), d));
        let point_cloud = pc_data.map(|d| self.pool.insert(format!("{key}_pc_{clone_idx}"), d));
        // point cloud is the interactive variant when both exist
        if let Some(gid) = solid {
            self.pool.set_pickable(gid, editable && point_cloud.is_none());
            self.pool.set_visible(gid, visible);
        }
        if let Some(gid) = point_cloud {
            self.pool.set_pickable(gid, editable);
            self.pool.set_visible(gid, visible);
        }
        if let Some(replica) = self.models.get_mut(&id) {
            replica.solid = solid;
            replica.point_cloud = point_cloud;
        }
        self.link_geometry_parent(id);
        self.apply_replica_transform(id);
        // children cloned earlier re-anchor to the new node
        let children: Vec<InstanceId> = self
            .models
            .get(&id)
            .map(|m| m.children.clone())
            .unwrap_or_default();
        for child in children {
            self.link_geometry_parent(child);
            self.apply_replica_transform(child);
        }
    }

    /// Handle a loader completion. On first load the pending clone queue is
    /// replayed in arrival order; on reload every bound instance is recloned
    /// in place. Completions whose iteration a later reload superseded are
    /// dropped.
    pub fn complete_template_load(
        &mut self,
        key: &str,
        iteration: u32,
        result: Result<LoadResult, LoadError>,
    ) {
        match result {
            Err(e) => {
                if self.templates.fail_load(key, iteration) {
                    warn!(key, error = %e, "template load failed");
                    let _ = self.event_tx.send(SessionEvent::TemplateLoadFailed {
                        key: key.to_string(),
                    });
                }
            }
            Ok(res) => {
                let was_loaded = self
                    .templates
                    .get(key)
                    .map(|t| t.is_loaded())
                    .unwrap_or(false);
                let Some(pending) = self.templates.complete_load(key, iteration, res) else {
                    debug!(key, "load result for unknown template ignored");
                    return;
                };
                let _ = self.event_tx.send(SessionEvent::TemplateLoaded {
                    key: key.to_string(),
                });
                if was_loaded {
                    self.reclone_bound(key);
                }
                for id in pending {
                    self.attach_geometry(id);
                }
            }
        }
    }

    /// Swap every bound instance onto freshly-loaded geometry, preserving
    /// each instance's live pose and any active hold
    fn reclone_bound(&mut self, key: &str) {
        let bound: Vec<InstanceId> = match self.templates.get(key) {
            Some(t) => t.bound_instances().collect(),
            None => return,
        };
        for id in bound {
            let Some(replica) = self.models.get(&id) else {
                continue;
            };
            if !replica.has_geometry() {
                // first clone still pending, nothing to swap
                continue;
            }
            let old_solid = replica.solid;
            let old_pc = replica.point_cloud;
            // keep the pose the user last saw, including unsent drag state
            let live = replica
                .interactive_geometry()
                .and_then(|gid| self.pool.read_transform(gid));
            if let Some(replica) = self.models.get_mut(&id) {
                if let Some(live) = live {
                    replica.transform = live;
                }
                replica.solid = None;
                replica.point_cloud = None;
            }
            self.attach_geometry(id);
            let (new_solid, new_pc) = self
                .models
                .get(&id)
                .map(|m| (m.solid, m.point_cloud))
                .unwrap_or((None, None));
            // the hold follows the interactive node even when the reload
            // ships a different variant set
            let old_interactive = old_pc.or(old_solid);
            let new_interactive = new_pc.or(new_solid);
            if let (Some(old), Some(new)) = (old_interactive, new_interactive) {
                self.guard.transfer(old, new);
            }
            if let Some(gid) = old_solid {
                self.pool.dispose(gid);
            }
            if let Some(gid) = old_pc {
                self.pool.dispose(gid);
            }
            debug!(instance = %id, key, "instance recloned after reload");
        }
    }

    /// The server published a new live reconstruction for an asset id.
    /// Returns the reload request to dispatch, if a live template exists.
    pub fn handle_new_reconstruction(&mut self, asset_id: &str) -> Option<LoadRequest> {
        let key = AssetId::live(asset_id).key();
        self.templates.request_reload(&key)
    }

    fn update_users(&mut self, records: &[UserUpdate]) {
        for rec in records {
            let id = InstanceId(rec.id);
            if Some(id) == self.self_user {
                continue;
            }
            if rec.deleted {
                if self.users.remove(&id).is_some() {
                    info!(user = %id, username = %rec.username, "collaborator left");
                    let _ = self.event_tx.send(SessionEvent::CollaboratorLeft { id });
                }
                continue;
            }
            let transform = Transform {
                position: Vec3::from_array(rec.position),
                rotation: Vec3::from_array(rec.rotation),
                scale: Vec3::one(),
            };
            let device = rec
                .device_input
                .and_then(DeviceInputKind::from_wire)
                .unwrap_or_default();
            match self.users.entry(id) {
                Entry::Occupied(mut e) => {
                    let user = e.get_mut();
                    user.transform = transform;
                    user.device = device;
                    user.updated_at = Utc::now();
                }
                Entry::Vacant(e) => {
                    info!(user = %id, username = %rec.username, "collaborator joined");
                    e.insert(UserReplica {
                        id,
                        username: rec.username.clone(),
                        color: rec.color,
                        transform,
                        device,
                        joined_at: Utc::now(),
                        updated_at: Utc::now(),
                    });
                    let _ = self.event_tx.send(SessionEvent::CollaboratorJoined {
                        id,
                        username: rec.username.clone(),
                    });
                }
            }
        }
    }

    fn update_markers(&mut self, records: &[MarkerUpdate]) {
        for rec in records {
            let id = InstanceId(rec.marker_instance_id);
            if self.markers.contains_key(&id) {
                if rec.mark_delete {
                    self.markers.remove(&id);
                    debug!(marker = %id, "marker removed");
                    let _ = self.event_tx.send(SessionEvent::MarkerRemoved { id });
                } else if let Some(marker) = self.markers.get_mut(&id) {
                    marker.position = Vec3::from_array(rec.position);
                    marker.normal = Vec3::from_array(rec.normal);
                    if marker.marker_type != rec.marker_type
                        || marker.visibility != rec.visibility
                    {
                        // render layer repaints dirty markers
                        marker.dirty = true;
                    }
                    marker.marker_type = rec.marker_type;
                    marker.visibility = rec.visibility;
                }
            } else {
                if rec.mark_delete {
                    continue;
                }
                self.markers.insert(
                    id,
                    MarkerReplica {
                        id,
                        position: Vec3::from_array(rec.position),
                        normal: Vec3::from_array(rec.normal),
                        marker_type: rec.marker_type,
                        visibility: rec.visibility,
                        dirty: false,
                        mark_delete: false,
                        annotation: None,
                    },
                );
                debug!(marker = %id, "marker created");
                let _ = self.event_tx.send(SessionEvent::MarkerAdded { id });
            }
        }
    }

    fn update_annotations(&mut self, records: &[AnnotationUpdate]) {
        for rec in records {
            let id = InstanceId(rec.annotation_instance_id);
            // create-only: the server never edits an annotation in place
            if self.annotations.contains_key(&id) || rec.marked_for_deletion {
                continue;
            }
            let target_id = InstanceId(rec.annotated_object_id);
            let target = match EntityKind::from_wire(rec.annotated_object_type) {
                Some(EntityKind::Model) => AnnotationTarget::Model(target_id),
                Some(EntityKind::Marker) => AnnotationTarget::Marker(target_id),
                Some(EntityKind::Measurement) | None => {
                    warn!(
                        annotation = %id,
                        tag = rec.annotated_object_type,
                        "unsupported annotation target kind, record skipped"
                    );
                    continue;
                }
            };
            self.annotations.insert(
                id,
                AnnotationReplica {
                    id,
                    target,
                    title: rec.title.clone(),
                    description: rec.description.clone(),
                    auditor: rec.auditor.clone(),
                    safety_check_status: rec.safety_check_status,
                    resolved: false,
                },
            );
            let _ = self.event_tx.send(SessionEvent::AnnotationAdded { id });
        }
    }

    fn update_measurements(&mut self, records: &[MeasurementUpdate]) {
        for rec in records {
            let id = InstanceId(rec.measurement_instance_id);
            if self.measurements.contains_key(&id) || rec.marked_for_deletion {
                continue;
            }
            self.measurements.insert(
                id,
                MeasurementReplica {
                    id,
                    start_point: rec.start_point,
                    end_point: rec.end_point,
                    distance: rec.distance_measured,
                },
            );
            let _ = self.event_tx.send(SessionEvent::MeasurementAdded { id });
        }
    }

    /// Attach annotations whose target has arrived, this batch or earlier
    fn resolve_annotations(&mut self) {
        let unresolved: Vec<(InstanceId, AnnotationTarget)> = self
            .annotations
            .values()
            .filter(|a| !a.resolved)
            .map(|a| (a.id, a.target))
            .collect();
        for (id, target) in unresolved {
            let attached = match target {
                AnnotationTarget::Model(target_id) => {
                    if let Some(model) = self.models.get_mut(&target_id) {
                        model.annotation = Some(id);
                        true
                    } else {
                        false
                    }
                }
                AnnotationTarget::Marker(target_id) => {
                    if let Some(marker) = self.markers.get_mut(&target_id) {
                        marker.annotation = Some(id);
                        true
                    } else {
                        false
                    }
                }
            };
            if attached {
                if let Some(annotation) = self.annotations.get_mut(&id) {
                    annotation.resolved = true;
                }
                debug!(annotation = %id, target = %target.instance(), "annotation attached");
            }
        }
    }

    /// Build the periodic outbound batch: the avatar pose plus every model
    /// whose live pose drifted past the epsilon or was explicitly flagged,
    /// and any queued marker actions. Drained state is sent exactly once.
    pub fn collect_outbound(&mut self, user_position: Vec3, user_rotation: Vec3) -> OutboundBatch {
        let mut flagged: BTreeSet<InstanceId> = self.dirty.take_models();

        let mut ids: Vec<InstanceId> = self.models.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if flagged.contains(&id) {
                continue;
            }
            let Some(replica) = self.models.get(&id) else {
                continue;
            };
            let Some(gid) = replica.interactive_geometry() else {
                continue;
            };
            let Some(live) = self.pool.read_transform(gid) else {
                continue;
            };
            if !live.approx_eq(&replica.transform, self.dirty_epsilon) {
                flagged.insert(id);
            }
        }

        let mut model_states = Vec::with_capacity(flagged.len());
        for id in flagged {
            let live = self
                .models
                .get(&id)
                .and_then(|m| m.interactive_geometry())
                .and_then(|gid| self.pool.read_transform(gid));
            let Some(replica) = self.models.get_mut(&id) else {
                continue;
            };
            if !replica.mark_delete {
                if let Some(live) = live {
                    replica.transform = live;
                }
            }
            model_states.push(replica.to_state_record());
        }

        OutboundBatch {
            user_position: user_position.to_array(),
            user_rotation: user_rotation.to_array(),
            model_states,
            marker_states: self.dirty.take_marker_actions(),
        }
    }

    /// Take the exclusive hold on an editable instance before dragging it
    pub fn begin_manipulation(&mut self, id: InstanceId) -> Result<(), StoreError> {
        let replica = self.models.get(&id).ok_or(StoreError::UnknownModel(id))?;
        if !replica.editable {
            return Err(StoreError::NotEditable(id));
        }
        let gid = replica
            .interactive_geometry()
            .ok_or(StoreError::NoGeometry(id))?;
        self.guard.hold(id, gid);
        Ok(())
    }

    /// Release the hold and flag the instance so its final pose goes out
    /// with the next batch
    pub fn end_manipulation(&mut self, id: InstanceId) {
        if self.guard.release_instance(id) {
            self.dirty.mark_model(id);
        }
    }

    /// Write a local drag pose onto the live nodes. The drift scan picks it
    /// up at the next batch; the synced transform is untouched until then.
    pub fn set_local_transform(
        &mut self,
        id: InstanceId,
        transform: Transform,
    ) -> Result<(), StoreError> {
        let replica = self.models.get(&id).ok_or(StoreError::UnknownModel(id))?;
        let nodes = [replica.solid, replica.point_cloud];
        for gid in nodes.into_iter().flatten() {
            self.pool.apply_transform(gid, &transform);
        }
        Ok(())
    }

    /// Flag an instance for deletion. Local state is kept until the server
    /// echoes the delete back.
    pub fn mark_model_deleted(&mut self, id: InstanceId) -> Result<(), StoreError> {
        let replica = self.models.get_mut(&id).ok_or(StoreError::UnknownModel(id))?;
        replica.mark_delete = true;
        self.dirty.mark_model(id);
        info!(instance = %id, "model flagged for deletion");
        Ok(())
    }

    /// Toggle an instance's visibility, a purely local concern
    pub fn set_model_visibility(&mut self, id: InstanceId, visible: bool) -> Result<(), StoreError> {
        let replica = self.models.get_mut(&id).ok_or(StoreError::UnknownModel(id))?;
        replica.visible = visible;
        let nodes = [replica.solid, replica.point_cloud];
        for gid in nodes.into_iter().flatten() {
            self.pool.set_visible(gid, visible);
        }
        Ok(())
    }

    /// Duplicate an instance under a locally-chosen id. The copy is flagged
    /// so the next batch announces it; the server adopts the id from the
    /// record.
    pub fn duplicate_model(
        &mut self,
        source: InstanceId,
        new_id: InstanceId,
    ) -> Result<(), StoreError> {
        let (asset, transform, editable, visible) = {
            let src = self.models.get(&source).ok_or(StoreError::UnknownModel(source))?;
            (src.asset.clone(), src.transform, src.editable, src.visible)
        };
        let mut replica = ModelReplica::new(new_id, asset.clone(), transform);
        replica.editable = editable;
        replica.visible = visible;
        self.models.insert(new_id, replica);
        let loaded = {
            // the source's template always exists already
            let (template, _) = self.templates.get_or_create(&asset);
            template.bind(new_id);
            if template.is_loaded() {
                true
            } else {
                template.enqueue_pending(new_id);
                false
            }
        };
        if loaded {
            self.attach_geometry(new_id);
        }
        self.dirty.mark_model(new_id);
        info!(source = %source, instance = %new_id, "model duplicated");
        Ok(())
    }

    /// Queue a marker creation for the next batch. The server assigns the
    /// real id; the request carries the root sentinel.
    pub fn request_new_marker(&mut self, position: Vec3, normal: Vec3, marker_type: u32) {
        self.dirty.queue_marker_action(MarkerStateRecord {
            marker_info: MarkerInfo {
                marker_instance_id: InstanceId::ROOT.0,
                position: position.to_array(),
                normal: normal.to_array(),
                marker_type,
                visibility: true,
            },
            action: MarkerAction::Create.to_wire(),
        });
    }

    /// Queue a marker deletion. The marker stays until the server confirms.
    pub fn request_delete_marker(&mut self, id: InstanceId) -> Result<(), StoreError> {
        let marker = self
            .markers
            .get_mut(&id)
            .ok_or(StoreError::UnknownMarker(id))?;
        marker.mark_delete = true;
        let info = marker.to_info();
        self.dirty.queue_marker_action(MarkerStateRecord {
            marker_info: info,
            action: MarkerAction::Delete.to_wire(),
        });
        Ok(())
    }

    /// Drop all room state on exit. Holds are released and queued outbound
    /// state is discarded.
    pub fn clear_room(&mut self) {
        self.guard.release();
        self.models.clear();
        self.users.clear();
        self.markers.clear();
        self.annotations.clear();
        self.measurements.clear();
        self.templates.clear();
        self.pool.clear();
        self.dirty.clear();
        info!("room state cleared");
    }

    pub fn model(&self, id: InstanceId) -> Option<&ModelReplica> {
        self.models.get(&id)
    }

    pub fn user(&self, id: InstanceId) -> Option<&UserReplica> {
        self.users.get(&id)
    }

    pub fn marker(&self, id: InstanceId) -> Option<&MarkerReplica> {
        self.markers.get(&id)
    }

    pub fn annotation(&self, id: InstanceId) -> Option<&AnnotationReplica> {
        self.annotations.get(&id)
    }

    pub fn measurement(&self, id: InstanceId) -> Option<&MeasurementReplica> {
        self.measurements.get(&id)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn pool(&self) -> &GeometryPool {
        &self.pool
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }
}

fn record_transform(rec: &MeshUpdate) -> Transform {
    Transform {
        position: Vec3::from_array(rec.position),
        rotation: Vec3::from_array(rec.rotation),
        scale: Vec3::from_array(rec.scale),
    }
}
