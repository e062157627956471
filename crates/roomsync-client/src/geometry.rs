//! Per-instance geometry handles backed by shared template data
//!
//! The pool stands in for the rendering scene graph: each node carries a
//! cheap reference to immutable template geometry plus its own transform and
//! parent link. Cloning a template for a new instance never copies vertex
//! data; every clone holds the same `Arc<GeometryData>`.

use std::collections::HashMap;
use std::sync::Arc;

use roomsync_core::{Transform, Vec3};
use tracing::warn;

/// Handle for one node in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

/// Whether geometry renders as a solid surface or a point cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryVariant {
    Solid,
    PointCloud,
}

/// Immutable geometry payload produced by a template load. Shared across all
/// clones of the template.
#[derive(Debug)]
pub struct GeometryData {
    /// Template cache key this data belongs to
    pub asset_key: String,
    pub variant: GeometryVariant,
    /// Source the loader fetched from (path or URL), kept for diagnostics
    pub source: String,
    pub vertex_count: usize,
}

/// One instance's view of shared geometry: reference to the data plus the
/// node's own transform and hierarchy link. Rotation is stored in radians,
/// matching what a renderer consumes.
#[derive(Debug)]
pub struct GeometryNode {
    pub name: String,
    pub data: Arc<GeometryData>,
    pub position: Vec3,
    /// Radians
    pub rotation: Vec3,
    pub scale: Vec3,
    pub parent: Option<GeometryId>,
    pub visible: bool,
    pub pickable: bool,
}

/// Flat node storage with parent links, owned by the replica store
#[derive(Debug, Default)]
pub struct GeometryPool {
    nodes: HashMap<GeometryId, GeometryNode>,
    next_id: u64,
}

impl GeometryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node referencing shared data. The caller sets transform and
    /// parent afterwards.
    pub fn insert(&mut self, name: impl Into<String>, data: Arc<GeometryData>) -> GeometryId {
        let id = GeometryId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            GeometryNode {
                name: name.into(),
                data,
                position: Vec3::zero(),
                rotation: Vec3::zero(),
                scale: Vec3::one(),
                parent: None,
                visible: true,
                pickable: false,
            },
        );
        id
    }

    /// Remove a node. Idempotent; children of a disposed node fall back to
    /// the root until the hierarchy is rewired.
    pub fn dispose(&mut self, id: GeometryId) -> bool {
        if self.nodes.remove(&id).is_none() {
            return false;
        }
        for node in self.nodes.values_mut() {
            if node.parent == Some(id) {
                node.parent = None;
            }
        }
        true
    }

    pub fn contains(&self, id: GeometryId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: GeometryId) -> Option<&GeometryNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: GeometryId) -> Option<&mut GeometryNode> {
        self.nodes.get_mut(&id)
    }

    pub fn set_parent(&mut self, id: GeometryId, parent: Option<GeometryId>) {
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                warn!(node = id.0, parent = p.0, "parent node missing, attaching to root");
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.parent = None;
                }
                return;
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
    }

    /// Apply a degree-unit transform to a node, converting rotation to
    /// radians at this boundary
    pub fn apply_transform(&mut self, id: GeometryId, transform: &Transform) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = transform.position;
            node.rotation = transform.rotation_radians();
            node.scale = transform.scale;
        }
    }

    /// Read a node's transform back in wire units (degrees)
    pub fn read_transform(&self, id: GeometryId) -> Option<Transform> {
        self.nodes.get(&id).map(|node| Transform {
            position: node.position,
            rotation: node.rotation.radians_to_degrees(),
            scale: node.scale,
        })
    }

    /// Translation composed up the parent chain. The store keeps the
    /// hierarchy acyclic; the depth cap guards against corrupted links.
    pub fn world_position(&self, id: GeometryId) -> Option<Vec3> {
        let mut current = self.nodes.get(&id)?;
        let mut position = current.position;
        let mut depth = 0;
        while let Some(parent_id) = current.parent {
            let Some(parent) = self.nodes.get(&parent_id) else {
                break;
            };
            position = position + parent.position;
            current = parent;
            depth += 1;
            if depth > 256 {
                warn!(node = id.0, "parent chain too deep, truncating walk");
                break;
            }
        }
        Some(position)
    }

    pub fn set_visible(&mut self, id: GeometryId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    pub fn set_pickable(&mut self, id: GeometryId, pickable: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.pickable = pickable;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
