//! Load-once geometry templates with pending clone queues
//!
//! A template is keyed by asset id + version. The first instance referencing
//! an asset triggers exactly one load; instances that arrive while the load
//! is in flight queue up and are cloned in arrival order once the data lands.
//! Live-version templates can be reloaded in place when the server publishes
//! a new reconstruction.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use roomsync_core::{AssetId, InstanceId};
use thiserror::Error;
use tracing::{debug, info};

use crate::geometry::GeometryData;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("asset {key} not found: {reason}")]
    NotFound { key: String, reason: String },
    #[error("failed to fetch asset {key}: {reason}")]
    Fetch { key: String, reason: String },
    #[error("failed to parse geometry for {key}: {reason}")]
    Parse { key: String, reason: String },
}

/// Request handed to the asset loader. `iteration` distinguishes reload
/// results from stale in-flight loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub asset: AssetId,
    pub iteration: u32,
}

/// Descriptive fields a loaded asset carries alongside its geometry
#[derive(Debug, Clone, Default)]
pub struct TemplateMeta {
    pub name: String,
    pub authors: Vec<String>,
    pub description: String,
}

/// What the loader delivers on success. At least one geometry variant is
/// expected; a point cloud without a solid mesh is valid for raw scans.
#[derive(Debug)]
pub struct LoadResult {
    pub solid: Option<GeometryData>,
    pub point_cloud: Option<GeometryData>,
    pub meta: TemplateMeta,
}

/// One shared geometry definition and its bookkeeping
#[derive(Debug)]
pub struct Template {
    pub asset: AssetId,
    pub solid: Option<Arc<GeometryData>>,
    pub point_cloud: Option<Arc<GeometryData>>,
    pub meta: TemplateMeta,
    /// Bumped on each reload request
    pub iteration: u32,
    /// Suffix counter for clone node names
    clone_count: u64,
    /// Instances waiting for the initial load, cloned in FIFO order
    pending: VecDeque<InstanceId>,
    /// Every live instance bound to this template, recloned on reload
    bound: BTreeSet<InstanceId>,
    pub loading: bool,
}

impl Template {
    fn new(asset: AssetId) -> Self {
        Self {
            asset,
            solid: None,
            point_cloud: None,
            meta: TemplateMeta::default(),
            iteration: 0,
            clone_count: 0,
            pending: VecDeque::new(),
            bound: BTreeSet::new(),
            loading: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.solid.is_some() || self.point_cloud.is_some()
    }

    pub fn enqueue_pending(&mut self, id: InstanceId) {
        self.pending.push_back(id);
    }

    pub fn bind(&mut self, id: InstanceId) {
        self.bound.insert(id);
    }

    pub fn unbind(&mut self, id: InstanceId) {
        self.bound.remove(&id);
        self.pending.retain(|p| *p != id);
    }

    pub fn bound_instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.bound.iter().copied()
    }

    pub fn has_bound(&self) -> bool {
        !self.bound.is_empty()
    }

    /// Next unique clone name suffix
    pub fn next_clone_index(&mut self) -> u64 {
        let idx = self.clone_count;
        self.clone_count += 1;
        idx
    }
}

/// Registry of templates keyed by [`AssetId::key`]
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<String, Template>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the template for an asset. Returns a load request
    /// exactly once per template lifetime, on creation.
    pub fn get_or_create(&mut self, asset: &AssetId) -> (&mut Template, Option<LoadRequest>) {
        let key = asset.key();
        if self.templates.contains_key(&key) {
            return (self.templates.get_mut(&key).unwrap(), None);
        }
        debug!(asset = %asset, "creating template");
        let mut template = Template::new(asset.clone());
        template.loading = true;
        let request = LoadRequest {
            asset: asset.clone(),
            iteration: 0,
        };
        self.templates.insert(key.clone(), template);
        (self.templates.get_mut(&key).unwrap(), Some(request))
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Template> {
        self.templates.get_mut(key)
    }

    /// Store loaded geometry and drain the pending clone queue. Returns
    /// `None` for unknown keys (stale results after a room exit) and for
    /// results carrying an iteration older than the current reload.
    pub fn complete_load(
        &mut self,
        key: &str,
        iteration: u32,
        result: LoadResult,
    ) -> Option<Vec<InstanceId>> {
        let template = self.templates.get_mut(key)?;
        if template.iteration != iteration {
            debug!(
                key,
                iteration,
                current = template.iteration,
                "stale load result ignored"
            );
            return None;
        }
        template.solid = result.solid.map(Arc::new);
        template.point_cloud = result.point_cloud.map(Arc::new);
        template.meta = result.meta;
        template.loading = false;
        let pending: Vec<InstanceId> = template.pending.drain(..).collect();
        info!(key, pending = pending.len(), "template loaded");
        Some(pending)
    }

    /// Mark a failed load. Pending instances stay queued in case the asset
    /// is re-requested. Returns false for unknown keys and for failures
    /// from an iteration a later reload already superseded.
    pub fn fail_load(&mut self, key: &str, iteration: u32) -> bool {
        let Some(template) = self.templates.get_mut(key) else {
            return false;
        };
        if template.iteration != iteration {
            debug!(
                key,
                iteration,
                current = template.iteration,
                "stale load failure ignored"
            );
            return false;
        }
        template.loading = false;
        true
    }

    /// Request a reload of an already-loaded template, bumping its iteration.
    /// Returns `None` if no such template exists or a load is in flight.
    pub fn request_reload(&mut self, key: &str) -> Option<LoadRequest> {
        let template = self.templates.get_mut(key)?;
        if template.loading {
            debug!(key, "reload skipped, load already in flight");
            return None;
        }
        template.iteration += 1;
        template.loading = true;
        info!(key, iteration = template.iteration, "requesting template reload");
        Some(LoadRequest {
            asset: template.asset.clone(),
            iteration: template.iteration,
        })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }
}
