//! Exclusivity guard for locally-manipulated instances
//!
//! While the local user drags an instance, inbound transform writes for it
//! must be skipped or the manipulation would fight the server. At most one
//! instance is held at a time; holding a new one releases the previous hold.

use std::sync::{Arc, Mutex};

use roomsync_core::InstanceId;
use tracing::debug;

use crate::geometry::GeometryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Held {
    pub instance: InstanceId,
    pub geometry: GeometryId,
}

/// Shared hold state. Clones observe the same hold, so the store and the UI
/// layer can both consult it.
#[derive(Debug, Clone, Default)]
pub struct OwnershipGuard {
    inner: Arc<Mutex<Option<Held>>>,
}

impl OwnershipGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the hold for an instance, displacing any previous hold
    pub fn hold(&self, instance: InstanceId, geometry: GeometryId) {
        let mut slot = self.inner.lock().unwrap();
        if let Some(prev) = slot.take() {
            if prev.instance != instance {
                debug!(previous = %prev.instance, instance = %instance, "hold displaced");
            }
        }
        *slot = Some(Held { instance, geometry });
    }

    pub fn release(&self) -> Option<Held> {
        self.inner.lock().unwrap().take()
    }

    pub fn held(&self) -> Option<Held> {
        *self.inner.lock().unwrap()
    }

    pub fn held_geometry(&self) -> Option<GeometryId> {
        self.inner.lock().unwrap().map(|h| h.geometry)
    }

    pub fn is_held(&self, instance: InstanceId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .map(|h| h.instance == instance)
            .unwrap_or(false)
    }

    /// Release only if the hold belongs to this instance (used when the
    /// server deletes a held instance)
    pub fn release_instance(&self, instance: InstanceId) -> bool {
        let mut slot = self.inner.lock().unwrap();
        if slot.map(|h| h.instance == instance).unwrap_or(false) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Swap the held geometry handle in place when a template reload replaces
    /// the node under the user's hand
    pub fn transfer(&self, old: GeometryId, new: GeometryId) -> bool {
        let mut slot = self.inner.lock().unwrap();
        match slot.as_mut() {
            Some(held) if held.geometry == old => {
                held.geometry = new;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hold() {
        let guard = OwnershipGuard::new();
        guard.hold(InstanceId(1), GeometryId(10));
        assert!(guard.is_held(InstanceId(1)));
        guard.hold(InstanceId(2), GeometryId(20));
        assert!(!guard.is_held(InstanceId(1)));
        assert!(guard.is_held(InstanceId(2)));
    }

    #[test]
    fn test_clones_share_state() {
        let guard = OwnershipGuard::new();
        let other = guard.clone();
        guard.hold(InstanceId(3), GeometryId(30));
        assert!(other.is_held(InstanceId(3)));
        assert_eq!(other.held_geometry(), Some(GeometryId(30)));
        other.release();
        assert!(guard.held().is_none());
    }

    #[test]
    fn test_release_instance_only_matches() {
        let guard = OwnershipGuard::new();
        guard.hold(InstanceId(1), GeometryId(10));
        assert!(!guard.release_instance(InstanceId(2)));
        assert!(guard.is_held(InstanceId(1)));
        assert!(guard.release_instance(InstanceId(1)));
        assert!(guard.held().is_none());
    }

    #[test]
    fn test_transfer_swaps_geometry() {
        let guard = OwnershipGuard::new();
        guard.hold(InstanceId(1), GeometryId(10));
        assert!(guard.transfer(GeometryId(10), GeometryId(42)));
        assert_eq!(guard.held().unwrap().geometry, GeometryId(42));
        assert!(!guard.transfer(GeometryId(10), GeometryId(50)));
    }
}
