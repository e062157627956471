//! Tracks local mutations awaiting the next outbound batch

use std::collections::BTreeSet;

use roomsync_core::{InstanceId, MarkerStateRecord};

/// Explicitly-flagged model instances and queued marker actions. The drift
/// scan in the store adds implicitly-moved instances at collection time.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    models: BTreeSet<InstanceId>,
    marker_actions: Vec<MarkerStateRecord>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a model for the next batch. Flagging twice sends it once.
    pub fn mark_model(&mut self, id: InstanceId) {
        self.models.insert(id);
    }

    pub fn forget_model(&mut self, id: InstanceId) {
        self.models.remove(&id);
    }

    pub fn queue_marker_action(&mut self, record: MarkerStateRecord) {
        self.marker_actions.push(record);
    }

    /// Drain flagged models; each flag is consumed by exactly one batch
    pub fn take_models(&mut self) -> BTreeSet<InstanceId> {
        std::mem::take(&mut self.models)
    }

    /// Drain queued marker actions in request order
    pub fn take_marker_actions(&mut self) -> Vec<MarkerStateRecord> {
        std::mem::take(&mut self.marker_actions)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.marker_actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.models.clear();
        self.marker_actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_core::MarkerInfo;

    fn marker_record(id: i64, action: u8) -> MarkerStateRecord {
        MarkerStateRecord {
            marker_info: MarkerInfo {
                marker_instance_id: id,
                position: [0.0; 3],
                normal: [0.0, 1.0, 0.0],
                marker_type: 0,
                visibility: true,
            },
            action,
        }
    }

    #[test]
    fn test_model_flag_consumed_once() {
        let mut dirty = DirtyTracker::new();
        dirty.mark_model(InstanceId(4));
        dirty.mark_model(InstanceId(4));
        let taken = dirty.take_models();
        assert_eq!(taken.len(), 1);
        assert!(dirty.take_models().is_empty());
    }

    #[test]
    fn test_marker_actions_preserve_order() {
        let mut dirty = DirtyTracker::new();
        dirty.queue_marker_action(marker_record(-1, 1));
        dirty.queue_marker_action(marker_record(7, 2));
        let taken = dirty.take_marker_actions();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].action, 1);
        assert_eq!(taken[1].marker_info.marker_instance_id, 7);
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_forget_model() {
        let mut dirty = DirtyTracker::new();
        dirty.mark_model(InstanceId(9));
        dirty.forget_model(InstanceId(9));
        assert!(dirty.is_empty());
    }
}
