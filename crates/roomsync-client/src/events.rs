//! Session events broadcast to UI listeners

use roomsync_core::InstanceId;

/// Notable room changes, published on a broadcast channel so any number of
/// listeners (HUD, sidebar, audio cues) can react without polling the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CollaboratorJoined { id: InstanceId, username: String },
    CollaboratorLeft { id: InstanceId },
    MarkerAdded { id: InstanceId },
    MarkerRemoved { id: InstanceId },
    AnnotationAdded { id: InstanceId },
    MeasurementAdded { id: InstanceId },
    TemplateLoaded { key: String },
    TemplateLoadFailed { key: String },
}
