//! Fixed-interval sync driver
//!
//! Owns the replica store behind a lock and runs the session loop: drain an
//! outbound batch on every tick, apply inbound deltas as they arrive, and
//! feed loader completions back into the store. Outbound sends are
//! fire-and-forget; a closed transport channel stops the loop quietly and
//! leaves the session disconnected.

use std::sync::Arc;
use std::time::Duration;

use roomsync_core::{InstanceId, OutboundBatch, RoomSnapshot, RoomUpdate, Vec3};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::events::SessionEvent;
use crate::ownership::OwnershipGuard;
use crate::store::ReplicaStore;
use crate::template::{LoadError, LoadRequest, LoadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connected,
}

/// Channels wiring the loop to the transport and the asset loader
pub struct SessionChannels {
    /// Periodic batches toward the server
    pub outbound_tx: mpsc::Sender<OutboundBatch>,
    /// Delta batches from the server
    pub inbound_rx: mpsc::Receiver<RoomUpdate>,
    /// Loader completions, echoing the request they answer
    pub load_rx: mpsc::Receiver<(LoadRequest, Result<LoadResult, LoadError>)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct AvatarPose {
    position: Vec3,
    /// Radians, as tracked by the camera rig
    rotation: Vec3,
}

pub struct RoomSession {
    config: SyncConfig,
    store: Arc<RwLock<ReplicaStore>>,
    guard: OwnershipGuard,
    phase: Arc<RwLock<SessionPhase>>,
    pose: Arc<RwLock<AvatarPose>>,
    load_tx: mpsc::UnboundedSender<LoadRequest>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl RoomSession {
    pub fn new(config: SyncConfig, load_tx: mpsc::UnboundedSender<LoadRequest>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let guard = OwnershipGuard::new();
        let store = ReplicaStore::new(config.dirty_epsilon, guard.clone(), event_tx.clone());
        Self {
            config,
            store: Arc::new(RwLock::new(store)),
            guard,
            phase: Arc::new(RwLock::new(SessionPhase::Disconnected)),
            pose: Arc::new(RwLock::new(AvatarPose::default())),
            load_tx,
            event_tx,
        }
    }

    pub fn store(&self) -> Arc<RwLock<ReplicaStore>> {
        self.store.clone()
    }

    pub fn guard(&self) -> OwnershipGuard {
        self.guard.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.read().await
    }

    pub async fn is_connected(&self) -> bool {
        *self.phase.read().await == SessionPhase::Connected
    }

    /// Record the local avatar pose for the next batch. Rotation in radians;
    /// conversion to wire degrees happens at send time.
    pub async fn set_avatar_pose(&self, position: Vec3, rotation: Vec3) {
        *self.pose.write().await = AvatarPose { position, rotation };
    }

    /// Enter a room: seed the store from the authoritative snapshot and
    /// start syncing. Template loads are dispatched to the loader.
    pub async fn join_room(&self, self_user: InstanceId, snapshot: &RoomSnapshot) {
        let loads = {
            let mut store = self.store.write().await;
            store.set_self_user(self_user);
            store.apply_snapshot(snapshot)
        };
        for request in loads {
            let _ = self.load_tx.send(request);
        }
        *self.phase.write().await = SessionPhase::Connected;
        info!(user = %self_user, "joined room");
    }

    /// Leave the room, dropping all replicated state
    pub async fn exit_room(&self) {
        *self.phase.write().await = SessionPhase::Disconnected;
        self.store.write().await.clear_room();
        info!("exited room");
    }

    /// The server published a new live reconstruction; reload its template
    /// if one is in use
    pub async fn notify_new_reconstruction(&self, asset_id: &str) {
        let request = self.store.write().await.handle_new_reconstruction(asset_id);
        if let Some(request) = request {
            let _ = self.load_tx.send(request);
        }
    }

    /// Drive the session until a transport channel closes
    pub async fn run(&self, channels: SessionChannels) -> anyhow::Result<()> {
        let SessionChannels {
            outbound_tx,
            mut inbound_rx,
            mut load_rx,
        } = channels;
        let mut ticker = interval(Duration::from_millis(self.config.update_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut loader_open = true;
        info!(
            interval_ms = self.config.update_interval_ms,
            "sync loop started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *self.phase.read().await != SessionPhase::Connected {
                        continue;
                    }
                    let pose = *self.pose.read().await;
                    let batch = self
                        .store
                        .write()
                        .await
                        .collect_outbound(pose.position, pose.rotation.radians_to_degrees());
                    if outbound_tx.send(batch).await.is_err() {
                        warn!("outbound channel closed, stopping sync loop");
                        *self.phase.write().await = SessionPhase::Disconnected;
                        break;
                    }
                }
                maybe = inbound_rx.recv() => {
                    match maybe {
                        Some(update) => {
                            if *self.phase.read().await != SessionPhase::Connected {
                                debug!("update received while disconnected, dropped");
                                continue;
                            }
                            let loads = self.store.write().await.apply_update(&update);
                            for request in loads {
                                let _ = self.load_tx.send(request);
                            }
                        }
                        None => {
                            warn!("inbound channel closed, stopping sync loop");
                            *self.phase.write().await = SessionPhase::Disconnected;
                            break;
                        }
                    }
                }
                maybe = load_rx.recv(), if loader_open => {
                    match maybe {
                        Some((request, result)) => {
                            self.store.write().await.complete_template_load(
                                &request.asset.key(),
                                request.iteration,
                                result,
                            );
                        }
                        None => {
                            debug!("loader channel closed");
                            loader_open = false;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_core::MeshUpdate;
    use tokio::time::timeout;

    fn session() -> (
        Arc<RoomSession>,
        mpsc::UnboundedReceiver<LoadRequest>,
    ) {
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        let config = SyncConfig {
            update_interval_ms: 5,
            ..SyncConfig::default()
        };
        (Arc::new(RoomSession::new(config, load_tx)), load_rx)
    }

    fn channels() -> (
        SessionChannels,
        mpsc::Receiver<OutboundBatch>,
        mpsc::Sender<RoomUpdate>,
        mpsc::Sender<(LoadRequest, Result<LoadResult, LoadError>)>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(1024);
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (load_result_tx, load_rx) = mpsc::channel(16);
        (
            SessionChannels {
                outbound_tx,
                inbound_rx,
                load_rx,
            },
            outbound_rx,
            inbound_tx,
            load_result_tx,
        )
    }

    fn mesh(id: i64) -> MeshUpdate {
        MeshUpdate {
            mesh_instance_id: id,
            parent_id: -1,
            asset_id: ["crane".to_string(), "v1".to_string()],
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            mark_delete: false,
            editable: true,
        }
    }

    #[tokio::test]
    async fn test_pose_batches_on_interval() {
        let (session, _load_rx) = session();
        let (channels, mut outbound_rx, _inbound_tx, _load_tx) = channels();
        session
            .join_room(InstanceId(1), &RoomSnapshot::default())
            .await;
        session
            .set_avatar_pose(Vec3::new(0.0, 1.7, 0.0), Vec3::zero())
            .await;
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run(channels).await })
        };

        let batch = timeout(Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("no batch within deadline")
            .expect("channel closed");
        assert!(batch.is_pose_only());
        assert_eq!(batch.user_position, [0.0, 1.7, 0.0]);
        runner.abort();
    }

    #[tokio::test]
    async fn test_no_batches_while_disconnected() {
        let (session, _load_rx) = session();
        let (channels, mut outbound_rx, _inbound_tx, _load_tx) = channels();
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run(channels).await })
        };

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(outbound_rx.try_recv().is_err());
        runner.abort();
    }

    #[tokio::test]
    async fn test_inbound_applied_and_loads_dispatched() {
        let (session, mut load_rx) = session();
        let (channels, _outbound_rx, inbound_tx, load_result_tx) = channels();
        session
            .join_room(InstanceId(1), &RoomSnapshot::default())
            .await;
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run(channels).await })
        };

        inbound_tx
            .send(RoomUpdate {
                mesh_updates: vec![mesh(7)],
                ..RoomUpdate::default()
            })
            .await
            .unwrap();

        let request = timeout(Duration::from_secs(1), load_rx.recv())
            .await
            .expect("no load request")
            .expect("channel closed");
        assert_eq!(request.asset.key(), "crane_v1");

        load_result_tx
            .send((
                request,
                Ok(LoadResult {
                    solid: Some(crate::geometry::GeometryData {
                        asset_key: "crane_v1".to_string(),
                        variant: crate::geometry::GeometryVariant::Solid,
                        source: "assets/crane_v1.glb".to_string(),
                        vertex_count: 32,
                    }),
                    point_cloud: None,
                    meta: crate::template::TemplateMeta::default(),
                }),
            ))
            .await
            .unwrap();

        // poll until the loop has fed the completion into the store
        let store = session.store();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            if store
                .read()
                .await
                .model(InstanceId(7))
                .map(|m| m.has_geometry())
                .unwrap_or(false)
            {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "geometry never attached");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        runner.abort();
    }

    #[tokio::test]
    async fn test_outbound_close_stops_loop() {
        let (session, _load_rx) = session();
        let (channels, outbound_rx, _inbound_tx, _load_tx) = channels();
        session
            .join_room(InstanceId(1), &RoomSnapshot::default())
            .await;
        drop(outbound_rx);
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run(channels).await })
        };

        let result = timeout(Duration::from_secs(1), runner)
            .await
            .expect("loop did not stop");
        assert!(result.unwrap().is_ok());
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_inbound_close_stops_loop() {
        let (session, _load_rx) = session();
        let (channels, _outbound_rx, inbound_tx, _load_tx) = channels();
        session
            .join_room(InstanceId(1), &RoomSnapshot::default())
            .await;
        drop(inbound_tx);
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run(channels).await })
        };

        let result = timeout(Duration::from_secs(1), runner)
            .await
            .expect("loop did not stop");
        assert!(result.unwrap().is_ok());
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_exit_room_clears_state() {
        let (session, _load_rx) = session();
        session
            .join_room(
                InstanceId(1),
                &RoomSnapshot {
                    mesh_instances: vec![mesh(3)],
                    ..RoomSnapshot::default()
                },
            )
            .await;
        assert!(session.is_connected().await);
        assert_eq!(session.store().read().await.model_count(), 1);

        session.exit_room().await;
        assert!(!session.is_connected().await);
        assert_eq!(session.store().read().await.model_count(), 0);
    }
}
