//! Bounded work queue for the best-effort steps that follow a stored point.
//!
//! Submitting never blocks the ingesting caller. A full queue drops the job and the
//! caller reports the degradation. On shutdown the workers finish whatever is queued
//! once every `SideEffectQueue` handle is gone.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::detector::{self, history_window};
use super::geofence::GeofenceEvaluator;
use crate::cache::LocationCache;
use crate::db::Store;
use crate::error::IngestError;
use crate::hub::BroadcastHub;
use crate::models::{GpsPoint, LiveMessage, PointUpdate};

#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Behavior and geofence analysis, persisting and broadcasting any events.
    AnalyzePoint(GpsPoint),
    /// Live point-update broadcast.
    PublishPoint(GpsPoint),
    /// Cache write path: refresh current location, invalidate history.
    RefreshCache(GpsPoint),
}

impl SideEffect {
    fn name(&self) -> &'static str {
        match self {
            SideEffect::AnalyzePoint(_) => "analyze_point",
            SideEffect::PublishPoint(_) => "publish_point",
            SideEffect::RefreshCache(_) => "refresh_cache",
        }
    }
}

/// Everything a worker needs to run a side effect.
pub struct SideEffectContext {
    pub store: Arc<dyn Store>,
    pub cache: LocationCache,
    pub hub: BroadcastHub,
    pub geofences: Arc<GeofenceEvaluator>,
    pub history_limit: i64,
}

impl SideEffectContext {
    pub async fn run(&self, effect: SideEffect) {
        let name = effect.name();
        match effect {
            SideEffect::AnalyzePoint(point) => match self.analyze(&point).await {
                Ok(0) => {}
                Ok(n) => debug!("Point {} produced {} driver events", point.id, n),
                Err(e) => error!("Side effect {} failed for point {}: {}", name, point.id, e),
            },
            SideEffect::PublishPoint(point) => {
                self.hub
                    .broadcast(LiveMessage::PointUpdate(PointUpdate::from(&point)));
            }
            SideEffect::RefreshCache(point) => self.cache.point_ingested(&point).await,
        }
    }

    async fn analyze(&self, point: &GpsPoint) -> Result<usize, IngestError> {
        let since = point.captured_at - history_window();
        let history = match self
            .store
            .recent_points(point.driver_id, since, point.captured_at, self.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!("No behavior history for driver {}: {}", point.driver_id, e);
                Vec::new()
            }
        };

        let mut events = detector::detect(point, &history);
        let membership = match self.geofences.transitions(point).await {
            Ok((mut fence_events, membership)) => {
                events.append(&mut fence_events);
                Some(membership)
            }
            Err(e) => {
                warn!("Geofence evaluation skipped for point {}: {}", point.id, e);
                None
            }
        };

        if !events.is_empty() {
            self.store.insert_events(&events).await?;
        }
        // Only a stored transition moves the vehicle's membership forward.
        if let Some(membership) = membership {
            self.geofences.commit(membership);
        }
        if events.is_empty() {
            return Ok(0);
        }

        for event in &events {
            info!(
                "{} ({}) for driver {} on vehicle {}",
                event.event_type, event.severity, event.driver_id, event.vehicle_id
            );
            self.hub.broadcast(LiveMessage::BehaviorEvent(event.clone()));
        }
        Ok(events.len())
    }
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::Sender<SideEffect>,
}

impl SideEffectQueue {
    /// Returns false when the job was dropped.
    pub fn submit(&self, effect: SideEffect) -> bool {
        match self.tx.try_send(effect) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(effect)) => {
                warn!("Side-effect queue full, dropping {}", effect.name());
                false
            }
            Err(mpsc::error::TrySendError::Closed(effect)) => {
                warn!("Side-effect queue closed, dropping {}", effect.name());
                false
            }
        }
    }
}

pub struct SideEffectWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl SideEffectWorkers {
    /// Waits for queued jobs to finish. Returns false if `timeout` elapsed first.
    pub async fn drain(self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, join_all(self.handles)).await {
            Ok(_) => true,
            Err(_) => {
                warn!("Side-effect workers did not drain within {:?}", timeout);
                false
            }
        }
    }
}

pub fn start(
    context: Arc<SideEffectContext>,
    workers: usize,
    capacity: usize,
) -> (SideEffectQueue, SideEffectWorkers) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let handles = (0..workers.max(1))
        .map(|worker| {
            let rx = rx.clone();
            let context = context.clone();
            tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    match next {
                        Some(effect) => context.run(effect).await,
                        None => break,
                    }
                }
                debug!("Side-effect worker {} stopped", worker);
            })
        })
        .collect();

    (SideEffectQueue { tx }, SideEffectWorkers { handles })
}
