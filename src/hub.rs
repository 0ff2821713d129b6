//! Live fan-out of ingestion messages to connected observers.
//!
//! A single coordinator task owns the observer set. Producers and connection
//! handlers only send it commands, so register, unregister and broadcast are
//! applied strictly in the order they reach the coordinator. Delivery is
//! best-effort and at-most-once: there is no replay for late subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::LiveMessage;

pub type ObserverId = u64;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("observer disconnected")]
    Disconnected,
    #[error("observer is not keeping up")]
    Lagging,
}

/// A live connection that can receive messages.
///
/// `deliver` must not block; a failure removes the observer.
pub trait Observer: Send {
    fn deliver(&mut self, message: &LiveMessage) -> Result<(), DeliveryError>;
}

/// Observer backed by a bounded channel, drained by the connection's writer task.
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<LiveMessage>>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<Arc<LiveMessage>>) -> Self {
        Self { tx }
    }
}

impl Observer for ChannelObserver {
    fn deliver(&mut self, message: &LiveMessage) -> Result<(), DeliveryError> {
        self.tx
            .try_send(Arc::new(message.clone()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
            })
    }
}

enum HubCommand {
    Register(ObserverId, Box<dyn Observer>),
    Unregister(ObserverId),
    Broadcast(LiveMessage),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the hub coordinator.
#[derive(Clone)]
pub struct BroadcastHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl BroadcastHub {
    /// Spawns the coordinator. It stops once every handle has been dropped.
    pub fn start() -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(coordinate(rx));
        let hub = Self {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (hub, handle)
    }

    pub fn register(&self, observer: Box<dyn Observer>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(HubCommand::Register(id, observer));
        id
    }

    pub fn unregister(&self, id: ObserverId) {
        self.send(HubCommand::Unregister(id));
    }

    pub fn broadcast(&self, message: LiveMessage) {
        self.send(HubCommand::Broadcast(message));
    }

    /// Number of observers after every previously sent command has been applied.
    pub async fn observer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Count(tx));
        rx.await.unwrap_or(0)
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            warn!("Broadcast hub coordinator is gone; dropping command");
        }
    }
}

async fn coordinate(mut commands: mpsc::UnboundedReceiver<HubCommand>) {
    let mut observers: HashMap<ObserverId, Box<dyn Observer>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register(id, observer) => {
                observers.insert(id, observer);
                info!("Observer {} registered ({} connected)", id, observers.len());
            }
            HubCommand::Unregister(id) => {
                if observers.remove(&id).is_some() {
                    info!("Observer {} unregistered ({} connected)", id, observers.len());
                }
            }
            HubCommand::Broadcast(message) => {
                observers.retain(|id, observer| match observer.deliver(&message) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Dropping observer {}: {}", id, e);
                        false
                    }
                });
                debug!("Broadcast delivered to {} observers", observers.len());
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(observers.len());
            }
        }
    }

    info!("Broadcast hub stopped");
}
