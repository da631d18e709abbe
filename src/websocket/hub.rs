//! Broadcast Hub
//!
//! A single actor task owns the [`Registry`]. Connection handlers and
//! producers talk to it through a cloneable [`HubHandle`], so registry
//! mutation and broadcast iteration never overlap even on a multi-threaded
//! runtime.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::messages::Envelope;
use super::registry::{ConnectionEntry, ConnectionId, EquipmentId, FanOut, Registry};
use super::transport::Transport;
use crate::clock::StampClock;

/// Configuration for the broadcast hub
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Clock used to stamp envelopes
    pub clock: StampClock,
    /// Tag recorded for connections that register without identifying themselves
    pub equipment_id: EquipmentId,
}

/// Result of one broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Timestamp carried by the envelope
    pub time: String,
    /// Connections the message was handed to
    pub sent: usize,
    /// Closed connections removed during the fan-out
    pub pruned: usize,
}

enum HubCommand {
    Register {
        id: ConnectionId,
        entry: ConnectionEntry,
    },
    Unregister {
        id: ConnectionId,
        reply: Option<oneshot::Sender<bool>>,
    },
    Broadcast {
        text: Arc<str>,
        reply: oneshot::Sender<FanOut>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Contains {
        id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Owns the registry and applies commands one at a time
struct HubActor {
    registry: Registry,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl HubActor {
    async fn run(mut self) {
        tracing::debug!("Broadcast hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register { id, entry } => {
                    tracing::info!(
                        connection_id = %id,
                        equipment_id = %entry.equipment,
                        "WebSocket registered"
                    );
                    self.registry.add(id, entry);
                }
                HubCommand::Unregister { id, reply } => {
                    let removed = self.registry.remove(&id).is_some();
                    if removed {
                        tracing::info!(connection_id = %id, "WebSocket unregistered");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(removed);
                    }
                }
                HubCommand::Broadcast { text, reply } => {
                    let outcome = self.registry.fan_out(&text);
                    let _ = reply.send(outcome);
                }
                HubCommand::Count { reply } => {
                    let _ = reply.send(self.registry.len());
                }
                HubCommand::Contains { id, reply } => {
                    let _ = reply.send(self.registry.contains(&id));
                }
                HubCommand::Shutdown => break,
            }
        }

        let remaining = self.registry.len();
        self.registry.clear();
        tracing::debug!(dropped_connections = remaining, "Broadcast hub stopped");
    }
}

/// Cloneable handle to a running hub
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    config: Arc<HubConfig>,
}

/// Constructor for hub instances
pub struct Hub;

impl Hub {
    /// Start a hub actor on the current tokio runtime
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = HubActor {
            registry: Registry::new(),
            commands: rx,
        };
        let task = tokio::spawn(actor.run());

        let handle = HubHandle {
            commands: tx,
            config: Arc::new(config),
        };
        (handle, task)
    }
}

impl HubHandle {
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Whether the actor is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Register a connection under the hub's default equipment tag
    pub fn register(
        &self,
        id: ConnectionId,
        transport: &Arc<dyn Transport>,
    ) -> Result<(), HubError> {
        self.register_as(id, self.config.equipment_id.clone(), transport)
    }

    /// Register a connection under an explicit equipment tag
    pub fn register_as(
        &self,
        id: ConnectionId,
        equipment: EquipmentId,
        transport: &Arc<dyn Transport>,
    ) -> Result<(), HubError> {
        let entry = ConnectionEntry::new(equipment, transport);
        self.send(HubCommand::Register { id, entry })
    }

    /// Remove a connection without waiting for the actor
    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister { id, reply: None })
    }

    /// Remove a connection and report whether it was registered
    pub async fn unregister_confirmed(&self, id: ConnectionId) -> Result<bool, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Unregister {
            id,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Push one reading to every open connection.
    ///
    /// The value is serialized once, before the registry is touched: if that
    /// fails nothing is sent and nothing is pruned.
    pub async fn broadcast<T: Serialize>(&self, value: &T) -> Result<BroadcastReport, HubError> {
        let time = self.config.clock.stamp();
        let text = match Envelope::new(time.as_str(), value).to_wire() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast envelope");
                return Err(HubError::Serialization(e));
            }
        };
        tracing::debug!(payload = %text, "Broadcasting reading");

        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Broadcast {
            text: Arc::from(text),
            reply,
        })?;
        let outcome = rx.await.map_err(|_| HubError::Unavailable)?;

        if outcome.pruned > 0 {
            tracing::debug!(pruned = outcome.pruned, "Pruned closed connections");
        }
        tracing::trace!(sent = outcome.sent, "Broadcast complete");

        Ok(BroadcastReport {
            time,
            sent: outcome.sent,
            pruned: outcome.pruned,
        })
    }

    /// Current registry size
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Count { reply })?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Whether a connection is currently registered
    pub async fn is_registered(&self, id: ConnectionId) -> Result<bool, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Contains { id, reply })?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Stop the actor and drop every registration
    pub fn shutdown(&self) {
        let _ = self.commands.send(HubCommand::Shutdown);
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .map_err(|_| HubError::Unavailable)
    }
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Failed to serialize reading: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broadcast hub is not running")]
    Unavailable,
}
