//! Connection Registry
//!
//! The live set of connections eligible to receive broadcasts. Entries are
//! keyed by a connection id assigned when the transport is accepted, so
//! removal is a direct lookup rather than a scan.
//!
//! The registry holds only weak references to transports; the socket tasks
//! own them. A transport that has been dropped counts as closed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use super::transport::Transport;

/// Stable identity of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque client/equipment tag attached to a registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EquipmentId(String);

impl EquipmentId {
    /// Tag used when the client does not identify itself
    pub const PLACEHOLDER: &'static str = "1";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn placeholder() -> Self {
        Self::new(Self::PLACEHOLDER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EquipmentId {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered connection
#[derive(Clone)]
pub struct ConnectionEntry {
    pub equipment: EquipmentId,
    transport: Weak<dyn Transport>,
}

impl ConnectionEntry {
    pub fn new(equipment: EquipmentId, transport: &Arc<dyn Transport>) -> Self {
        Self {
            equipment,
            transport: Arc::downgrade(transport),
        }
    }

    /// The transport, if it is still alive and open
    pub fn open_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.upgrade().filter(|t| t.is_open())
    }

    pub fn is_open(&self) -> bool {
        self.open_transport().is_some()
    }
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("equipment", &self.equipment)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Outcome of pushing one message to every entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub sent: usize,
    pub pruned: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ConnectionId, ConnectionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Re-adding a known connection replaces its entry.
    pub fn add(&mut self, id: ConnectionId, entry: ConnectionEntry) {
        if self.entries.insert(id, entry).is_some() {
            tracing::debug!(connection_id = %id, "Connection re-registered");
        }
    }

    /// Remove a connection. Removing an absent connection is a no-op.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Send `text` to every open connection, pruning the rest.
    ///
    /// A send that fails on a transport that reported open is pruned too.
    pub fn fan_out(&mut self, text: &Arc<str>) -> FanOut {
        let mut outcome = FanOut::default();

        self.entries.retain(|id, entry| {
            let delivered = entry
                .open_transport()
                .map(|transport| transport.send(Arc::clone(text)).is_ok())
                .unwrap_or(false);

            if delivered {
                outcome.sent += 1;
            } else {
                outcome.pruned += 1;
                tracing::debug!(connection_id = %id, "Pruned closed connection");
            }
            delivered
        });

        outcome
    }
}
