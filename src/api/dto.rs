//! Data Transfer Objects
//!
//! Response types for the API endpoints.

use serde::Serialize;

use crate::websocket::BroadcastReport;

/// Response to a posted reading
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    /// Status: "ok"
    pub status: String,
    /// Timestamp carried by the broadcast envelope
    pub time: String,
    /// Connections the reading was pushed to
    pub sent: usize,
    /// Closed connections pruned during the broadcast
    pub pruned: usize,
}

impl From<BroadcastReport> for ReadingResponse {
    fn from(report: BroadcastReport) -> Self {
        Self {
            status: "ok".to_string(),
            time: report.time,
            sent: report.sent,
            pruned: report.pruned,
        }
    }
}

/// Registry size
#[derive(Debug, Serialize)]
pub struct ConnectionsResponse {
    pub connections: usize,
}

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Registered WebSocket connections, null if the hub is down
    pub connections: Option<usize>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
