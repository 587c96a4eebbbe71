//! HTTP DTOs for notification endpoints.

use serde::{Deserialize, Serialize};

use crate::ports::PresenceReader;

/// Response for the presence endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceResponse {
    /// Open connections, anonymous included.
    pub connections: usize,
    /// Distinct identified users with at least one connection.
    pub users: usize,
}

impl PresenceResponse {
    pub fn from_reader(reader: &dyn PresenceReader) -> Self {
        Self {
            connections: reader.connection_count(),
            users: reader.distinct_user_count(),
        }
    }
}
