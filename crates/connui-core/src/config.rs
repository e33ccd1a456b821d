// ── Runtime session configuration ──
//
// Where to find the remote service and how to behave on refresh.
// Built by the embedding application (usually via `connui-config`) and
// handed to `Session::new`; core never reads config files.

use crate::protocol;

/// Configuration for one [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Well-known bus name of the connection manager.
    pub service_name: String,
    /// Object path of the manager object.
    pub manager_path: String,
    /// Object path the agent is exported at.
    pub agent_path: String,
    /// Whether a service refresh may trigger a wifi scan.
    pub scan_on_refresh: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: protocol::SERVICE.into(),
            manager_path: protocol::MANAGER_PATH.into(),
            agent_path: protocol::AGENT_PATH.into(),
            scan_on_refresh: true,
        }
    }
}
