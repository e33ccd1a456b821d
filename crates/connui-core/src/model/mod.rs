// ── Domain model ──
//
// Plain data mirrored from the remote object graph. Wire mapping lives
// in `crate::convert`; nothing here knows about the bus.

pub mod agent;
pub mod service;
pub mod state;
pub mod technology;

pub use agent::{BrowserRequest, ErrorReport, InputRequest, PassphraseKind, PassphraseReply};
pub use service::{
    EthernetInfo, Ipv4Config, Ipv6Config, ProviderInfo, ProxyConfig, ServiceProperty,
    ServiceRecord,
};
pub use state::ConnState;
pub use technology::{TechnologyProperty, TechnologyRecord};

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

/// Manager properties callers are notified about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
)]
pub enum ManagerProperty {
    State,
    OfflineMode,
}

impl ManagerProperty {
    pub fn name(self) -> &'static str {
        self.into()
    }
}
