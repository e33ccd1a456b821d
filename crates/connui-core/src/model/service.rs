// ── Service domain types ──
//
// One `ServiceRecord` per connectable network (a wifi SSID, a wired
// link, a VPN). Sub-records mirror the nested property dictionaries;
// the `*_config` variants hold what the user asked for, the plain ones
// what is currently active.

use serde::Serialize;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use super::state::ConnState;

/// Service properties that can change after creation. Declaration order
/// is the notification index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
    Serialize,
)]
pub enum ServiceProperty {
    State,
    Error,
    Strength,
    Favorite,
    AutoConnect,
    Roaming,
    Nameservers,
    #[strum(serialize = "Nameservers.Configuration")]
    NameserversConfig,
    Timeservers,
    #[strum(serialize = "Timeservers.Configuration")]
    TimeserversConfig,
    Domains,
    #[strum(serialize = "Domains.Configuration")]
    DomainsConfig,
    #[strum(serialize = "IPv4")]
    Ipv4,
    #[strum(serialize = "IPv4.Configuration")]
    Ipv4Config,
    #[strum(serialize = "IPv6")]
    Ipv6,
    #[strum(serialize = "IPv6.Configuration")]
    Ipv6Config,
    Proxy,
    #[strum(serialize = "Proxy.Configuration")]
    ProxyConfig,
    Provider,
    Ethernet,
}

impl ServiceProperty {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ipv4Config {
    pub method: Option<String>,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ipv6Config {
    pub method: Option<String>,
    pub address: Option<String>,
    pub prefix_length: Option<u8>,
    pub gateway: Option<String>,
    pub privacy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyConfig {
    pub method: Option<String>,
    pub url: Option<String>,
    pub servers: Vec<String>,
    pub excludes: Vec<String>,
}

/// VPN provider details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub host: Option<String>,
    pub domain: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EthernetInfo {
    pub method: Option<String>,
    pub interface: Option<String>,
    pub address: Option<String>,
    pub mtu: Option<u16>,
    pub speed: Option<u16>,
    pub duplex: Option<String>,
}

/// Last known state of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    pub path: String,
    pub state: ConnState,
    pub error: Option<String>,
    pub name: Option<String>,
    /// Service type tag, e.g. `wifi` or `ethernet`.
    pub kind: Option<String>,
    pub security: Vec<String>,
    /// Signal strength, 0-100.
    pub strength: u8,
    pub favorite: bool,
    pub immutable: bool,
    pub autoconnect: bool,
    pub roaming: bool,

    pub nameservers: Vec<String>,
    pub nameservers_config: Vec<String>,
    pub timeservers: Vec<String>,
    pub timeservers_config: Vec<String>,
    pub domains: Vec<String>,
    pub domains_config: Vec<String>,

    pub ipv4: Option<Ipv4Config>,
    pub ipv4_config: Option<Ipv4Config>,
    pub ipv6: Option<Ipv6Config>,
    pub ipv6_config: Option<Ipv6Config>,
    pub proxy: Option<ProxyConfig>,
    pub proxy_config: Option<ProxyConfig>,
    pub provider: Option<ProviderInfo>,
    pub ethernet: Option<EthernetInfo>,
}

impl ServiceRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn configuration_properties_use_dotted_names() {
        assert_eq!(
            ServiceProperty::NameserversConfig.name(),
            "Nameservers.Configuration"
        );
        assert_eq!(ServiceProperty::Ipv6.name(), "IPv6");
        assert_eq!(
            "IPv4.Configuration".parse::<ServiceProperty>().unwrap(),
            ServiceProperty::Ipv4Config
        );
        assert!("Security".parse::<ServiceProperty>().is_err());
        assert_eq!(ServiceProperty::COUNT, 20);
    }

    #[test]
    fn notification_index_follows_declaration_order() {
        assert!(ServiceProperty::State < ServiceProperty::Strength);
        assert!(ServiceProperty::Provider < ServiceProperty::Ethernet);
    }
}
