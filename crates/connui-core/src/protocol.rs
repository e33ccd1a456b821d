// ── Wire names ──
//
// Bus names, interfaces, members and error names of the connection
// manager API. These must match the remote side exactly.

pub const SERVICE: &str = "net.connman";

pub const MANAGER_INTERFACE: &str = "net.connman.Manager";
pub const TECHNOLOGY_INTERFACE: &str = "net.connman.Technology";
pub const SERVICE_INTERFACE: &str = "net.connman.Service";
pub const AGENT_INTERFACE: &str = "net.connman.Agent";

pub const MANAGER_PATH: &str = "/";
pub const AGENT_PATH: &str = "/net/connman/agent/connmanui";

/// Technology type that supports scanning.
pub const WIFI: &str = "wifi";

pub const ERROR_CANCELED: &str = "net.connman.Error.Canceled";

pub const AGENT_ERROR_RETRY: &str = "net.connman.Agent.Error.Retry";
pub const AGENT_ERROR_CANCELED: &str = "net.connman.Agent.Error.Canceled";
pub const AGENT_ERROR_LAUNCH_BROWSER: &str = "net.connman.Agent.Error.LaunchBrowser";

pub const DBUS_SERVICE: &str = "org.freedesktop.DBus";
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";
pub const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
pub const DBUS_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
pub const DBUS_NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";

pub mod member {
    pub const GET_PROPERTIES: &str = "GetProperties";
    pub const SET_PROPERTY: &str = "SetProperty";
    pub const GET_TECHNOLOGIES: &str = "GetTechnologies";
    pub const GET_SERVICES: &str = "GetServices";
    pub const REGISTER_AGENT: &str = "RegisterAgent";
    pub const UNREGISTER_AGENT: &str = "UnregisterAgent";
    pub const SCAN: &str = "Scan";
    pub const CONNECT: &str = "Connect";
    pub const DISCONNECT: &str = "Disconnect";
    pub const REMOVE: &str = "Remove";

    pub const PROPERTY_CHANGED: &str = "PropertyChanged";
    pub const TECHNOLOGY_ADDED: &str = "TechnologyAdded";
    pub const TECHNOLOGY_REMOVED: &str = "TechnologyRemoved";
    pub const SERVICES_CHANGED: &str = "ServicesChanged";
    pub const NAME_OWNER_CHANGED: &str = "NameOwnerChanged";
    pub const GET_NAME_OWNER: &str = "GetNameOwner";

    pub const RELEASE: &str = "Release";
    pub const REPORT_ERROR: &str = "ReportError";
    pub const REQUEST_BROWSER: &str = "RequestBrowser";
    pub const REQUEST_INPUT: &str = "RequestInput";
    pub const CANCEL: &str = "Cancel";
}
