use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Connectivity state of the manager or of a single service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnState {
    /// Nothing has been received yet, or the component is not attached.
    #[default]
    Unknown,
    Offline,
    Idle,
    Ready,
    Online,
    Failure,
}

impl ConnState {
    /// Decode a state string as sent by the remote service. Anything not
    /// recognised (including transitional states) maps to `Offline`.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "idle" => Self::Idle,
            "ready" => Self::Ready,
            "online" => Self::Online,
            "failure" => Self::Failure,
            _ => Self::Offline,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Ready | Self::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strings_decode_to_offline() {
        assert_eq!(ConnState::from_wire("online"), ConnState::Online);
        assert_eq!(ConnState::from_wire("failure"), ConnState::Failure);
        assert_eq!(ConnState::from_wire("association"), ConnState::Offline);
        assert_eq!(ConnState::from_wire(""), ConnState::Offline);
    }

    #[test]
    fn connected_means_ready_or_online() {
        assert!(ConnState::Ready.is_connected());
        assert!(ConnState::Online.is_connected());
        assert!(!ConnState::Idle.is_connected());
        assert!(!ConnState::Unknown.is_connected());
        assert_eq!(ConnState::Online.to_string(), "online");
    }
}
