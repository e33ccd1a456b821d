// ── Agent request and reply types ──

use secrecy::SecretString;
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

/// The remote service reports a connection error for `service`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub service: String,
    pub error: String,
}

/// The remote service wants the user to log in through a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserRequest {
    pub service: String,
    pub url: String,
}

/// Kind of a previously used secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum PassphraseKind {
    Psk,
    Wpspin,
}

/// Credentials requested for `service`. Each flag says whether the
/// matching field was asked for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InputRequest {
    pub service: String,
    /// The network is hidden; its name is required.
    pub hidden: bool,
    pub identity: bool,
    pub passphrase: bool,
    /// WPS may be used instead of a passphrase.
    pub wps: bool,
    /// Username and password (e.g. VPN login).
    pub login: bool,
    #[serde(skip_serializing)]
    pub previous_passphrase: Option<(PassphraseKind, SecretString)>,
}

impl InputRequest {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Whether anything the user can actually answer was requested.
    pub fn is_answerable(&self) -> bool {
        self.hidden || self.identity || self.passphrase || self.login
    }
}

/// Answer to an [`InputRequest`] asking for a passphrase, a hidden
/// network name, or WPS.
#[derive(Debug, Default)]
pub struct PassphraseReply {
    /// Name of a hidden network.
    pub name: Option<String>,
    pub passphrase: Option<SecretString>,
    /// Use WPS; `wpspin` empty means push-button.
    pub wps: bool,
    pub wpspin: Option<String>,
}

impl PassphraseReply {
    pub fn passphrase(passphrase: SecretString) -> Self {
        Self {
            passphrase: Some(passphrase),
            ..Self::default()
        }
    }

    pub fn wps(pin: Option<String>) -> Self {
        Self {
            wps: true,
            wpspin: pin,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.passphrase.is_none() && !self.wps
    }
}
