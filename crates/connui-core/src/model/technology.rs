// ── Technology domain types ──

use secrecy::SecretString;
use serde::Serialize;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Technology properties that can change after creation and that callers
/// can be notified about. Declaration order is the notification index.
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
pub enum TechnologyProperty {
    Powered,
    Connected,
    Tethering,
    TetheringIdentifier,
    TetheringPassphrase,
}

impl TechnologyProperty {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Last known state of one technology (wifi, ethernet, bluetooth, ...).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TechnologyRecord {
    pub path: String,
    pub name: Option<String>,
    /// Technology type tag, e.g. `wifi`.
    pub kind: Option<String>,
    pub powered: bool,
    pub connected: bool,
    pub tethering: bool,
    pub tethering_identifier: Option<String>,
    #[serde(skip_serializing)]
    pub tethering_passphrase: Option<SecretString>,
}

impl TechnologyRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn property_names_match_the_wire() {
        let names: Vec<&str> = TechnologyProperty::iter().map(TechnologyProperty::name).collect();
        assert_eq!(
            names,
            [
                "Powered",
                "Connected",
                "Tethering",
                "TetheringIdentifier",
                "TetheringPassphrase"
            ]
        );
        assert_eq!(
            "Tethering".parse::<TechnologyProperty>().unwrap(),
            TechnologyProperty::Tethering
        );
        assert!("Name".parse::<TechnologyProperty>().is_err());
        assert_eq!(TechnologyProperty::COUNT, 5);
    }
}
