// ── Wire-to-domain conversions ──
//
// Applies property dictionary entries to the domain records in `model`,
// and encodes configuration sub-records back into dictionaries for
// `SetProperty`. Unknown property names are ignored; a known name with
// the wrong value type is an error and leaves the record untouched.

use connui_bus::{
    AccessError, Cursor, DictAppender, DictView, OwnedObjectPath, Value, ValueExt, peel,
};
use secrecy::SecretString;

use crate::model::{
    ConnState, EthernetInfo, Ipv4Config, Ipv6Config, ProviderInfo, ProxyConfig, ServiceProperty,
    ServiceRecord, TechnologyProperty, TechnologyRecord,
};

// ── Helpers ────────────────────────────────────────────────────────

fn optional_string(dict: DictView<'_>, key: &str) -> Result<Option<String>, AccessError> {
    dict.optional(key)
}

fn optional_list(dict: DictView<'_>, key: &str) -> Result<Vec<String>, AccessError> {
    match dict.get_array(key) {
        Ok(list) => Ok(list),
        Err(AccessError::NotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Read an object path, accepting a plain string as well.
pub(crate) fn object_path(value: &Value<'static>) -> Result<String, AccessError> {
    match peel(value) {
        Value::Str(path) => Ok(path.as_str().to_owned()),
        other => other
            .get::<OwnedObjectPath>()
            .map(|path| path.as_str().to_owned()),
    }
}

/// Read the object path under `cursor`.
pub(crate) fn path_arg(cursor: &Cursor<'_>) -> Result<String, AccessError> {
    cursor
        .current()
        .ok_or(AccessError::Missing { expected: "o" })
        .and_then(object_path)
}

/// Decode an `a(oa{sv})` list into `(path, properties)` pairs.
pub(crate) fn object_list(cursor: Cursor<'_>) -> Result<Vec<(String, DictView<'_>)>, AccessError> {
    let mut items = cursor.recurse_array()?;
    let mut objects = Vec::with_capacity(items.remaining());
    while items.current().is_some() {
        let entry = items.get_struct()?;
        let path = object_path(entry.field(0, "o")?)?;
        objects.push((path, entry.get_dict(1)?));
        items.advance();
    }
    Ok(objects)
}

/// Decode an `ao` list.
pub(crate) fn path_list(cursor: Cursor<'_>) -> Result<Vec<String>, AccessError> {
    let mut items = cursor.recurse_array()?;
    let mut paths = Vec::with_capacity(items.remaining());
    while let Some(item) = items.current() {
        paths.push(object_path(item)?);
        items.advance();
    }
    Ok(paths)
}

// ── Sub-record traits ──────────────────────────────────────────────

/// A record decoded from a nested property dictionary.
pub(crate) trait FromProperties: Sized + Default + PartialEq {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError>;

    /// Decode `value`, yielding `None` when none of the known fields is
    /// present.
    fn from_value(value: &Value<'static>) -> Result<Option<Self>, AccessError> {
        let record = Self::read(value.get_dict()?)?;
        Ok((record != Self::default()).then_some(record))
    }
}

/// A record that can be written back as a nested property dictionary.
pub(crate) trait ToProperties {
    fn write(&self, dict: &mut DictAppender);

    fn to_value(&self) -> Value<'static> {
        let mut dict = DictAppender::default();
        self.write(&mut dict);
        dict.into_value()
    }
}

impl FromProperties for Ipv4Config {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError> {
        Ok(Self {
            method: optional_string(dict, "Method")?,
            address: optional_string(dict, "Address")?,
            netmask: optional_string(dict, "Netmask")?,
            gateway: optional_string(dict, "Gateway")?,
        })
    }
}

impl ToProperties for Ipv4Config {
    fn write(&self, dict: &mut DictAppender) {
        dict.entry_optional("Method", self.method.clone())
            .entry_optional("Address", self.address.clone())
            .entry_optional("Netmask", self.netmask.clone())
            .entry_optional("Gateway", self.gateway.clone());
    }
}

impl FromProperties for Ipv6Config {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError> {
        let prefix_length = match dict.optional::<u8>("PrefixLength")? {
            Some(prefix) => Some(prefix),
            None => dict
                .optional::<u16>("Prefix")?
                .and_then(|p| u8::try_from(p).ok()),
        };
        Ok(Self {
            method: optional_string(dict, "Method")?,
            address: optional_string(dict, "Address")?,
            prefix_length,
            gateway: optional_string(dict, "Gateway")?,
            privacy: optional_string(dict, "Privacy")?,
        })
    }
}

impl ToProperties for Ipv6Config {
    fn write(&self, dict: &mut DictAppender) {
        dict.entry_optional("Method", self.method.clone())
            .entry_optional("Address", self.address.clone())
            .entry_optional("PrefixLength", self.prefix_length)
            .entry_optional("Gateway", self.gateway.clone())
            .entry_optional("Privacy", self.privacy.clone());
    }
}

impl FromProperties for ProxyConfig {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError> {
        Ok(Self {
            method: optional_string(dict, "Method")?,
            url: optional_string(dict, "URL")?,
            servers: optional_list(dict, "Servers")?,
            excludes: optional_list(dict, "Excludes")?,
        })
    }
}

impl ToProperties for ProxyConfig {
    fn write(&self, dict: &mut DictAppender) {
        dict.entry_optional("Method", self.method.clone())
            .entry_optional("URL", self.url.clone());
        if !self.servers.is_empty() {
            dict.entry_array::<String, _>("Servers", |a| {
                a.extend(self.servers.iter().cloned());
            });
        }
        if !self.excludes.is_empty() {
            dict.entry_array::<String, _>("Excludes", |a| {
                a.extend(self.excludes.iter().cloned());
            });
        }
    }
}

impl FromProperties for ProviderInfo {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError> {
        Ok(Self {
            host: optional_string(dict, "Host")?,
            domain: optional_string(dict, "Domain")?,
            name: optional_string(dict, "Name")?,
            kind: optional_string(dict, "Type")?,
        })
    }
}

impl FromProperties for EthernetInfo {
    fn read(dict: DictView<'_>) -> Result<Self, AccessError> {
        Ok(Self {
            method: optional_string(dict, "Method")?,
            interface: optional_string(dict, "Interface")?,
            address: optional_string(dict, "Address")?,
            mtu: dict.optional("MTU")?,
            speed: dict.optional("Speed")?,
            duplex: optional_string(dict, "Duplex")?,
        })
    }
}

// ── Record updates ─────────────────────────────────────────────────

/// Apply one property to a technology. Returns the property when it is
/// one callers get notified about.
pub(crate) fn apply_technology_property(
    record: &mut TechnologyRecord,
    name: &str,
    value: &Value<'static>,
) -> Result<Option<TechnologyProperty>, AccessError> {
    match name {
        "Name" => {
            record.name = Some(value.get()?);
            return Ok(None);
        }
        "Type" => {
            record.kind = Some(value.get()?);
            return Ok(None);
        }
        _ => {}
    }

    let Ok(property) = name.parse::<TechnologyProperty>() else {
        return Ok(None);
    };
    match property {
        TechnologyProperty::Powered => record.powered = value.get()?,
        TechnologyProperty::Connected => record.connected = value.get()?,
        TechnologyProperty::Tethering => record.tethering = value.get()?,
        TechnologyProperty::TetheringIdentifier => {
            record.tethering_identifier = Some(value.get()?);
        }
        TechnologyProperty::TetheringPassphrase => {
            record.tethering_passphrase = Some(SecretString::from(value.get::<String>()?));
        }
    }
    Ok(Some(property))
}

/// Apply one property to a service. Returns the property when it is one
/// callers get notified about.
pub(crate) fn apply_service_property(
    record: &mut ServiceRecord,
    name: &str,
    value: &Value<'static>,
) -> Result<Option<ServiceProperty>, AccessError> {
    match name {
        "Name" => {
            record.name = Some(value.get()?);
            return Ok(None);
        }
        "Type" => {
            record.kind = Some(value.get()?);
            return Ok(None);
        }
        "Security" => {
            record.security = value.get_array()?;
            return Ok(None);
        }
        "Immutable" => {
            record.immutable = value.get()?;
            return Ok(None);
        }
        _ => {}
    }

    let Ok(property) = name.parse::<ServiceProperty>() else {
        return Ok(None);
    };
    match property {
        ServiceProperty::State => {
            record.state = ConnState::from_wire(&value.get::<String>()?);
        }
        ServiceProperty::Error => {
            let error: String = value.get()?;
            record.error = (!error.is_empty()).then_some(error);
        }
        ServiceProperty::Strength => record.strength = value.get()?,
        ServiceProperty::Favorite => record.favorite = value.get()?,
        ServiceProperty::AutoConnect => record.autoconnect = value.get()?,
        ServiceProperty::Roaming => record.roaming = value.get()?,
        ServiceProperty::Nameservers => record.nameservers = value.get_array()?,
        ServiceProperty::NameserversConfig => record.nameservers_config = value.get_array()?,
        ServiceProperty::Timeservers => record.timeservers = value.get_array()?,
        ServiceProperty::TimeserversConfig => record.timeservers_config = value.get_array()?,
        ServiceProperty::Domains => record.domains = value.get_array()?,
        ServiceProperty::DomainsConfig => record.domains_config = value.get_array()?,
        ServiceProperty::Ipv4 => record.ipv4 = Ipv4Config::from_value(value)?,
        ServiceProperty::Ipv4Config => record.ipv4_config = Ipv4Config::from_value(value)?,
        ServiceProperty::Ipv6 => record.ipv6 = Ipv6Config::from_value(value)?,
        ServiceProperty::Ipv6Config => record.ipv6_config = Ipv6Config::from_value(value)?,
        ServiceProperty::Proxy => record.proxy = ProxyConfig::from_value(value)?,
        ServiceProperty::ProxyConfig => record.proxy_config = ProxyConfig::from_value(value)?,
        ServiceProperty::Provider => record.provider = ProviderInfo::from_value(value)?,
        ServiceProperty::Ethernet => {
            record.ethernet = Some(EthernetInfo::read(value.get_dict()?)?);
        }
    }
    Ok(Some(property))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use connui_bus::mock::object_array;
    use connui_bus::{PropertyMap, into_body, property_dict, string_array, variant};

    use super::*;

    #[test]
    fn technology_name_is_not_notifiable() {
        let mut record = TechnologyRecord::new("/net/connman/technology/wifi");
        let prop = apply_technology_property(&mut record, "Name", &Value::from("WiFi")).unwrap();
        assert_eq!(prop, None);
        assert_eq!(record.name.as_deref(), Some("WiFi"));

        let prop = apply_technology_property(
            &mut record,
            "Powered",
            &variant(true),
        )
        .unwrap();
        assert_eq!(prop, Some(TechnologyProperty::Powered));
        assert!(record.powered);
    }

    #[test]
    fn wrong_type_leaves_record_untouched() {
        let mut record = TechnologyRecord::new("/t");
        record.powered = true;
        assert!(apply_technology_property(&mut record, "Powered", &Value::from("yes")).is_err());
        assert!(record.powered);
    }

    #[test]
    fn empty_sub_dictionary_is_none_except_ethernet() {
        let mut record = ServiceRecord::new("/s");
        let empty = Value::from(PropertyMap::new());

        apply_service_property(&mut record, "IPv4", &empty).unwrap();
        assert_eq!(record.ipv4, None);

        apply_service_property(&mut record, "Ethernet", &empty).unwrap();
        assert_eq!(record.ethernet, Some(EthernetInfo::default()));
    }

    #[test]
    fn ipv6_prefix_accepts_either_key() {
        let with_byte = property_dict([
            ("Method", Value::from("manual")),
            ("PrefixLength", Value::U8(64)),
        ]);
        let with_u16 = property_dict([("Prefix", Value::U16(48))]);

        assert_eq!(
            Ipv6Config::from_value(&with_byte).unwrap().unwrap().prefix_length,
            Some(64)
        );
        assert_eq!(
            Ipv6Config::from_value(&with_u16).unwrap().unwrap().prefix_length,
            Some(48)
        );
    }

    #[test]
    fn proxy_config_round_trips_through_a_dictionary() {
        let proxy = ProxyConfig {
            method: Some("manual".into()),
            url: None,
            servers: vec!["proxy.lan:3128".into()],
            excludes: Vec::new(),
        };
        let decoded = ProxyConfig::from_value(&proxy.to_value()).unwrap();
        assert_eq!(decoded, Some(proxy));
    }

    #[test]
    fn object_list_reads_path_entries() {
        let body = into_body([object_array([
            (
                "/net/connman/service/a",
                connui_bus::property_map([("Strength", Value::U8(40))]),
            ),
            ("/net/connman/service/b", PropertyMap::new()),
        ])
        .unwrap()])
        .unwrap();
        let objects = object_list(Cursor::new(&body)).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].0, "/net/connman/service/a");
        assert_eq!(objects[0].1.get_basic::<u8>("Strength").unwrap(), 40);
        assert!(objects[1].1.is_empty());
    }

    #[test]
    fn object_list_accepts_string_paths() {
        let entries = vec![("/net/connman/service/c".to_owned(), PropertyMap::new())];
        let body = into_body([Value::from(entries)]).unwrap();
        let objects = object_list(Cursor::new(&body)).unwrap();
        assert_eq!(objects[0].0, "/net/connman/service/c");
    }

    #[test]
    fn tethering_passphrase_is_kept_secret() {
        use secrecy::ExposeSecret;

        let mut record = TechnologyRecord::new("/net/connman/technology/wifi");
        apply_technology_property(
            &mut record,
            "TetheringPassphrase",
            &Value::from("hotspot-pass"),
        )
        .unwrap();
        let secret = record.tethering_passphrase.as_ref().unwrap();
        assert_eq!(secret.expose_secret(), "hotspot-pass");
        assert!(!format!("{record:?}").contains("hotspot-pass"));
    }

    #[test]
    fn service_lists_and_state() {
        let mut record = ServiceRecord::new("/s");
        apply_service_property(
            &mut record,
            "Nameservers.Configuration",
            &string_array(["8.8.8.8", "1.1.1.1"]),
        )
        .unwrap();
        apply_service_property(&mut record, "State", &Value::from("ready")).unwrap();
        apply_service_property(&mut record, "Error", &Value::from("")).unwrap();

        assert_eq!(record.nameservers_config, ["8.8.8.8", "1.1.1.1"]);
        assert!(record.is_connected());
        assert_eq!(record.error, None);
    }
}
