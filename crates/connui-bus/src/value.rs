// ── Message values ──
//
// Message items are `zvariant` values; bodies hold `OwnedValue`s. The
// helpers here build the shapes the connection manager API uses (`a{sv}`
// property dictionaries, string arrays, object paths) and look through
// variant wrapping on the way in.

use std::collections::HashMap;

use zvariant::{Array, ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::access::AccessError;

/// In-memory form of an `a{sv}` dictionary. Values are stored bare and
/// become variants when the map is turned into a [`Value`].
pub type PropertyMap = HashMap<String, Value<'static>>;

/// Strip every level of variant wrapping.
pub fn peel<'v, 'a>(value: &'v Value<'a>) -> &'v Value<'a> {
    let mut value = value;
    while let Value::Value(inner) = value {
        value = &**inner;
    }
    value
}

/// Wrap `value` in a variant.
pub fn variant(value: impl Into<Value<'static>>) -> Value<'static> {
    Value::Value(Box::new(value.into()))
}

/// Build an `as` array.
pub fn string_array<I, S>(items: I) -> Value<'static>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let items: Vec<String> = items.into_iter().map(Into::into).collect();
    Value::Array(Array::from(items))
}

/// Collect `(name, value)` pairs into a [`PropertyMap`].
pub fn property_map<I, K>(entries: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, Value<'static>)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Build an `a{sv}` dictionary from `(name, value)` pairs.
pub fn property_dict<I, K>(entries: I) -> Value<'static>
where
    I: IntoIterator<Item = (K, Value<'static>)>,
    K: Into<String>,
{
    Value::from(property_map(entries))
}

/// Validate `path` as a bus object path.
pub fn object_path(path: &str) -> Result<OwnedObjectPath, AccessError> {
    let path = ObjectPath::try_from(path.to_owned())?;
    Ok(OwnedObjectPath::from(path))
}

/// Take an owned copy of `value`.
pub fn to_owned_value(value: &Value<'_>) -> Result<OwnedValue, AccessError> {
    Ok(value.try_to_owned()?)
}

/// Turn built values into a message body.
pub fn into_body<I>(values: I) -> Result<Vec<OwnedValue>, AccessError>
where
    I: IntoIterator<Item = Value<'static>>,
{
    values
        .into_iter()
        .map(|v| OwnedValue::try_from(v).map_err(AccessError::from))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn peel_strips_nested_variants() {
        let v = variant(variant(true));
        assert_eq!(peel(&v), &Value::Bool(true));
        assert_eq!(peel(&Value::from(7u32)), &Value::U32(7));
    }

    #[test]
    fn invalid_object_path_is_rejected() {
        assert_eq!(
            object_path("/net/connman/service/wifi_1").unwrap().as_str(),
            "/net/connman/service/wifi_1"
        );
        assert!(matches!(
            object_path("net/connman"),
            Err(AccessError::Conversion(_))
        ));
    }

    #[test]
    fn body_items_keep_their_shape() {
        let body = into_body([Value::from("Powered"), variant(true)]).unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(&*body[0], &Value::from("Powered"));
        assert_eq!(peel(&body[1]), &Value::Bool(true));
    }
}
