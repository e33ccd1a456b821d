//! Typed writers, the mirror image of [`access`](crate::access).
//!
//! Containers are filled through producer closures so that a dictionary
//! or array is always closed off in one piece.

use zvariant::{Array, Value};

use crate::access::Basic;
use crate::value::{PropertyMap, variant};

/// Appends values to a message body or container.
#[derive(Debug)]
pub struct Appender<'a> {
    out: &'a mut Vec<Value<'static>>,
}

impl<'a> Appender<'a> {
    pub fn new(out: &'a mut Vec<Value<'static>>) -> Self {
        Self { out }
    }

    fn push(&mut self, key: Option<&str>, value: Value<'static>) {
        match key {
            Some(key) => {
                self.out.push(Value::from(key.to_owned()));
                self.out.push(variant(value));
            }
            None => self.out.push(value),
        }
    }

    pub fn append_basic<T: Basic>(&mut self, value: T) -> &mut Self {
        self.push(None, value.into_value());
        self
    }

    /// Append a `name, variant(value)` pair, the argument shape of
    /// `SetProperty`.
    pub fn append_keyed<T: Basic>(&mut self, key: &str, value: T) -> &mut Self {
        self.push(Some(key), value.into_value());
        self
    }

    /// Append a `name, variant(value)` pair for an already built value.
    pub fn append_keyed_value(&mut self, key: &str, value: Value<'static>) -> &mut Self {
        self.push(Some(key), value);
        self
    }

    /// Append an array filled by `produce`. With a key the array goes out
    /// as `key, variant(array)`.
    pub fn append_array<T, F>(&mut self, key: Option<&str>, produce: F) -> &mut Self
    where
        T: Basic,
        F: FnOnce(&mut ArrayAppender<T>),
    {
        let mut array = ArrayAppender::new();
        produce(&mut array);
        self.push(key, array.finish());
        self
    }

    pub fn append_fixed_array(&mut self, key: Option<&str>, bytes: &[u8]) -> &mut Self {
        self.push(key, fixed_array(bytes));
        self
    }

    /// Append an `a{sv}` dictionary filled by `produce`.
    pub fn append_dict<F>(&mut self, key: Option<&str>, produce: F) -> &mut Self
    where
        F: FnOnce(&mut DictAppender),
    {
        let mut dict = DictAppender::default();
        produce(&mut dict);
        self.push(key, dict.into_value());
        self
    }
}

fn fixed_array(bytes: &[u8]) -> Value<'static> {
    Value::Array(Array::from(bytes.to_vec()))
}

/// Collects the elements of a homogeneous array.
#[derive(Debug)]
pub struct ArrayAppender<T> {
    items: Vec<T>,
}

impl<T: Basic> ArrayAppender<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, value: T) -> &mut Self {
        self.items.push(value);
        self
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) -> &mut Self {
        self.items.extend(values);
        self
    }

    fn finish(self) -> Value<'static> {
        Value::Array(Array::from(self.items))
    }
}

/// Collects the entries of an `a{sv}` dictionary. Values are wrapped in
/// variants when the dictionary is finished.
#[derive(Debug, Default)]
pub struct DictAppender {
    entries: PropertyMap,
}

impl DictAppender {
    fn insert(&mut self, key: &str, value: Value<'static>) {
        self.entries.insert(key.to_owned(), value);
    }

    pub fn entry_basic<T: Basic>(&mut self, key: &str, value: T) -> &mut Self {
        self.insert(key, value.into_value());
        self
    }

    /// Add an entry only when a value is present.
    pub fn entry_optional<T: Basic>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value.into_value());
        }
        self
    }

    pub fn entry_array<T, F>(&mut self, key: &str, produce: F) -> &mut Self
    where
        T: Basic,
        F: FnOnce(&mut ArrayAppender<T>),
    {
        let mut array = ArrayAppender::new();
        produce(&mut array);
        self.insert(key, array.finish());
        self
    }

    pub fn entry_fixed_array(&mut self, key: &str, bytes: &[u8]) -> &mut Self {
        self.insert(key, fixed_array(bytes));
        self
    }

    pub fn entry_dict<F>(&mut self, key: &str, produce: F) -> &mut Self
    where
        F: FnOnce(&mut DictAppender),
    {
        let mut dict = DictAppender::default();
        produce(&mut dict);
        self.insert(key, dict.into_value());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the appender and return the finished dictionary.
    pub fn into_value(self) -> Value<'static> {
        Value::from(self.entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::access::Cursor;
    use crate::value::into_body;

    #[test]
    fn keyed_basic_is_name_then_variant() {
        let mut body = Vec::new();
        Appender::new(&mut body).append_keyed("Powered", true);
        assert_eq!(
            body,
            vec![
                Value::from("Powered"),
                Value::Value(Box::new(Value::Bool(true)))
            ]
        );
    }

    #[test]
    fn keyed_dict_reads_back_through_a_variant() {
        let mut values = Vec::new();
        Appender::new(&mut values).append_dict(Some("IPv4.Configuration"), |d| {
            d.entry_basic("Method", String::from("manual"))
                .entry_basic("Address", String::from("10.0.0.2"))
                .entry_optional::<String>("Gateway", None);
        });
        let body = into_body(values).unwrap();

        let mut cursor = Cursor::new(&body);
        assert_eq!(cursor.get_basic::<String>().unwrap(), "IPv4.Configuration");
        cursor.advance();
        let dict = cursor.get_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get_basic::<String>("Address").unwrap(), "10.0.0.2");
    }

    #[test]
    fn empty_array_keeps_element_type() {
        let mut body = Vec::new();
        Appender::new(&mut body).append_array::<String, _>(None, |_| {});
        let Value::Array(array) = &body[0] else {
            panic!("expected an array, got {:?}", body[0]);
        };
        assert!(array.inner().is_empty());
        assert_eq!(array.element_signature().to_string(), "s");
    }

    #[test]
    fn nested_dict_and_fixed_array_entries() {
        let mut dict = DictAppender::default();
        dict.entry_fixed_array("SSID", b"home")
            .entry_dict("Inner", |d| {
                d.entry_basic("PrefixLength", 64u8);
            })
            .entry_array::<String, _>("Servers", |a| {
                a.extend(["a".to_owned(), "b".to_owned()]);
            });
        let body = into_body([dict.into_value()]).unwrap();
        let view = Cursor::new(&body).get_dict().unwrap();
        assert_eq!(view.get_fixed_array("SSID").unwrap(), b"home");
        assert_eq!(
            view.get_dict("Inner")
                .unwrap()
                .get_basic::<u8>("PrefixLength")
                .unwrap(),
            64
        );
        assert_eq!(view.get_array::<String>("Servers").unwrap(), ["a", "b"]);
    }
}
