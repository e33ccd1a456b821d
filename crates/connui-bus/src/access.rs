//! Typed readers over message values.
//!
//! A [`Cursor`] walks a positional sequence (a message body, the fields
//! of a struct, the items of an array). Each read names the destination
//! type explicitly and fails with [`AccessError::TypeMismatch`] instead
//! of guessing; a failed read never moves the cursor.
//!
//! Dictionaries are read through [`DictView`], where every keyed lookup
//! is a linear scan from the first entry that stops at the first match.

use std::ops::ControlFlow;

use thiserror::Error;
use zvariant::{Dict, OwnedObjectPath, OwnedValue, Type, Value};

use crate::value::peel;

// ── Errors ──────────────────────────────────────────────────────────

/// Failure to read a value as the requested type. Types are named by
/// their bus signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("expected {expected}, but no more items")]
    Missing { expected: &'static str },

    #[error("no entry named '{key}'")]
    NotFound { key: String },

    #[error("value conversion failed: {0}")]
    Conversion(String),
}

impl From<zvariant::Error> for AccessError {
    fn from(err: zvariant::Error) -> Self {
        Self::Conversion(err.to_string())
    }
}

fn mismatch(expected: &'static str, found: &Value<'_>) -> AccessError {
    AccessError::TypeMismatch {
        expected,
        found: found.value_signature().to_string(),
    }
}

const ARRAY: &str = "a";
const DICT: &str = "a{}";
const STRUCT: &str = "()";
const VARIANT: &str = "v";

// ── Basic types ─────────────────────────────────────────────────────

/// A scalar or string type that can be read out of (and written into)
/// a [`Value`] without any container traversal.
pub trait Basic: Type + Into<Value<'static>> + Sized {
    /// Bus signature of the type.
    const SIGNATURE: &'static str;

    fn from_value(value: &Value<'_>) -> Option<Self>;

    fn into_value(self) -> Value<'static> {
        self.into()
    }
}

macro_rules! basic {
    ($ty:ty, $variant:ident, $sig:literal) => {
        impl Basic for $ty {
            const SIGNATURE: &'static str = $sig;

            fn from_value(value: &Value<'_>) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

basic!(bool, Bool, "b");
basic!(u8, U8, "y");
basic!(i16, I16, "n");
basic!(u16, U16, "q");
basic!(i32, I32, "i");
basic!(u32, U32, "u");
basic!(i64, I64, "x");
basic!(u64, U64, "t");
basic!(f64, F64, "d");

impl Basic for String {
    const SIGNATURE: &'static str = "s";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.as_str().to_owned()),
            _ => None,
        }
    }
}

impl Basic for OwnedObjectPath {
    const SIGNATURE: &'static str = "o";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::ObjectPath(path) => Some(OwnedObjectPath::from(path.clone())),
            _ => None,
        }
    }
}

fn read_basic<T: Basic>(value: &Value<'_>) -> Result<T, AccessError> {
    T::from_value(value).ok_or_else(|| mismatch(<T as Basic>::SIGNATURE, value))
}

fn read_basic_variant<T: Basic>(value: &Value<'_>) -> Result<T, AccessError> {
    match value {
        Value::Value(inner) => read_basic(inner),
        other => Err(mismatch(VARIANT, other)),
    }
}

fn read_array<T: Basic>(value: &Value<'_>) -> Result<Vec<T>, AccessError> {
    match peel(value) {
        Value::Array(array) => array.inner().iter().map(|v| read_basic(peel(v))).collect(),
        other => Err(mismatch(ARRAY, other)),
    }
}

fn read_fixed_array(value: &Value<'_>) -> Result<Vec<u8>, AccessError> {
    let Value::Array(array) = peel(value) else {
        return Err(mismatch(ARRAY, value));
    };
    let element = array.element_signature().to_string();
    if element != <u8 as Basic>::SIGNATURE {
        return Err(AccessError::TypeMismatch {
            expected: <u8 as Basic>::SIGNATURE,
            found: element,
        });
    }
    array.inner().iter().map(read_basic::<u8>).collect()
}

fn read_dict<'a>(value: &'a Value<'static>) -> Result<DictView<'a>, AccessError> {
    match peel(value) {
        Value::Dict(dict) => Ok(DictView { dict }),
        other => Err(mismatch(DICT, other)),
    }
}

fn read_struct<'a>(value: &'a Value<'static>) -> Result<StructView<'a>, AccessError> {
    match peel(value) {
        Value::Structure(structure) => Ok(StructView {
            fields: structure.fields(),
        }),
        other => Err(mismatch(STRUCT, other)),
    }
}

// ── Direct value reads ──────────────────────────────────────────────

/// Typed reads on a single value. Every read looks through variant
/// wrapping first.
pub trait ValueExt {
    fn get<T: Basic>(&self) -> Result<T, AccessError>;

    fn get_array<T: Basic>(&self) -> Result<Vec<T>, AccessError>;

    fn get_fixed_array(&self) -> Result<Vec<u8>, AccessError>;

    fn get_dict(&self) -> Result<DictView<'_>, AccessError>;

    fn get_struct(&self) -> Result<StructView<'_>, AccessError>;
}

impl ValueExt for Value<'static> {
    fn get<T: Basic>(&self) -> Result<T, AccessError> {
        read_basic(peel(self))
    }

    fn get_array<T: Basic>(&self) -> Result<Vec<T>, AccessError> {
        read_array(self)
    }

    fn get_fixed_array(&self) -> Result<Vec<u8>, AccessError> {
        read_fixed_array(self)
    }

    fn get_dict(&self) -> Result<DictView<'_>, AccessError> {
        read_dict(self)
    }

    fn get_struct(&self) -> Result<StructView<'_>, AccessError> {
        read_struct(self)
    }
}

// ── Cursor ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Items<'a> {
    Body(&'a [OwnedValue]),
    Values(&'a [Value<'static>]),
}

impl<'a> Items<'a> {
    fn get(self, pos: usize) -> Option<&'a Value<'static>> {
        match self {
            Self::Body(items) => items.get(pos).map(|v| &**v),
            Self::Values(items) => items.get(pos),
        }
    }

    fn len(self) -> usize {
        match self {
            Self::Body(items) => items.len(),
            Self::Values(items) => items.len(),
        }
    }
}

/// Positional cursor over a sequence of values.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    items: Items<'a>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// A cursor over a message body.
    pub fn new(body: &'a [OwnedValue]) -> Self {
        Self {
            items: Items::Body(body),
            pos: 0,
        }
    }

    /// A cursor over the items of a container.
    pub fn over(items: &'a [Value<'static>]) -> Self {
        Self {
            items: Items::Values(items),
            pos: 0,
        }
    }

    /// The value under the cursor, if any.
    pub fn current(&self) -> Option<&'a Value<'static>> {
        self.items.get(self.pos)
    }

    /// Signature of the value under the cursor.
    pub fn arg_signature(&self) -> Option<String> {
        self.current().map(|v| v.value_signature().to_string())
    }

    /// Move to the next item. Returns `false` once the end is reached.
    pub fn advance(&mut self) -> bool {
        let len = self.items.len();
        if self.pos < len {
            self.pos += 1;
        }
        self.pos < len
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.pos)
    }

    fn expect(&self, expected: &'static str) -> Result<&'a Value<'static>, AccessError> {
        self.current().ok_or(AccessError::Missing { expected })
    }

    pub fn get_basic<T: Basic>(&self) -> Result<T, AccessError> {
        read_basic(self.expect(<T as Basic>::SIGNATURE)?)
    }

    /// Read a basic value wrapped in a variant.
    pub fn get_basic_variant<T: Basic>(&self) -> Result<T, AccessError> {
        read_basic_variant(self.expect(VARIANT)?)
    }

    /// Read a homogeneous array of basic values. Both the array and its
    /// elements may be variant-wrapped.
    pub fn get_array<T: Basic>(&self) -> Result<Vec<T>, AccessError> {
        read_array(self.expect(ARRAY)?)
    }

    pub fn get_fixed_array(&self) -> Result<Vec<u8>, AccessError> {
        read_fixed_array(self.expect(ARRAY)?)
    }

    pub fn get_dict(&self) -> Result<DictView<'a>, AccessError> {
        read_dict(self.expect(DICT)?)
    }

    pub fn get_struct(&self) -> Result<StructView<'a>, AccessError> {
        read_struct(self.expect(STRUCT)?)
    }

    /// The value inside a variant.
    pub fn get_variant(&self) -> Result<&'a Value<'static>, AccessError> {
        match self.expect(VARIANT)? {
            Value::Value(inner) => Ok(&**inner),
            other => Err(mismatch(VARIANT, other)),
        }
    }

    /// A cursor over the items of the array under this cursor.
    pub fn recurse_array(&self) -> Result<Cursor<'a>, AccessError> {
        match peel(self.expect(ARRAY)?) {
            Value::Array(array) => Ok(Cursor::over(array.inner())),
            other => Err(mismatch(ARRAY, other)),
        }
    }
}

// ── Dictionary view ─────────────────────────────────────────────────

/// Borrowed view of a dictionary value.
#[derive(Debug, Clone, Copy)]
pub struct DictView<'a> {
    dict: &'a Dict<'static, 'static>,
}

impl<'a> DictView<'a> {
    pub fn new(dict: &'a Dict<'static, 'static>) -> Self {
        Self { dict }
    }

    pub fn len(&self) -> usize {
        self.dict.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.iter().next().is_none()
    }

    /// Visit entries with a string key until the visitor breaks.
    /// Returns `true` when the visitor stopped early.
    pub fn for_each<F>(&self, mut visit: F) -> bool
    where
        F: FnMut(&'a str, &'a Value<'static>) -> ControlFlow<()>,
    {
        for (key, value) in self.iter() {
            if visit(key, value).is_break() {
                return true;
            }
        }
        false
    }

    /// Entries with string keys.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value<'static>)> + 'a {
        self.dict.iter().filter_map(|(k, v)| match k {
            Value::Str(k) => Some((k.as_str(), v)),
            _ => None,
        })
    }

    /// Value stored under `key`, as found on the wire (usually a variant).
    pub fn entry(&self, key: &str) -> Result<&'a Value<'static>, AccessError> {
        let mut found = None;
        self.for_each(|k, v| {
            if k == key {
                found = Some(v);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found.ok_or_else(|| AccessError::NotFound { key: key.to_owned() })
    }

    /// Read a basic value stored under `key`, unwrapping a variant if present.
    pub fn get_basic<T: Basic>(&self, key: &str) -> Result<T, AccessError> {
        read_basic(peel(self.entry(key)?))
    }

    /// Read a basic value stored under `key` that must be variant-wrapped.
    pub fn get_basic_variant<T: Basic>(&self, key: &str) -> Result<T, AccessError> {
        read_basic_variant(self.entry(key)?)
    }

    pub fn get_array<T: Basic>(&self, key: &str) -> Result<Vec<T>, AccessError> {
        read_array(self.entry(key)?)
    }

    pub fn get_fixed_array(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        read_fixed_array(self.entry(key)?)
    }

    pub fn get_dict(&self, key: &str) -> Result<DictView<'a>, AccessError> {
        read_dict(self.entry(key)?)
    }

    /// Like [`get_basic`](Self::get_basic) but treats a missing key as `None`.
    pub fn optional<T: Basic>(&self, key: &str) -> Result<Option<T>, AccessError> {
        match self.get_basic(key) {
            Ok(v) => Ok(Some(v)),
            Err(AccessError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ── Struct view ─────────────────────────────────────────────────────

/// Borrowed view of a struct value. Positions are zero-based.
#[derive(Debug, Clone, Copy)]
pub struct StructView<'a> {
    fields: &'a [Value<'static>],
}

impl<'a> StructView<'a> {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(
        &self,
        position: usize,
        expected: &'static str,
    ) -> Result<&'a Value<'static>, AccessError> {
        self.fields
            .get(position)
            .ok_or(AccessError::Missing { expected })
    }

    pub fn get_basic<T: Basic>(&self, position: usize) -> Result<T, AccessError> {
        read_basic(self.field(position, <T as Basic>::SIGNATURE)?)
    }

    pub fn get_array<T: Basic>(&self, position: usize) -> Result<Vec<T>, AccessError> {
        read_array(self.field(position, ARRAY)?)
    }

    pub fn get_dict(&self, position: usize) -> Result<DictView<'a>, AccessError> {
        read_dict(self.field(position, DICT)?)
    }

    pub fn cursor(&self) -> Cursor<'a> {
        Cursor::over(self.fields)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::value::{into_body, object_path, property_dict, string_array, variant};

    fn props() -> Value<'static> {
        property_dict([
            ("Name", Value::from("home")),
            ("Strength", Value::from(72u8)),
            ("IPv4", property_dict([("Method", Value::from("dhcp"))])),
        ])
    }

    #[test]
    fn mismatched_read_leaves_cursor_in_place() {
        let body = into_body([Value::from("x"), Value::from(true)]).unwrap();
        let cursor = Cursor::new(&body);
        let err = cursor.get_basic::<bool>().unwrap_err();
        assert_eq!(
            err,
            AccessError::TypeMismatch {
                expected: "b",
                found: "s".to_owned()
            }
        );
        assert_eq!(cursor.get_basic::<String>().unwrap(), "x");
    }

    #[test]
    fn dict_lookups_restart_from_the_first_entry() {
        let body = into_body([props()]).unwrap();
        let view = Cursor::new(&body).get_dict().unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.get_basic::<String>("Name").unwrap(), "home");
        assert_eq!(view.get_basic::<u8>("Strength").unwrap(), 72);
        assert_eq!(view.get_basic::<String>("Name").unwrap(), "home");
        assert_eq!(
            view.get_dict("IPv4")
                .unwrap()
                .get_basic::<String>("Method")
                .unwrap(),
            "dhcp"
        );
    }

    #[test]
    fn for_each_reports_early_exit() {
        let body = into_body([props()]).unwrap();
        let view = Cursor::new(&body).get_dict().unwrap();
        let mut seen = 0;
        let stopped = view.for_each(|k, _| {
            seen += 1;
            if k == "Strength" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(stopped);
        assert!(seen <= 3);

        let stopped = view.for_each(|_, _| ControlFlow::Continue(()));
        assert!(!stopped);
    }

    #[test]
    fn missing_key_is_not_found() {
        let body = into_body([props()]).unwrap();
        let view = Cursor::new(&body).get_dict().unwrap();
        assert!(matches!(
            view.get_basic::<bool>("Powered"),
            Err(AccessError::NotFound { .. })
        ));
        assert_eq!(view.optional::<bool>("Powered").unwrap(), None);
        assert!(matches!(
            view.optional::<bool>("Name"),
            Err(AccessError::TypeMismatch { expected: "b", .. })
        ));
    }

    #[test]
    fn variant_wrapped_array_of_strings() {
        let body = into_body([variant(string_array(["8.8.8.8", "1.1.1.1"]))]).unwrap();
        let list: Vec<String> = Cursor::new(&body).get_array().unwrap();
        assert_eq!(list, ["8.8.8.8", "1.1.1.1"]);
    }

    #[test]
    fn fixed_array_requires_bytes() {
        let body = into_body([Value::from(vec![1u8, 2]), string_array(["a"])]).unwrap();
        let mut cursor = Cursor::new(&body);
        assert_eq!(cursor.get_fixed_array().unwrap(), [1, 2]);
        assert!(cursor.advance());
        assert_eq!(
            cursor.get_fixed_array(),
            Err(AccessError::TypeMismatch {
                expected: "y",
                found: "s".to_owned()
            })
        );
    }

    #[test]
    fn struct_positions_are_zero_based() {
        let path = object_path("/net/connman/technology/wifi").unwrap();
        let body = into_body([Value::from((path, props()))]).unwrap();
        let entry = Cursor::new(&body).get_struct().unwrap();
        assert_eq!(entry.len(), 2);
        assert_eq!(
            entry.get_basic::<OwnedObjectPath>(0).unwrap().as_str(),
            "/net/connman/technology/wifi"
        );
        assert_eq!(entry.get_dict(1).unwrap().len(), 3);
        assert!(matches!(
            entry.get_basic::<bool>(2),
            Err(AccessError::Missing { expected: "b" })
        ));
    }

    #[test]
    fn advance_stops_at_end() {
        let body = into_body([Value::from(true)]).unwrap();
        let mut cursor = Cursor::new(&body);
        assert_eq!(cursor.arg_signature().as_deref(), Some("b"));
        assert!(!cursor.advance());
        assert_eq!(cursor.arg_signature(), None);
        assert!(matches!(
            cursor.get_basic::<bool>(),
            Err(AccessError::Missing { .. })
        ));
        cursor.rewind();
        assert!(cursor.get_basic::<bool>().unwrap());
    }
}
