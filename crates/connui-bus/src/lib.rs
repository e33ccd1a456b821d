//! Bus-facing layer for connui.
//!
//! - **[`value`]**: message items are [`zvariant`] values; bodies carry
//!   [`OwnedValue`]s. Helpers build `a{sv}` dictionaries and paths.
//! - **[`access`]** / **[`append`]**: typed readers and writers with
//!   explicit destination types. Mismatches are errors, never guesses.
//! - **[`message`]**: method calls, signals, replies and the
//!   [`BusEvent`]s a transport feeds back.
//! - **[`Bus`]**: the capability trait the sync engine is written against.
//!
//! Enable the `mock` feature for [`MockBus`], a recording implementation
//! used by the tests of downstream crates.

pub mod access;
pub mod append;
pub mod error;
pub mod message;
pub mod transport;
pub mod value;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use access::{AccessError, Basic, Cursor, DictView, StructView, ValueExt};
pub use append::{Appender, ArrayAppender, DictAppender};
pub use error::Error;
pub use message::{
    BusEvent, CallId, ErrorReply, IncomingCall, MethodCall, Reply, ReplyToken, Signal, SignalRule,
    WatchId,
};
pub use transport::Bus;
pub use value::{
    PropertyMap, into_body, object_path, peel, property_dict, property_map, string_array,
    to_owned_value, variant,
};
pub use zvariant::{
    self, Array, Dict, ObjectPath, OwnedObjectPath, OwnedValue, Signature, Structure, Value,
};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockBus;
