// ── Notification payloads and callback types ──
//
// Callbacks are plain boxed closures. Whatever "user data" a caller
// needs is captured by the closure itself.

use connui_bus::{ErrorReply, OwnedValue};

/// A property of `path` changed; `value` is the last value received.
#[derive(Debug)]
pub struct PropertyChanged<P> {
    pub path: String,
    pub property: P,
    pub value: OwnedValue,
}

/// The remote service rejected setting `property` on `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetFailed<P> {
    pub path: String,
    pub property: P,
    pub error: ErrorReply,
}

pub type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Called with the object path of an added or removed object.
pub type PathCallback = Box<dyn FnMut(&str) + Send>;

/// Called without arguments.
pub type Notify = Box<dyn FnMut() + Send>;
