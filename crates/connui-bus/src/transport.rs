// ── Transport seam ──
//
// The sync engine never touches a socket. Everything it needs from a
// message bus connection is expressed by `Bus`; a real adapter (or the
// recording `MockBus`) implements it and feeds `BusEvent`s back.

use crate::error::Error;
use crate::message::{CallId, MethodCall, Reply, SignalRule, WatchId};

/// The capabilities the sync engine needs from a bus connection.
///
/// All methods are non-blocking: replies to [`call`](Bus::call) arrive
/// later as [`BusEvent::Reply`](crate::BusEvent::Reply) carrying the
/// returned [`CallId`].
pub trait Bus {
    /// Send a method call and expect a reply.
    fn call(&mut self, call: MethodCall) -> Result<CallId, Error>;

    /// Send a method call without waiting for any reply.
    fn send(&mut self, call: MethodCall) -> Result<(), Error>;

    /// Give up on an outstanding call. A reply that still arrives for it
    /// must be ignored by the caller.
    fn cancel(&mut self, call: CallId);

    fn add_watch(&mut self, rule: SignalRule) -> Result<WatchId, Error>;

    fn remove_watch(&mut self, watch: WatchId);

    /// Answer an incoming method call.
    fn reply(&mut self, reply: Reply) -> Result<(), Error>;

    /// Start routing incoming calls for `path`/`interface` to us.
    fn export_object(&mut self, path: &str, interface: &str) -> Result<(), Error>;

    fn unexport_object(&mut self, path: &str, interface: &str);
}
