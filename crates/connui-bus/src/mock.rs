//! In-memory [`Bus`] that records everything sent through it.
//!
//! Tests drive the sync engine by feeding [`BusEvent`](crate::BusEvent)s
//! by hand and asserting on what the engine asked the bus to do.

use std::collections::BTreeMap;

use zvariant::{OwnedObjectPath, Value};

use crate::access::AccessError;
use crate::error::Error;
use crate::message::{CallId, MethodCall, Reply, SignalRule, WatchId};
use crate::transport::Bus;
use crate::value::{PropertyMap, object_path};

// ── Reply fixtures ──────────────────────────────────────────────────

/// An `a(oa{sv})` array, the reply shape of `GetServices` and
/// `GetTechnologies` and the first argument of `ServicesChanged`.
pub fn object_array<'p, I>(entries: I) -> Result<Value<'static>, AccessError>
where
    I: IntoIterator<Item = (&'p str, PropertyMap)>,
{
    let entries = entries
        .into_iter()
        .map(|(path, props)| Ok((object_path(path)?, props)))
        .collect::<Result<Vec<(OwnedObjectPath, PropertyMap)>, AccessError>>()?;
    Ok(Value::from(entries))
}

/// An `ao` array of object paths.
pub fn path_array(paths: &[&str]) -> Result<Value<'static>, AccessError> {
    let paths = paths
        .iter()
        .map(|path| object_path(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::from(paths))
}

// ── Recording bus ───────────────────────────────────────────────────

/// Recording bus. Every collection is public so tests can assert on it.
#[derive(Debug, Default)]
pub struct MockBus {
    next_id: u64,
    /// Calls issued with a reply expected, in order.
    pub calls: Vec<(CallId, MethodCall)>,
    /// Fire-and-forget calls, in order.
    pub sent: Vec<MethodCall>,
    pub canceled: Vec<CallId>,
    /// Currently active watches.
    pub watches: BTreeMap<WatchId, SignalRule>,
    pub removed_watches: Vec<WatchId>,
    pub replies: Vec<Reply>,
    /// Currently exported `(path, interface)` pairs.
    pub exported: Vec<(String, String)>,
    /// When set, the next `call`/`send` fails with `Disconnected`.
    pub fail_next: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_failure(&mut self) -> Result<(), Error> {
        if std::mem::take(&mut self.fail_next) {
            return Err(Error::Disconnected);
        }
        Ok(())
    }

    /// Calls whose member name is `member`, oldest first.
    pub fn calls_named(&self, member: &str) -> Vec<&(CallId, MethodCall)> {
        self.calls.iter().filter(|(_, c)| c.member == member).collect()
    }

    /// The most recent call named `member`.
    pub fn last_call(&self, member: &str) -> Option<CallId> {
        self.calls
            .iter()
            .rev()
            .find(|(_, c)| c.member == member)
            .map(|(id, _)| *id)
    }

    pub fn sent_named(&self, member: &str) -> Vec<&MethodCall> {
        self.sent.iter().filter(|c| c.member == member).collect()
    }

    /// Whether a watch for `interface.member` is active.
    pub fn is_watching(&self, interface: &str, member: &str) -> bool {
        self.watches
            .values()
            .any(|r| r.interface == interface && r.member == member)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Forget everything recorded so far; ids keep counting up.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.sent.clear();
        self.canceled.clear();
        self.removed_watches.clear();
        self.replies.clear();
    }
}

impl Bus for MockBus {
    fn call(&mut self, call: MethodCall) -> Result<CallId, Error> {
        self.check_failure()?;
        let id = CallId(self.next());
        self.calls.push((id, call));
        Ok(id)
    }

    fn send(&mut self, call: MethodCall) -> Result<(), Error> {
        self.check_failure()?;
        self.sent.push(call);
        Ok(())
    }

    fn cancel(&mut self, call: CallId) {
        self.canceled.push(call);
    }

    fn add_watch(&mut self, rule: SignalRule) -> Result<WatchId, Error> {
        let id = WatchId(self.next());
        self.watches.insert(id, rule);
        Ok(id)
    }

    fn remove_watch(&mut self, watch: WatchId) {
        if self.watches.remove(&watch).is_some() {
            self.removed_watches.push(watch);
        }
    }

    fn reply(&mut self, reply: Reply) -> Result<(), Error> {
        self.replies.push(reply);
        Ok(())
    }

    fn export_object(&mut self, path: &str, interface: &str) -> Result<(), Error> {
        if self
            .exported
            .iter()
            .any(|(p, i)| p == path && i == interface)
        {
            return Err(Error::ObjectExists {
                path: path.to_owned(),
                interface: interface.to_owned(),
            });
        }
        self.exported.push((path.to_owned(), interface.to_owned()));
        Ok(())
    }

    fn unexport_object(&mut self, path: &str, interface: &str) {
        self.exported.retain(|(p, i)| !(p == path && i == interface));
    }
}
