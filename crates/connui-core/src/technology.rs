// ── Technology registry ──
//
// Cache of technology objects (wifi, ethernet, bluetooth, ...) keyed by
// object path. Every updatable property that appears in an update is
// notified on its own: a dictionary carrying Powered and Connected
// produces two notifications.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use connui_bus::{
    Bus, CallId, Cursor, DictView, ErrorReply, OwnedValue, Signal, Value, WatchId, peel,
    to_owned_value,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};

use crate::call_slot::CallSlot;
use crate::convert::{apply_technology_property, object_list, path_arg};
use crate::error::CoreError;
use crate::events::{Callback, PathCallback, PropertyChanged, SetFailed};
use crate::manager::Manager;
use crate::model::{TechnologyProperty, TechnologyRecord};
use crate::protocol::{self, member};
use crate::session::{CallRoute, Link, Outcome, Parts, Pending, Session, Task};

/// Called once when a scan finishes, fails or is abandoned.
pub type ScanCallback = Box<dyn FnOnce(Result<(), CoreError>) + Send>;

/// Someone waiting for a technology scan to finish.
pub(crate) enum ScanWaiter {
    Caller(ScanCallback),
    /// The service registry's refresh.
    ServiceRefresh,
}

struct Technology {
    record: TechnologyRecord,
    watch: Option<WatchId>,
    setters: HashMap<TechnologyProperty, CallSlot>,
    scan: CallSlot,
    scan_waiters: Vec<ScanWaiter>,
    on_property_changed: Option<Callback<PropertyChanged<TechnologyProperty>>>,
    on_set_failed: Option<Callback<SetFailed<TechnologyProperty>>>,
}

impl Technology {
    fn new(path: &str, watch: WatchId) -> Self {
        Self {
            record: TechnologyRecord::new(path),
            watch: Some(watch),
            setters: HashMap::new(),
            scan: CallSlot::default(),
            scan_waiters: Vec::new(),
            on_property_changed: None,
            on_set_failed: None,
        }
    }

    /// Release everything the technology holds on the bus. Returns
    /// whether a service refresh was waiting on its scan.
    fn destroy<B: Bus>(mut self, link: &mut Link<'_, B>) -> bool {
        let path = self.record.path.clone();
        if let Some(watch) = self.watch.take() {
            link.unwatch(watch);
        }
        for slot in self.setters.values_mut() {
            link.cancel(slot);
        }
        link.cancel(&mut self.scan);
        link.cancel_technology_tasks(&path);
        debug!(path = %path, "technology destroyed");

        let mut refresh_waiting = false;
        for waiter in self.scan_waiters.drain(..) {
            match waiter {
                ScanWaiter::Caller(callback) => callback(Err(CoreError::Canceled {
                    operation: format!("scan of {path}"),
                })),
                ScanWaiter::ServiceRefresh => refresh_waiting = true,
            }
        }
        refresh_waiting
    }

    fn apply<B: Bus>(&mut self, link: &mut Link<'_, B>, name: &str, value: &Value<'static>) {
        match apply_technology_property(&mut self.record, name, value) {
            Ok(Some(property)) => match to_owned_value(peel(value)) {
                Ok(value) => link.schedule(
                    Task::TechnologyChanged {
                        path: self.record.path.clone(),
                        property,
                    },
                    Pending::Changed(value),
                ),
                Err(e) => {
                    warn!(path = %self.record.path, property = name, error = %e, "unable to keep changed value");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(path = %self.record.path, property = name, error = %e, "malformed technology property");
            }
        }
    }
}

fn scan_result(path: &str, outcome: &Outcome) -> Result<(), CoreError> {
    match outcome {
        Some(Ok(_)) => Ok(()),
        Some(Err(error)) => Err(CoreError::RemoteRejected(error.clone())),
        None => Err(CoreError::Canceled {
            operation: format!("scan of {path}"),
        }),
    }
}

// ── Registry ────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct TechnologyRegistry {
    technologies: HashMap<String, Technology>,
    signals_registered: bool,
    on_property_changed: Option<Callback<PropertyChanged<TechnologyProperty>>>,
    on_added: Option<PathCallback>,
    on_removed: Option<PathCallback>,
}

impl TechnologyRegistry {
    pub(crate) fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }

    /// Path of a wifi technology that is not powered yet.
    pub(crate) fn unpowered_wifi(&self) -> Option<&str> {
        self.technologies
            .values()
            .map(|t| &t.record)
            .find(|r| r.kind.as_deref() == Some(protocol::WIFI) && !r.powered)
            .map(|r| r.path.as_str())
    }

    fn record(&self, path: &str) -> Option<&TechnologyRecord> {
        self.technologies.get(path).map(|t| &t.record)
    }

    fn technology_mut(&mut self, path: &str) -> Result<&mut Technology, CoreError> {
        self.technologies
            .get_mut(path)
            .ok_or_else(|| CoreError::unknown_object("technology", path))
    }

    /// Update or create the technology at `path`. Returns `true` when it
    /// was created.
    fn upsert<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        properties: DictView<'_>,
    ) -> Result<bool, CoreError> {
        let (technology, created) = match self.technologies.entry(path.to_owned()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let rule = link
                    .rule(protocol::TECHNOLOGY_INTERFACE, member::PROPERTY_CHANGED)
                    .path(path);
                let watch = link.watch(rule)?;
                debug!(path, "technology created");
                (entry.insert(Technology::new(path, watch)), true)
            }
        };
        for (name, value) in properties.iter() {
            technology.apply(link, name, value);
        }
        Ok(created)
    }

    fn added(&mut self, path: &str) {
        if let Some(callback) = self.on_added.as_mut() {
            callback(path);
        }
    }

    pub(crate) fn on_bulk_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        manager: &mut Manager,
        body: &[OwnedValue],
    ) -> Result<(), CoreError> {
        for (path, properties) in object_list(Cursor::new(body))? {
            match self.upsert(link, &path, properties) {
                Ok(true) => self.added(&path),
                Ok(false) => {}
                Err(e) => warn!(path = %path, error = %e, "failed to track technology"),
            }
        }

        // Technologies added between the first fetch and the signal
        // registration would be missed; fetch once more after it.
        if !self.signals_registered {
            manager.watch_technologies(link, true)?;
            self.signals_registered = true;
            manager.fetch_technologies(link)?;
        }
        Ok(())
    }

    pub(crate) fn on_added<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let mut args = signal.args();
        let path = path_arg(&args)?;
        args.advance();
        let properties = args.get_dict()?;
        if self.upsert(link, &path, properties)? {
            self.added(&path);
        }
        Ok(())
    }

    /// Handle `TechnologyRemoved`. Returns whether a service refresh was
    /// waiting on the removed technology's scan.
    pub(crate) fn on_removed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<bool, CoreError> {
        let path = path_arg(&signal.args())?;
        let Some(technology) = self.technologies.remove(&path) else {
            trace!(path = %path, "removal of unknown technology");
            return Ok(false);
        };
        if let Some(callback) = self.on_removed.as_mut() {
            callback(&path);
        }
        Ok(technology.destroy(link))
    }

    pub(crate) fn on_property_changed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let Some(technology) = self.technologies.get_mut(&signal.path) else {
            trace!(path = %signal.path, "property change for unknown technology");
            return Ok(());
        };
        let mut args = signal.args();
        let name: String = args.get_basic()?;
        args.advance();
        technology.apply(link, &name, args.get_variant()?);
        Ok(())
    }

    pub(crate) fn on_set_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        property: TechnologyProperty,
        call: CallId,
        outcome: Outcome,
    ) {
        let Some(slot) = self
            .technologies
            .get_mut(path)
            .and_then(|t| t.setters.get_mut(&property))
        else {
            return;
        };
        if !slot.complete(call) {
            return;
        }
        match outcome {
            Some(Ok(_)) => debug!(path, property = property.name(), "property set"),
            Some(Err(error)) => {
                warn!(path, property = property.name(), error = %error, "property set rejected");
                link.schedule(
                    Task::TechnologySetFailed {
                        path: path.to_owned(),
                        property,
                    },
                    Pending::Failed(error),
                );
            }
            None => trace!(path, property = property.name(), "property set canceled"),
        }
    }

    /// Handle the end of a scan. Returns whether a service refresh was
    /// waiting on it.
    pub(crate) fn on_scan_reply(&mut self, path: &str, call: CallId, outcome: Outcome) -> bool {
        let Some(technology) = self.technologies.get_mut(path) else {
            return false;
        };
        if !technology.scan.complete(call) {
            return false;
        }
        debug!(path, "scan finished");

        let mut refresh_waiting = false;
        for waiter in technology.scan_waiters.drain(..) {
            match waiter {
                ScanWaiter::Caller(callback) => callback(scan_result(path, &outcome)),
                ScanWaiter::ServiceRefresh => refresh_waiting = true,
            }
        }
        refresh_waiting
    }

    pub(crate) fn notify_changed(
        &mut self,
        path: String,
        property: TechnologyProperty,
        value: OwnedValue,
    ) {
        let Some(technology) = self.technologies.get_mut(&path) else {
            return;
        };
        let event = PropertyChanged {
            path,
            property,
            value,
        };
        if let Some(callback) = technology.on_property_changed.as_mut() {
            callback(&event);
        }
        if let Some(callback) = self.on_property_changed.as_mut() {
            callback(&event);
        }
    }

    pub(crate) fn notify_set_failed(
        &mut self,
        path: String,
        property: TechnologyProperty,
        error: ErrorReply,
    ) {
        let Some(callback) = self
            .technologies
            .get_mut(&path)
            .and_then(|t| t.on_set_failed.as_mut())
        else {
            return;
        };
        callback(&SetFailed {
            path,
            property,
            error,
        });
    }

    fn set_property<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        property: TechnologyProperty,
        value: Value<'static>,
    ) -> Result<(), CoreError> {
        let technology = self.technology_mut(path)?;
        let slot = technology.setters.entry(property).or_default();
        let call = link
            .method(path, protocol::TECHNOLOGY_INTERFACE, member::SET_PROPERTY)
            .with_args(|a| {
                a.append_keyed_value(property.name(), value);
            })?;
        let route = CallRoute::TechnologySet {
            path: path.to_owned(),
            property,
        };
        let id = link.issue_exclusive(slot, call, route, path)?;
        debug!(path, property = property.name(), call = %id, "setting technology property");
        Ok(())
    }

    pub(crate) fn scan<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        waiter: ScanWaiter,
    ) -> Result<(), CoreError> {
        let technology = self.technology_mut(path)?;
        let call = link.method(path, protocol::TECHNOLOGY_INTERFACE, member::SCAN);
        let route = CallRoute::TechnologyScan {
            path: path.to_owned(),
        };
        link.issue(&mut technology.scan, call, route)?;
        technology.scan_waiters.push(waiter);
        debug!(path, waiters = technology.scan_waiters.len(), "scanning");
        Ok(())
    }

    /// Destroy every technology. Returns whether a service refresh was
    /// waiting on one of their scans.
    fn clear<B: Bus>(&mut self, link: &mut Link<'_, B>) -> bool {
        let mut refresh_waiting = false;
        for (_, technology) in self.technologies.drain() {
            refresh_waiting |= technology.destroy(link);
        }
        refresh_waiting
    }
}

// ── Public handle ───────────────────────────────────────────────────

/// Access to the technology registry of a [`Session`].
pub struct TechnologiesHandle<'s, B: Bus> {
    session: &'s mut Session<B>,
}

impl<'s, B: Bus> TechnologiesHandle<'s, B> {
    pub(crate) fn new(session: &'s mut Session<B>) -> Self {
        Self { session }
    }

    fn registry(&self) -> Option<&TechnologyRegistry> {
        self.session.technology_registry()
    }

    fn record(&self, path: &str) -> Option<&TechnologyRecord> {
        self.registry().and_then(|r| r.record(path))
    }

    fn with_registry<R>(
        &mut self,
        op: impl FnOnce(&mut TechnologyRegistry, &mut Link<'_, B>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let Parts {
            mut link,
            technologies,
            ..
        } = self.session.parts();
        let registry = technologies
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("technology registry"))?;
        op(registry, &mut link)
    }

    /// Start mirroring technologies. Requires an initialized manager.
    /// Calling `init` again while initialized does nothing.
    pub fn init(&mut self) -> Result<(), CoreError> {
        let Parts {
            mut link,
            manager,
            technologies,
            ..
        } = self.session.parts();
        if technologies.is_some() {
            debug!("technology registry already initialized");
            return Ok(());
        }
        let manager = manager
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("manager"))?;
        manager.fetch_technologies(&mut link)?;
        *technologies = Some(TechnologyRegistry::default());
        debug!("technology registry initialized");
        Ok(())
    }

    /// Stop watching, cancel everything outstanding and drop every
    /// technology.
    pub fn finalize(&mut self) {
        let Parts {
            mut link,
            manager,
            technologies,
            services,
            ..
        } = self.session.parts();
        let Some(mut registry) = technologies.take() else {
            return;
        };
        if let Some(manager) = manager.as_mut() {
            manager.cancel_technologies(&mut link);
            // Disabling never fails.
            let _ = manager.watch_technologies(&mut link, false);
        }
        if registry.clear(&mut link) {
            if let Some(services) = services.as_mut() {
                services.on_scan_finished(&mut link);
            }
        }
        debug!("technology registry finalized");
    }

    pub fn is_initialized(&self) -> bool {
        self.registry().is_some()
    }

    // ── Callbacks ────────────────────────────────────────────────────

    /// Called for every changed property of every technology, after the
    /// per-technology callback.
    pub fn on_property_changed<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&PropertyChanged<TechnologyProperty>) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.on_property_changed = Some(Box::new(callback));
            Ok(())
        })
    }

    pub fn on_added<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.on_added = Some(Box::new(callback));
            Ok(())
        })
    }

    pub fn on_removed<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.on_removed = Some(Box::new(callback));
            Ok(())
        })
    }

    /// Called for every changed property of the technology at `path`.
    pub fn on_technology_changed<F>(&mut self, path: &str, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&PropertyChanged<TechnologyProperty>) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.technology_mut(path)?.on_property_changed = Some(Box::new(callback));
            Ok(())
        })
    }

    /// Called when the remote service rejects a property set on the
    /// technology at `path`.
    pub fn on_set_failed<F>(&mut self, path: &str, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&SetFailed<TechnologyProperty>) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.technology_mut(path)?.on_set_failed = Some(Box::new(callback));
            Ok(())
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Paths of every known technology, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .registry()
            .map(|r| r.technologies.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn get(&self, path: &str) -> Option<TechnologyRecord> {
        self.record(path).cloned()
    }

    pub fn name(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.name.clone())
    }

    pub fn kind(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.kind.clone())
    }

    pub fn is_enabled(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.powered)
    }

    pub fn is_connected(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.connected)
    }

    pub fn is_tethering(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.tethering)
    }

    /// Whether a scan of the technology at `path` is outstanding.
    pub fn is_scanning(&self, path: &str) -> bool {
        self.registry()
            .and_then(|r| r.technologies.get(path))
            .is_some_and(|t| t.scan.is_pending())
    }

    pub fn tethering_identifier(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.tethering_identifier.clone())
    }

    pub fn tethering_passphrase(&self, path: &str) -> Option<SecretString> {
        self.record(path)
            .and_then(|r| r.tethering_passphrase.clone())
    }

    // ── Mutators ─────────────────────────────────────────────────────

    /// Power the technology on or off. Succeeds without a round trip
    /// when it already is; rejections arrive through
    /// [`on_set_failed`](Self::on_set_failed).
    pub fn enable(&mut self, path: &str, enable: bool) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            if registry.technology_mut(path)?.record.powered == enable {
                return Ok(());
            }
            registry.set_property(link, path, TechnologyProperty::Powered, Value::Bool(enable))
        })
    }

    pub fn tether(&mut self, path: &str, enable: bool) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            if registry.technology_mut(path)?.record.tethering == enable {
                return Ok(());
            }
            registry.set_property(link, path, TechnologyProperty::Tethering, Value::Bool(enable))
        })
    }

    pub fn set_tethering_identifier(&mut self, path: &str, identifier: &str) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            registry.set_property(
                link,
                path,
                TechnologyProperty::TetheringIdentifier,
                Value::from(identifier.to_owned()),
            )
        })
    }

    pub fn set_tethering_passphrase(
        &mut self,
        path: &str,
        passphrase: &SecretString,
    ) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            registry.set_property(
                link,
                path,
                TechnologyProperty::TetheringPassphrase,
                Value::from(passphrase.expose_secret().to_owned()),
            )
        })
    }

    /// Ask the technology to scan; `done` runs once with the outcome.
    /// A new scan replaces an outstanding one, and everyone waiting is
    /// told when the latest one finishes.
    pub fn scan<F>(&mut self, path: &str, done: F) -> Result<(), CoreError>
    where
        F: FnOnce(Result<(), CoreError>) + Send + 'static,
    {
        self.with_registry(|registry, link| {
            registry.scan(link, path, ScanWaiter::Caller(Box::new(done)))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use connui_bus::mock::object_array;
    use connui_bus::{
        BusEvent, ErrorReply, MockBus, PropertyMap, into_body, object_path, property_map, variant,
    };

    use super::*;
    use crate::config::SessionConfig;

    const WIFI: &str = "/net/connman/technology/wifi";

    fn technologies_reply(entries: Vec<(&str, PropertyMap)>) -> Vec<OwnedValue> {
        into_body([object_array(entries).unwrap()]).unwrap()
    }

    fn property_changed(path: &str, name: &str, value: Value<'static>) -> BusEvent {
        BusEvent::Signal(Signal::new(
            path,
            protocol::TECHNOLOGY_INTERFACE,
            member::PROPERTY_CHANGED,
            into_body([Value::from(name.to_owned()), variant(value)]).unwrap(),
        ))
    }

    fn technology_removed(path: &str) -> BusEvent {
        BusEvent::Signal(Signal::new(
            "/",
            protocol::MANAGER_INTERFACE,
            member::TECHNOLOGY_REMOVED,
            into_body([Value::from(object_path(path).unwrap())]).unwrap(),
        ))
    }

    fn ready_session() -> Session<MockBus> {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        session.manager().init(|_| {}).unwrap();
        session.technologies().init().unwrap();
        let call = session.bus().last_call(member::GET_TECHNOLOGIES).unwrap();
        session.dispatch(BusEvent::Reply {
            call,
            outcome: Ok(technologies_reply(vec![(
                WIFI,
                property_map([
                    ("Name", Value::from("WiFi")),
                    ("Type", Value::from("wifi")),
                    ("Powered", Value::Bool(false)),
                ]),
            )])),
        });
        session.run_pending();
        session
    }

    #[test]
    fn init_requires_manager() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let err = session.technologies().init().unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn first_bulk_reply_registers_signals_and_refetches_once() {
        let mut session = ready_session();
        assert!(session.bus().is_watching(protocol::MANAGER_INTERFACE, member::TECHNOLOGY_ADDED));
        assert_eq!(session.bus().calls_named(member::GET_TECHNOLOGIES).len(), 2);

        let call = session.bus().last_call(member::GET_TECHNOLOGIES).unwrap();
        session.dispatch(BusEvent::Reply {
            call,
            outcome: Ok(technologies_reply(Vec::new())),
        });
        assert_eq!(session.bus().calls_named(member::GET_TECHNOLOGIES).len(), 2);
    }

    #[test]
    fn enable_is_a_noop_when_state_matches() {
        let mut session = ready_session();
        session.bus_mut().clear();
        session.technologies().enable(WIFI, false).unwrap();
        assert!(session.bus().calls.is_empty());

        session.technologies().enable(WIFI, true).unwrap();
        assert_eq!(session.bus().calls_named(member::SET_PROPERTY).len(), 1);
    }

    #[test]
    fn rejected_set_reaches_error_callback_only() {
        let mut session = ready_session();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        session
            .technologies()
            .on_set_failed(WIFI, move |failed| sink.lock().unwrap().push(failed.clone()))
            .unwrap();

        session.technologies().tether(WIFI, true).unwrap();
        let call = session.bus().last_call(member::SET_PROPERTY).unwrap();
        session.dispatch(BusEvent::Reply {
            call,
            outcome: Err(ErrorReply::new("net.connman.Error.NotSupported", "no")),
        });
        session.run_pending();

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].property, TechnologyProperty::Tethering);
        assert_eq!(failures[0].error.name, "net.connman.Error.NotSupported");
    }

    #[test]
    fn scan_waiters_all_hear_the_latest_scan() {
        let mut session = ready_session();
        let results = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let sink = Arc::clone(&results);
            session
                .technologies()
                .scan(WIFI, move |r| sink.lock().unwrap().push(r.is_ok()))
                .unwrap();
        }
        assert!(session.technologies().is_scanning(WIFI));
        let scans = session.bus().calls_named(member::SCAN);
        assert_eq!(scans.len(), 2);
        let (first, second) = (scans[0].0, scans[1].0);

        session.dispatch(BusEvent::Reply {
            call: first,
            outcome: Ok(Vec::new()),
        });
        assert!(results.lock().unwrap().is_empty());

        session.dispatch(BusEvent::Reply {
            call: second,
            outcome: Ok(Vec::new()),
        });
        assert_eq!(*results.lock().unwrap(), vec![true, true]);
        assert!(!session.technologies().is_scanning(WIFI));
    }

    #[test]
    fn removal_cancels_scan_and_fires_callback() {
        let mut session = ready_session();
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        session
            .technologies()
            .on_removed(move |path| sink.lock().unwrap().push(path.to_owned()))
            .unwrap();
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        session
            .technologies()
            .scan(WIFI, move |r| *slot.lock().unwrap() = Some(r))
            .unwrap();

        session.dispatch(technology_removed(WIFI));

        assert_eq!(*removed.lock().unwrap(), vec![WIFI.to_owned()]);
        assert!(matches!(
            outcome.lock().unwrap().take(),
            Some(Err(CoreError::Canceled { .. }))
        ));
        assert!(session.technologies().paths().is_empty());
        assert_eq!(session.bus().canceled.len(), 1);
    }

    #[test]
    fn removal_drops_queued_notifications() {
        let mut session = ready_session();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        session
            .technologies()
            .on_property_changed(move |change| sink.lock().unwrap().push(change.property))
            .unwrap();

        session.dispatch(property_changed(WIFI, "Powered", Value::Bool(true)));
        assert_eq!(session.pending_notifications(), 1);

        session.dispatch(technology_removed(WIFI));
        assert_eq!(session.pending_notifications(), 0);
        assert_eq!(session.run_pending(), 0);
        assert!(changes.lock().unwrap().is_empty());
    }

    #[test]
    fn passphrase_is_kept_secret() {
        let mut session = ready_session();
        session.dispatch(property_changed(
            WIFI,
            "TetheringPassphrase",
            Value::from("hunter22"),
        ));
        let secret = session.technologies().tethering_passphrase(WIFI).unwrap();
        assert_eq!(secret.expose_secret(), "hunter22");
        assert!(!format!("{secret:?}").contains("hunter22"));
    }
}
