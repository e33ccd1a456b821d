//! Service registry.
//!
//! Mirrors every service (connectable network) the remote side reports,
//! plus the explicit ordering it reports them in. Unlike technologies, an
//! update batch produces a single notification: the last updatable
//! property in the batch wins.
//!
//! One service can be *selected*. A selected service that the remote side
//! removes stays readable until [`ServicesHandle::deselect`] releases it.

mod selection;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use connui_bus::{
    Bus, CallId, Cursor, DictView, ErrorReply, OwnedValue, Signal, Value, WatchId, peel,
    string_array, to_owned_value,
};
use tracing::{debug, trace, warn};

use crate::call_slot::CallSlot;
use crate::convert::{ToProperties, apply_service_property, object_list, path_list};
use crate::error::CoreError;
use crate::events::{Callback, Notify, PathCallback, PropertyChanged, SetFailed};
use crate::model::{
    ConnState, EthernetInfo, Ipv4Config, Ipv6Config, ProviderInfo, ProxyConfig, ServiceProperty,
    ServiceRecord,
};
use crate::protocol::{self, member};
use crate::session::{CallRoute, Link, Outcome, Parts, Pending, Session, Task, reply_body};
use crate::technology::ScanWaiter;

pub use selection::Deselected;
use selection::Selection;

// ── Service ─────────────────────────────────────────────────────────

pub(crate) struct Service {
    record: ServiceRecord,
    watch: Option<WatchId>,
    setters: HashMap<ServiceProperty, CallSlot>,
    on_property_changed: Option<Callback<PropertyChanged<ServiceProperty>>>,
    on_set_failed: Option<Callback<SetFailed<ServiceProperty>>>,
}

impl Service {
    fn new(path: &str, watch: WatchId) -> Self {
        Self {
            record: ServiceRecord::new(path),
            watch: Some(watch),
            setters: HashMap::new(),
            on_property_changed: None,
            on_set_failed: None,
        }
    }

    /// Cancel in-flight sets and pending notifications. The property
    /// watch stays so a detached record keeps tracking its object.
    fn quiesce<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        for slot in self.setters.values_mut() {
            link.cancel(slot);
        }
        link.cancel_service_tasks(&self.record.path);
    }

    fn destroy<B: Bus>(mut self, link: &mut Link<'_, B>) {
        self.quiesce(link);
        if let Some(watch) = self.watch.take() {
            link.unwatch(watch);
        }
        debug!(path = %self.record.path, "service destroyed");
    }

    /// Apply a batch of properties and schedule one notification for the
    /// last updatable property among them.
    fn apply<'v, B, I>(&mut self, link: &mut Link<'_, B>, properties: I)
    where
        B: Bus,
        I: IntoIterator<Item = (&'v str, &'v Value<'static>)>,
    {
        let mut last = None;
        for (name, value) in properties {
            match apply_service_property(&mut self.record, name, value) {
                Ok(Some(property)) => last = Some((property, value)),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %self.record.path, property = name, error = %e, "malformed service property");
                }
            }
        }
        let Some((property, value)) = last else {
            return;
        };
        match to_owned_value(peel(value)) {
            Ok(value) => link.schedule(
                Task::ServiceChanged {
                    path: self.record.path.clone(),
                    property,
                },
                Pending::Changed(value),
            ),
            Err(e) => {
                warn!(path = %self.record.path, property = property.name(), error = %e, "unable to keep changed value");
            }
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Progress of a refresh: both the fetch and, when one was started, the
/// wifi scan must finish before it completes.
#[derive(Debug, Clone, Copy)]
struct Refresh {
    awaiting_scan: bool,
    awaiting_fetch: bool,
}

#[derive(Default)]
pub(crate) struct ServiceRegistry {
    services: HashMap<String, Service>,
    order: Vec<String>,
    selection: Selection,
    refresh: Option<Refresh>,
    refreshed: bool,
    on_refreshed: Option<Notify>,
    on_scanned: Option<Notify>,
    on_added: Option<PathCallback>,
    on_removed: Option<PathCallback>,
}

impl ServiceRegistry {
    fn lookup(&self, path: &str) -> Option<&Service> {
        self.services
            .get(path)
            .or_else(|| self.selection.detached(path))
    }

    fn lookup_mut(&mut self, path: &str) -> Option<&mut Service> {
        if self.services.contains_key(path) {
            self.services.get_mut(path)
        } else {
            self.selection.detached_mut(path)
        }
    }

    fn record(&self, path: &str) -> Option<&ServiceRecord> {
        self.lookup(path).map(|s| &s.record)
    }

    fn service_mut(&mut self, path: &str) -> Result<&mut Service, CoreError> {
        self.services
            .get_mut(path)
            .ok_or_else(|| CoreError::unknown_object("service", path))
    }

    /// Update or create the service at `path`. Returns `true` when it
    /// (re)entered the registry.
    fn upsert<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        properties: DictView<'_>,
    ) -> Result<bool, CoreError> {
        let (service, added) = match self.services.entry(path.to_owned()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let service = match self.selection.reclaim(path) {
                    Some(service) => {
                        debug!(path, "selected service is back");
                        service
                    }
                    None => {
                        let rule = link
                            .rule(protocol::SERVICE_INTERFACE, member::PROPERTY_CHANGED)
                            .path(path);
                        let watch = link.watch(rule)?;
                        debug!(path, "service created");
                        Service::new(path, watch)
                    }
                };
                (entry.insert(service), true)
            }
        };
        service.apply(link, properties.iter());
        Ok(added)
    }

    /// Apply a full `a(oa{sv})` list; its order becomes the service order.
    fn apply_list<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        objects: Vec<(String, DictView<'_>)>,
    ) {
        self.order.clear();
        for (path, properties) in objects {
            match self.upsert(link, &path, properties) {
                Ok(added) => {
                    if added {
                        if let Some(callback) = self.on_added.as_mut() {
                            callback(&path);
                        }
                    }
                    self.order.push(path);
                }
                Err(e) => warn!(path = %path, error = %e, "failed to track service"),
            }
        }
    }

    fn evict<B: Bus>(&mut self, link: &mut Link<'_, B>, path: &str) {
        let Some(mut service) = self.services.remove(path) else {
            trace!(path, "removal of unknown service");
            return;
        };
        self.order.retain(|p| p != path);
        if self.selection.is(path) {
            service.quiesce(link);
            self.selection.detach(service);
            debug!(path, "selected service detached");
        } else {
            service.destroy(link);
        }
        if let Some(callback) = self.on_removed.as_mut() {
            callback(path);
        }
    }

    fn complete_refresh<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        let Some(refresh) = self.refresh else {
            return;
        };
        if refresh.awaiting_scan || refresh.awaiting_fetch {
            return;
        }
        self.refresh = None;
        self.refreshed = true;
        debug!(services = self.order.len(), "service refresh complete");
        link.schedule(Task::ServicesRefreshed, Pending::Fire);
    }

    // ── Bus input ────────────────────────────────────────────────────

    pub(crate) fn on_bulk_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        outcome: Outcome,
    ) -> Result<(), CoreError> {
        let Some(body) = reply_body(outcome, member::GET_SERVICES)? else {
            return Ok(());
        };
        self.apply_list(link, object_list(Cursor::new(&body))?);

        match self.refresh.as_mut() {
            Some(refresh) => {
                refresh.awaiting_fetch = false;
                self.complete_refresh(link);
            }
            None if self.refreshed => link.schedule(Task::ServicesRefreshed, Pending::Fire),
            None => {}
        }
        Ok(())
    }

    pub(crate) fn on_services_changed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let mut args = signal.args();
        let changed = object_list(args)?;
        args.advance();
        let removed = path_list(args)?;

        self.apply_list(link, changed);
        for path in &removed {
            self.evict(link, path);
        }
        if self.refreshed {
            link.schedule(Task::ServicesRefreshed, Pending::Fire);
        }
        Ok(())
    }

    pub(crate) fn on_property_changed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let Some(service) = self.lookup_mut(&signal.path) else {
            trace!(path = %signal.path, "property change for unknown service");
            return Ok(());
        };
        let mut args = signal.args();
        let name: String = args.get_basic()?;
        args.advance();
        service.apply(link, [(name.as_str(), args.get_variant()?)]);
        Ok(())
    }

    /// The wifi scan started by a refresh is over, one way or another.
    pub(crate) fn on_scan_finished<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        let Some(refresh) = self.refresh.as_mut() else {
            return;
        };
        if !refresh.awaiting_scan {
            return;
        }
        refresh.awaiting_scan = false;
        link.schedule(Task::ServicesScanned, Pending::Fire);
        self.complete_refresh(link);
    }

    pub(crate) fn on_set_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        property: ServiceProperty,
        call: CallId,
        outcome: Outcome,
    ) {
        let Some(slot) = self
            .services
            .get_mut(path)
            .and_then(|s| s.setters.get_mut(&property))
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
                    Task::ServiceSetFailed {
                        path: path.to_owned(),
                        property,
                    },
                    Pending::Failed(error),
                );
            }
            None => trace!(path, property = property.name(), "property set canceled"),
        }
    }

    // ── Notification delivery ────────────────────────────────────────

    pub(crate) fn notify_changed(
        &mut self,
        path: String,
        property: ServiceProperty,
        value: OwnedValue,
    ) {
        let Some(callback) = self
            .lookup_mut(&path)
            .and_then(|s| s.on_property_changed.as_mut())
        else {
            return;
        };
        callback(&PropertyChanged {
            path,
            property,
            value,
        });
    }

    pub(crate) fn notify_set_failed(
        &mut self,
        path: String,
        property: ServiceProperty,
        error: ErrorReply,
    ) {
        let Some(callback) = self
            .lookup_mut(&path)
            .and_then(|s| s.on_set_failed.as_mut())
        else {
            return;
        };
        callback(&SetFailed {
            path,
            property,
            error,
        });
    }

    pub(crate) fn notify_refreshed(&mut self) {
        if let Some(callback) = self.on_refreshed.as_mut() {
            callback();
        }
    }

    pub(crate) fn notify_scanned(&mut self) {
        if let Some(callback) = self.on_scanned.as_mut() {
            callback();
        }
    }

    // ── Outgoing calls ───────────────────────────────────────────────

    fn set_property<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        property: ServiceProperty,
        value: Value<'static>,
    ) -> Result<(), CoreError> {
        let service = self.service_mut(path)?;
        let slot = service.setters.entry(property).or_default();
        let call = link
            .method(path, protocol::SERVICE_INTERFACE, member::SET_PROPERTY)
            .with_args(|a| {
                a.append_keyed_value(property.name(), value);
            })?;
        let route = CallRoute::ServiceSet {
            path: path.to_owned(),
            property,
        };
        let id = link.issue_exclusive(slot, call, route, path)?;
        debug!(path, property = property.name(), call = %id, "setting service property");
        Ok(())
    }

    fn call_empty<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        path: &str,
        method: &str,
    ) -> Result<(), CoreError> {
        self.service_mut(path)?;
        debug!(path, method, "service call");
        let call = link.method(path, protocol::SERVICE_INTERFACE, method);
        link.send(call)
    }

    /// Drop every record except a selected one, which is detached.
    fn clear<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        self.order.clear();
        for (path, mut service) in self.services.drain() {
            if self.selection.is(&path) {
                service.quiesce(link);
                self.selection.detach(service);
            } else {
                service.destroy(link);
            }
        }
        self.refresh = None;
        self.refreshed = false;
        link.cancel_task(&Task::ServicesRefreshed);
        link.cancel_task(&Task::ServicesScanned);
    }

    fn deselect<B: Bus>(&mut self, link: &mut Link<'_, B>) -> Deselected {
        match std::mem::take(&mut self.selection) {
            Selection::None => Deselected::NoSelection,
            Selection::InRegistry(_) => Deselected::Retained,
            Selection::Detached(service) => {
                service.destroy(link);
                Deselected::Released
            }
        }
    }
}

// ── Public handle ───────────────────────────────────────────────────

/// Access to the service registry of a [`Session`].
pub struct ServicesHandle<'s, B: Bus> {
    session: &'s mut Session<B>,
}

impl<'s, B: Bus> ServicesHandle<'s, B> {
    pub(crate) fn new(session: &'s mut Session<B>) -> Self {
        Self { session }
    }

    fn registry(&self) -> Option<&ServiceRegistry> {
        self.session.service_registry()
    }

    fn record(&self, path: &str) -> Option<&ServiceRecord> {
        self.registry().and_then(|r| r.record(path))
    }

    fn with_registry<R>(
        &mut self,
        op: impl FnOnce(&mut ServiceRegistry, &mut Link<'_, B>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let Parts { mut link, services, .. } = self.session.parts();
        let registry = services
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("service registry"))?;
        op(registry, &mut link)
    }

    /// Create the registry. Requires an initialized manager; nothing is
    /// fetched until [`refresh`](Self::refresh). Calling `init` again
    /// while initialized does nothing.
    pub fn init(&mut self) -> Result<(), CoreError> {
        let Parts {
            manager, services, ..
        } = self.session.parts();
        if services.is_some() {
            debug!("service registry already initialized");
            return Ok(());
        }
        if manager.is_none() {
            return Err(CoreError::not_initialized("manager"));
        }
        *services = Some(ServiceRegistry::default());
        debug!("service registry initialized");
        Ok(())
    }

    /// Drop every service, including a detached selection, and stop
    /// following the service list.
    pub fn finalize(&mut self) {
        let Parts {
            mut link,
            manager,
            services,
            ..
        } = self.session.parts();
        let Some(mut registry) = services.take() else {
            return;
        };
        if let Some(manager) = manager.as_mut() {
            manager.cancel_services(&mut link);
            // Disabling never fails.
            let _ = manager.watch_services(&mut link, false);
        }
        registry.clear(&mut link);
        registry.deselect(&mut link);
        debug!("service registry finalized");
    }

    pub fn is_initialized(&self) -> bool {
        self.registry().is_some()
    }

    /// Fetch the service list and follow its changes.
    ///
    /// Needs at least one known technology. When an unpowered wifi
    /// technology exists (and scanning on refresh is enabled) it is
    /// scanned alongside the fetch: `on_scanned` runs when the scan ends
    /// and `on_refreshed` once both are done. Otherwise `on_scanned` runs
    /// right away and `on_refreshed` when the list arrives. After the
    /// first refresh, `on_refreshed` also runs on every list change.
    ///
    /// The remote side usually rejects scanning a radio that is powered
    /// off, so in the scanning case `on_scanned` typically follows a
    /// failed scan and the list comes from the fetch alone.
    pub fn refresh<R, S>(&mut self, on_refreshed: R, on_scanned: S) -> Result<(), CoreError>
    where
        R: FnMut() + Send + 'static,
        S: FnMut() + Send + 'static,
    {
        let Parts {
            mut link,
            manager,
            technologies,
            services,
            ..
        } = self.session.parts();
        let registry = services
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("service registry"))?;
        let manager = manager
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("manager"))?;
        let technologies = technologies
            .as_mut()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::invalid("no technologies known yet"))?;

        manager.watch_services(&mut link, true)?;
        registry.on_refreshed = Some(Box::new(on_refreshed));
        registry.on_scanned = Some(Box::new(on_scanned));
        registry.refreshed = false;

        let wifi = link
            .config
            .scan_on_refresh
            .then(|| technologies.unpowered_wifi().map(str::to_owned))
            .flatten();
        match wifi {
            Some(path) => {
                technologies.scan(&mut link, &path, ScanWaiter::ServiceRefresh)?;
                registry.refresh = Some(Refresh {
                    awaiting_scan: true,
                    awaiting_fetch: true,
                });
                debug!(technology = %path, "refreshing services with scan");
            }
            None => {
                registry.refresh = Some(Refresh {
                    awaiting_scan: false,
                    awaiting_fetch: true,
                });
                link.schedule(Task::ServicesScanned, Pending::Fire);
                debug!("refreshing services");
            }
        }
        manager.fetch_services(&mut link)
    }

    /// Forget the service list and stop following it. A selected service
    /// stays readable until deselected.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        let Parts {
            mut link,
            manager,
            services,
            ..
        } = self.session.parts();
        let registry = services
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("service registry"))?;
        if let Some(manager) = manager.as_mut() {
            manager.cancel_services(&mut link);
            manager.watch_services(&mut link, false)?;
        }
        registry.clear(&mut link);
        Ok(())
    }

    // ── Callbacks ────────────────────────────────────────────────────

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

    /// Called with the last changed property of each update batch for
    /// the service at `path`.
    pub fn on_service_changed<F>(&mut self, path: &str, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&PropertyChanged<ServiceProperty>) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            let service = registry
                .lookup_mut(path)
                .ok_or_else(|| CoreError::unknown_object("service", path))?;
            service.on_property_changed = Some(Box::new(callback));
            Ok(())
        })
    }

    pub fn on_set_failed<F>(&mut self, path: &str, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&SetFailed<ServiceProperty>) + Send + 'static,
    {
        self.with_registry(|registry, _| {
            registry.service_mut(path)?.on_set_failed = Some(Box::new(callback));
            Ok(())
        })
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn select(&mut self, path: &str) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            registry.service_mut(path)?;
            if registry.deselect(link) == Deselected::Released {
                debug!("previous detached selection released");
            }
            registry.selection = Selection::InRegistry(path.to_owned());
            Ok(())
        })
    }

    /// Clear the selection, freeing the record if the remote side removed
    /// it in the meantime.
    pub fn deselect(&mut self) -> Deselected {
        self.with_registry(|registry, link| Ok(registry.deselect(link)))
            .unwrap_or(Deselected::NoSelection)
    }

    pub fn selected(&self) -> Option<String> {
        self.registry()
            .and_then(|r| r.selection.path())
            .map(str::to_owned)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Service paths in the order the remote side last reported.
    pub fn list(&self) -> Vec<String> {
        self.registry().map(|r| r.order.clone()).unwrap_or_default()
    }

    pub fn get(&self, path: &str) -> Option<ServiceRecord> {
        self.record(path).cloned()
    }

    pub fn state(&self, path: &str) -> ConnState {
        self.record(path).map_or(ConnState::Unknown, |r| r.state)
    }

    pub fn is_connected(&self, path: &str) -> bool {
        self.record(path).is_some_and(ServiceRecord::is_connected)
    }

    pub fn error(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.error.clone())
    }

    pub fn name(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.name.clone())
    }

    pub fn kind(&self, path: &str) -> Option<String> {
        self.record(path).and_then(|r| r.kind.clone())
    }

    pub fn security(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.security)
    }

    pub fn strength(&self, path: &str) -> u8 {
        self.record(path).map_or(0, |r| r.strength)
    }

    pub fn is_favorite(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.favorite)
    }

    pub fn is_immutable(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.immutable)
    }

    pub fn is_autoconnect(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.autoconnect)
    }

    pub fn is_roaming(&self, path: &str) -> bool {
        self.record(path).is_some_and(|r| r.roaming)
    }

    fn list_field(
        &self,
        path: &str,
        field: impl FnOnce(&ServiceRecord) -> &Vec<String>,
    ) -> Vec<String> {
        self.record(path).map(field).cloned().unwrap_or_default()
    }

    pub fn nameservers(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.nameservers)
    }

    pub fn nameservers_config(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.nameservers_config)
    }

    pub fn timeservers(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.timeservers)
    }

    pub fn timeservers_config(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.timeservers_config)
    }

    pub fn domains(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.domains)
    }

    pub fn domains_config(&self, path: &str) -> Vec<String> {
        self.list_field(path, |r| &r.domains_config)
    }

    pub fn ipv4(&self, path: &str) -> Option<Ipv4Config> {
        self.record(path).and_then(|r| r.ipv4.clone())
    }

    pub fn ipv4_config(&self, path: &str) -> Option<Ipv4Config> {
        self.record(path).and_then(|r| r.ipv4_config.clone())
    }

    pub fn ipv6(&self, path: &str) -> Option<Ipv6Config> {
        self.record(path).and_then(|r| r.ipv6.clone())
    }

    pub fn ipv6_config(&self, path: &str) -> Option<Ipv6Config> {
        self.record(path).and_then(|r| r.ipv6_config.clone())
    }

    pub fn proxy(&self, path: &str) -> Option<ProxyConfig> {
        self.record(path).and_then(|r| r.proxy.clone())
    }

    pub fn proxy_config(&self, path: &str) -> Option<ProxyConfig> {
        self.record(path).and_then(|r| r.proxy_config.clone())
    }

    pub fn provider(&self, path: &str) -> Option<ProviderInfo> {
        self.record(path).and_then(|r| r.provider.clone())
    }

    pub fn ethernet(&self, path: &str) -> Option<EthernetInfo> {
        self.record(path).and_then(|r| r.ethernet.clone())
    }

    // ── Mutators ─────────────────────────────────────────────────────

    pub fn connect(&mut self, path: &str) -> Result<(), CoreError> {
        self.with_registry(|registry, link| registry.call_empty(link, path, member::CONNECT))
    }

    pub fn disconnect(&mut self, path: &str) -> Result<(), CoreError> {
        self.with_registry(|registry, link| registry.call_empty(link, path, member::DISCONNECT))
    }

    pub fn remove(&mut self, path: &str) -> Result<(), CoreError> {
        self.with_registry(|registry, link| registry.call_empty(link, path, member::REMOVE))
    }

    pub fn set_autoconnect(&mut self, path: &str, enable: bool) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            registry.set_property(link, path, ServiceProperty::AutoConnect, Value::Bool(enable))
        })
    }

    /// Set a configuration property unless `differs` says the cached
    /// configuration already matches.
    fn set_config(
        &mut self,
        path: &str,
        property: ServiceProperty,
        differs: impl FnOnce(&ServiceRecord) -> bool,
        value: impl FnOnce() -> Value<'static>,
    ) -> Result<(), CoreError> {
        self.with_registry(|registry, link| {
            if !differs(&registry.service_mut(path)?.record) {
                trace!(path, property = property.name(), "configuration unchanged");
                return Ok(());
            }
            registry.set_property(link, path, property, value())
        })
    }

    pub fn set_ipv4_config(&mut self, path: &str, config: &Ipv4Config) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::Ipv4Config,
            |r| r.ipv4_config.as_ref() != Some(config),
            || config.to_value(),
        )
    }

    pub fn set_ipv6_config(&mut self, path: &str, config: &Ipv6Config) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::Ipv6Config,
            |r| r.ipv6_config.as_ref() != Some(config),
            || config.to_value(),
        )
    }

    pub fn set_proxy_config(&mut self, path: &str, config: &ProxyConfig) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::ProxyConfig,
            |r| r.proxy_config.as_ref() != Some(config),
            || config.to_value(),
        )
    }

    pub fn set_nameservers_config(&mut self, path: &str, servers: &[String]) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::NameserversConfig,
            |r| r.nameservers_config != servers,
            || string_array(servers.iter().cloned()),
        )
    }

    pub fn set_domains_config(&mut self, path: &str, domains: &[String]) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::DomainsConfig,
            |r| r.domains_config != domains,
            || string_array(domains.iter().cloned()),
        )
    }

    pub fn set_timeservers_config(&mut self, path: &str, servers: &[String]) -> Result<(), CoreError> {
        self.set_config(
            path,
            ServiceProperty::TimeserversConfig,
            |r| r.timeservers_config != servers,
            || string_array(servers.iter().cloned()),
        )
    }
}
