//! The session context.
//!
//! A [`Session`] owns one bus connection and every component mirrored
//! over it. It is a plain state machine: the embedding loop feeds it
//! [`BusEvent`]s through [`Session::dispatch`] and calls
//! [`Session::run_pending`] once per iteration to deliver the
//! notifications those events produced. Components are reached through
//! short-lived handles ([`Session::manager`], [`Session::technologies`],
//! [`Session::services`], [`Session::agent`]).

use std::collections::HashMap;

use connui_bus::{
    Bus, BusEvent, CallId, Cursor, ErrorReply, IncomingCall, MethodCall, OwnedValue, Reply,
    Signal, SignalRule, WatchId,
};
use tracing::{debug, trace, warn};

use crate::agent::{Agent, AgentHandle};
use crate::call_slot::CallSlot;
use crate::config::SessionConfig;
use crate::deferred::DeferredQueue;
use crate::error::CoreError;
use crate::manager::{Manager, ManagerHandle};
use crate::model::{ManagerProperty, ServiceProperty, TechnologyProperty};
use crate::protocol::{self, member};
use crate::service::{ServiceRegistry, ServicesHandle};
use crate::technology::{TechnologiesHandle, TechnologyRegistry};

// ── Call routing ────────────────────────────────────────────────────

/// Where the reply to an outstanding call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallRoute {
    NameOwner,
    ManagerProperties,
    Technologies,
    Services,
    TechnologyScan {
        path: String,
    },
    TechnologySet {
        path: String,
        property: TechnologyProperty,
    },
    ServiceSet {
        path: String,
        property: ServiceProperty,
    },
}

/// What came back for a call: `None` when it was canceled by the
/// transport, otherwise the reply body or the remote error.
pub(crate) type Outcome = Option<Result<Vec<OwnedValue>, ErrorReply>>;

/// Unwrap a bulk reply. Cancellation yields `Ok(None)`.
pub(crate) fn reply_body(
    outcome: Outcome,
    member: &str,
) -> Result<Option<Vec<OwnedValue>>, CoreError> {
    match outcome {
        Some(Ok(body)) => Ok(Some(body)),
        Some(Err(error)) => Err(CoreError::RemoteRejected(error)),
        None => {
            debug!(member, "call canceled before reply");
            Ok(None)
        }
    }
}

// ── Deferred tasks ──────────────────────────────────────────────────

/// Key of a deferred notification. One pending task per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Task {
    Availability,
    Manager(ManagerProperty),
    TechnologyChanged {
        path: String,
        property: TechnologyProperty,
    },
    TechnologySetFailed {
        path: String,
        property: TechnologyProperty,
    },
    ServiceChanged {
        path: String,
        property: ServiceProperty,
    },
    ServiceSetFailed {
        path: String,
        property: ServiceProperty,
    },
    ServicesRefreshed,
    ServicesScanned,
}

impl Task {
    fn is_technology(&self, of: &str) -> bool {
        match self {
            Self::TechnologyChanged { path, .. } | Self::TechnologySetFailed { path, .. } => {
                path == of
            }
            _ => false,
        }
    }

    fn is_service(&self, of: &str) -> bool {
        match self {
            Self::ServiceChanged { path, .. } | Self::ServiceSetFailed { path, .. } => path == of,
            _ => false,
        }
    }
}

/// Payload carried by a deferred task.
#[derive(Debug)]
pub(crate) enum Pending {
    Changed(OwnedValue),
    Failed(ErrorReply),
    Presence(bool),
    Fire,
}

// ── Link ────────────────────────────────────────────────────────────

/// Everything a component needs to talk to the bus, split off the
/// session so components can be borrowed alongside it.
pub(crate) struct Link<'s, B: Bus> {
    pub(crate) bus: &'s mut B,
    pub(crate) config: &'s SessionConfig,
    routes: &'s mut HashMap<CallId, CallRoute>,
    deferred: &'s mut DeferredQueue<Task, Pending>,
}

impl<B: Bus> Link<'_, B> {
    /// A method call to the remote service.
    pub(crate) fn method(&self, path: &str, interface: &str, member: &str) -> MethodCall {
        MethodCall::new(self.config.service_name.as_str(), path, interface, member)
    }

    /// Signal rule for `member` on `interface`, sent by the remote service.
    pub(crate) fn rule(&self, interface: &str, member: &str) -> SignalRule {
        SignalRule::new(interface, member).sender(self.config.service_name.as_str())
    }

    /// Issue a call through `slot`, replacing whatever it held.
    pub(crate) fn issue(
        &mut self,
        slot: &mut CallSlot,
        call: MethodCall,
        route: CallRoute,
    ) -> Result<CallId, CoreError> {
        if let Some(old) = slot.pending() {
            self.routes.remove(&old);
        }
        let (id, _) = slot.issue(&mut *self.bus, call)?;
        self.routes.insert(id, route);
        Ok(id)
    }

    /// Issue a call through `slot` only if nothing is outstanding on it.
    pub(crate) fn issue_exclusive(
        &mut self,
        slot: &mut CallSlot,
        call: MethodCall,
        route: CallRoute,
        path: &str,
    ) -> Result<CallId, CoreError> {
        let id = slot.issue_exclusive(&mut *self.bus, call, path)?;
        self.routes.insert(id, route);
        Ok(id)
    }

    pub(crate) fn cancel(&mut self, slot: &mut CallSlot) {
        if let Some(id) = slot.cancel(&mut *self.bus) {
            self.routes.remove(&id);
        }
    }

    pub(crate) fn send(&mut self, call: MethodCall) -> Result<(), CoreError> {
        Ok(self.bus.send(call)?)
    }

    pub(crate) fn reply(&mut self, reply: Reply) -> Result<(), CoreError> {
        Ok(self.bus.reply(reply)?)
    }

    pub(crate) fn watch(&mut self, rule: SignalRule) -> Result<WatchId, CoreError> {
        Ok(self.bus.add_watch(rule)?)
    }

    pub(crate) fn unwatch(&mut self, watch: WatchId) {
        self.bus.remove_watch(watch);
    }

    /// Export the agent object at `path`.
    pub(crate) fn export(&mut self, path: &str) -> Result<(), CoreError> {
        Ok(self.bus.export_object(path, protocol::AGENT_INTERFACE)?)
    }

    pub(crate) fn unexport(&mut self, path: &str) {
        self.bus.unexport_object(path, protocol::AGENT_INTERFACE);
    }

    pub(crate) fn schedule(&mut self, task: Task, pending: Pending) {
        trace!(?task, "scheduling notification");
        if self.deferred.schedule(task, pending) {
            trace!("collapsed into pending notification");
        }
    }

    pub(crate) fn cancel_manager_tasks(&mut self) {
        self.deferred
            .cancel_where(|task| matches!(task, Task::Manager(_)));
    }

    pub(crate) fn cancel_technology_tasks(&mut self, path: &str) {
        self.deferred.cancel_where(|task| task.is_technology(path));
    }

    pub(crate) fn cancel_service_tasks(&mut self, path: &str) {
        self.deferred.cancel_where(|task| task.is_service(path));
    }

    pub(crate) fn cancel_task(&mut self, task: &Task) {
        self.deferred.cancel_where(|t| t == task);
    }
}

// ── Availability ────────────────────────────────────────────────────

/// Whether the remote service currently owns its bus name.
pub(crate) struct Availability {
    watch: Option<WatchId>,
    /// Startup `GetNameOwner` lookup.
    lookup: CallSlot,
    present: bool,
    callback: Option<Box<dyn FnMut(bool) + Send>>,
}

impl Availability {
    fn set_present<B: Bus>(&mut self, link: &mut Link<'_, B>, present: bool) {
        if present != self.present {
            debug!(service = %link.config.service_name, present, "service availability changed");
            self.present = present;
            link.schedule(Task::Availability, Pending::Presence(present));
        }
    }

    fn on_name_owner_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        call: CallId,
        outcome: Outcome,
    ) -> Result<(), CoreError> {
        if !self.lookup.complete(call) {
            return Ok(());
        }
        match outcome {
            Some(Ok(body)) => {
                let owner: String = Cursor::new(&body).get_basic()?;
                self.set_present(link, !owner.is_empty());
            }
            Some(Err(error)) if error.name == protocol::DBUS_NAME_HAS_NO_OWNER => {
                trace!(service = %link.config.service_name, "service not on the bus yet");
                self.set_present(link, false);
            }
            Some(Err(error)) => {
                warn!(%error, "name owner lookup failed");
                self.set_present(link, false);
            }
            None => debug!("name owner lookup canceled"),
        }
        Ok(())
    }

    fn on_name_owner_changed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let mut args = signal.args();
        let name: String = args.get_basic()?;
        if name != link.config.service_name {
            return Ok(());
        }
        args.advance();
        args.advance();
        let new_owner: String = args.get_basic()?;
        link.cancel(&mut self.lookup);
        self.set_present(link, !new_owner.is_empty());
        Ok(())
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// All state mirrored over one bus connection.
///
/// The session takes the bus by value, so there is exactly one session
/// per connection.
pub struct Session<B: Bus> {
    bus: B,
    config: SessionConfig,
    routes: HashMap<CallId, CallRoute>,
    deferred: DeferredQueue<Task, Pending>,
    availability: Availability,
    manager: Option<Manager>,
    technologies: Option<TechnologyRegistry>,
    services: Option<ServiceRegistry>,
    agent: Option<Agent>,
}

/// Disjoint borrows of a session's parts.
pub(crate) struct Parts<'s, B: Bus> {
    pub(crate) link: Link<'s, B>,
    pub(crate) manager: &'s mut Option<Manager>,
    pub(crate) technologies: &'s mut Option<TechnologyRegistry>,
    pub(crate) services: &'s mut Option<ServiceRegistry>,
    pub(crate) agent: &'s mut Option<Agent>,
    pub(crate) availability: &'s mut Availability,
}

impl<B: Bus> Session<B> {
    /// Attach to `bus`, look up the current owner of the service name and
    /// start watching for ownership changes.
    ///
    /// Until the lookup answers the service is reported as absent; the
    /// first [`run_pending`](Self::run_pending) delivers whatever is known
    /// by then.
    pub fn new(mut bus: B, config: SessionConfig) -> Result<Self, CoreError> {
        let rule = SignalRule::new(protocol::DBUS_INTERFACE, member::NAME_OWNER_CHANGED)
            .sender(protocol::DBUS_SERVICE)
            .path(protocol::DBUS_PATH)
            .arg0(config.service_name.as_str());
        let watch = bus.add_watch(rule)?;

        let lookup_call = MethodCall::new(
            protocol::DBUS_SERVICE,
            protocol::DBUS_PATH,
            protocol::DBUS_INTERFACE,
            member::GET_NAME_OWNER,
        )
        .with_args(|a| {
            a.append_basic(config.service_name.clone());
        })?;
        let mut lookup = CallSlot::default();
        let (lookup_id, _) = lookup.issue(&mut bus, lookup_call)?;
        let mut routes = HashMap::new();
        routes.insert(lookup_id, CallRoute::NameOwner);

        let mut deferred = DeferredQueue::default();
        deferred.schedule(Task::Availability, Pending::Presence(false));
        debug!(service = %config.service_name, "session attached");

        Ok(Self {
            bus,
            config,
            routes,
            deferred,
            availability: Availability {
                watch: Some(watch),
                lookup,
                present: false,
                callback: None,
            },
            manager: None,
            technologies: None,
            services: None,
            agent: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Whether the remote service was last seen on the bus.
    pub fn is_available(&self) -> bool {
        self.availability.present
    }

    /// Be told when the remote service appears (`true`) or vanishes
    /// (`false`) from the bus.
    pub fn on_availability<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.availability.callback = Some(Box::new(callback));
    }

    pub fn manager(&mut self) -> ManagerHandle<'_, B> {
        ManagerHandle::new(self)
    }

    pub fn technologies(&mut self) -> TechnologiesHandle<'_, B> {
        TechnologiesHandle::new(self)
    }

    pub fn services(&mut self) -> ServicesHandle<'_, B> {
        ServicesHandle::new(self)
    }

    pub fn agent(&mut self) -> AgentHandle<'_, B> {
        AgentHandle::new(self)
    }

    /// Number of notifications waiting for [`run_pending`](Self::run_pending).
    pub fn pending_notifications(&self) -> usize {
        self.deferred.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Number of calls still waiting for a reply.
    pub fn outstanding_calls(&self) -> usize {
        self.routes.len()
    }

    pub(crate) fn parts(&mut self) -> Parts<'_, B> {
        Parts {
            link: Link {
                bus: &mut self.bus,
                config: &self.config,
                routes: &mut self.routes,
                deferred: &mut self.deferred,
            },
            manager: &mut self.manager,
            technologies: &mut self.technologies,
            services: &mut self.services,
            agent: &mut self.agent,
            availability: &mut self.availability,
        }
    }

    pub(crate) fn manager_state(&self) -> Option<&Manager> {
        self.manager.as_ref()
    }

    pub(crate) fn technology_registry(&self) -> Option<&TechnologyRegistry> {
        self.technologies.as_ref()
    }

    pub(crate) fn service_registry(&self) -> Option<&ServiceRegistry> {
        self.services.as_ref()
    }

    pub(crate) fn agent_state(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    // ── Event intake ─────────────────────────────────────────────────

    /// Process one event from the transport. Failures are logged; they
    /// never poison the session.
    pub fn dispatch(&mut self, event: BusEvent) {
        let result = match event {
            BusEvent::Reply { call, outcome } => self.on_reply(call, Some(outcome)),
            BusEvent::CallCanceled { call } => self.on_reply(call, None),
            BusEvent::Signal(signal) => self.on_signal(&signal),
            BusEvent::MethodCall(call) => self.on_method_call(call),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to process bus event");
        }
    }

    fn on_reply(&mut self, call: CallId, outcome: Outcome) -> Result<(), CoreError> {
        let Some(route) = self.routes.remove(&call) else {
            trace!(%call, "reply for a call nobody waits on");
            return Ok(());
        };
        let Parts {
            mut link,
            manager,
            technologies,
            services,
            availability,
            ..
        } = self.parts();

        match route {
            CallRoute::NameOwner => availability.on_name_owner_reply(&mut link, call, outcome),
            CallRoute::ManagerProperties => match manager.as_mut() {
                Some(manager) => manager.on_properties_reply(&mut link, call, outcome),
                None => Ok(()),
            },
            CallRoute::Technologies => {
                let Some(manager) = manager.as_mut() else {
                    return Ok(());
                };
                if !manager.complete_technologies(call) {
                    return Ok(());
                }
                let Some(body) = reply_body(outcome, member::GET_TECHNOLOGIES)? else {
                    return Ok(());
                };
                match technologies.as_mut() {
                    Some(registry) => registry.on_bulk_reply(&mut link, manager, &body),
                    None => Ok(()),
                }
            }
            CallRoute::Services => {
                let Some(manager) = manager.as_mut() else {
                    return Ok(());
                };
                if !manager.complete_services(call) {
                    return Ok(());
                }
                let Some(registry) = services.as_mut() else {
                    return Ok(());
                };
                registry.on_bulk_reply(&mut link, outcome)
            }
            CallRoute::TechnologyScan { path } => {
                let Some(registry) = technologies.as_mut() else {
                    return Ok(());
                };
                if registry.on_scan_reply(&path, call, outcome) {
                    if let Some(services) = services.as_mut() {
                        services.on_scan_finished(&mut link);
                    }
                }
                Ok(())
            }
            CallRoute::TechnologySet { path, property } => {
                if let Some(registry) = technologies.as_mut() {
                    registry.on_set_reply(&mut link, &path, property, call, outcome);
                }
                Ok(())
            }
            CallRoute::ServiceSet { path, property } => {
                if let Some(registry) = services.as_mut() {
                    registry.on_set_reply(&mut link, &path, property, call, outcome);
                }
                Ok(())
            }
        }
    }

    fn on_signal(&mut self, signal: &Signal) -> Result<(), CoreError> {
        let Parts {
            mut link,
            manager,
            technologies,
            services,
            availability,
            ..
        } = self.parts();

        match (signal.interface.as_str(), signal.member.as_str()) {
            (protocol::DBUS_INTERFACE, member::NAME_OWNER_CHANGED) => {
                availability.on_name_owner_changed(&mut link, signal)
            }
            (protocol::MANAGER_INTERFACE, member::PROPERTY_CHANGED) => {
                match manager.as_mut() {
                    Some(manager) if signal.path == link.config.manager_path => {
                        manager.on_property_changed(&mut link, signal)
                    }
                    _ => Ok(()),
                }
            }
            (protocol::MANAGER_INTERFACE, member::TECHNOLOGY_ADDED) => {
                let watching = manager.as_ref().is_some_and(Manager::watching_technologies);
                match technologies.as_mut() {
                    Some(registry) if watching => registry.on_added(&mut link, signal),
                    _ => Ok(()),
                }
            }
            (protocol::MANAGER_INTERFACE, member::TECHNOLOGY_REMOVED) => {
                let watching = manager.as_ref().is_some_and(Manager::watching_technologies);
                let Some(registry) = technologies.as_mut().filter(|_| watching) else {
                    return Ok(());
                };
                if registry.on_removed(&mut link, signal)? {
                    if let Some(services) = services.as_mut() {
                        services.on_scan_finished(&mut link);
                    }
                }
                Ok(())
            }
            (protocol::MANAGER_INTERFACE, member::SERVICES_CHANGED) => {
                let watching = manager.as_ref().is_some_and(Manager::watching_services);
                match services.as_mut() {
                    Some(registry) if watching => registry.on_services_changed(&mut link, signal),
                    _ => Ok(()),
                }
            }
            (protocol::TECHNOLOGY_INTERFACE, member::PROPERTY_CHANGED) => {
                match technologies.as_mut() {
                    Some(registry) => registry.on_property_changed(&mut link, signal),
                    None => Ok(()),
                }
            }
            (protocol::SERVICE_INTERFACE, member::PROPERTY_CHANGED) => match services.as_mut() {
                Some(registry) => registry.on_property_changed(&mut link, signal),
                None => Ok(()),
            },
            (interface, name) => {
                trace!(interface, member = name, path = %signal.path, "unhandled signal");
                Ok(())
            }
        }
    }

    fn on_method_call(&mut self, call: IncomingCall) -> Result<(), CoreError> {
        let Parts {
            mut link, agent, ..
        } = self.parts();

        let Some(active) = agent.as_mut().filter(|a| a.handles(&call)) else {
            debug!(path = %call.path, member = %call.member, "no handler for incoming call");
            return link.reply(Reply::error(
                call.token,
                protocol::DBUS_UNKNOWN_METHOD,
                format!("no method {} on {}", call.member, call.path),
            ));
        };
        if active.on_method_call(&mut link, call)? {
            *agent = None;
        }
        Ok(())
    }

    // ── Notification delivery ────────────────────────────────────────

    /// Deliver every queued notification. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let tasks = self.deferred.drain();
        let count = tasks.len();
        for (task, pending) in tasks {
            self.deliver(task, pending);
        }
        count
    }

    fn deliver(&mut self, task: Task, pending: Pending) {
        match (task, pending) {
            (Task::Availability, Pending::Presence(present)) => {
                if let Some(callback) = self.availability.callback.as_mut() {
                    callback(present);
                }
            }
            (Task::Manager(property), Pending::Changed(value)) => {
                if let Some(manager) = self.manager.as_mut() {
                    manager.notify(&self.config.manager_path, property, value);
                }
            }
            (Task::TechnologyChanged { path, property }, Pending::Changed(value)) => {
                if let Some(registry) = self.technologies.as_mut() {
                    registry.notify_changed(path, property, value);
                }
            }
            (Task::TechnologySetFailed { path, property }, Pending::Failed(error)) => {
                if let Some(registry) = self.technologies.as_mut() {
                    registry.notify_set_failed(path, property, error);
                }
            }
            (Task::ServiceChanged { path, property }, Pending::Changed(value)) => {
                if let Some(registry) = self.services.as_mut() {
                    registry.notify_changed(path, property, value);
                }
            }
            (Task::ServiceSetFailed { path, property }, Pending::Failed(error)) => {
                if let Some(registry) = self.services.as_mut() {
                    registry.notify_set_failed(path, property, error);
                }
            }
            (Task::ServicesRefreshed, _) => {
                if let Some(registry) = self.services.as_mut() {
                    registry.notify_refreshed();
                }
            }
            (Task::ServicesScanned, _) => {
                if let Some(registry) = self.services.as_mut() {
                    registry.notify_scanned();
                }
            }
            (task, pending) => warn!(?task, ?pending, "notification with mismatched payload"),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Finalize every component, stop watching the service and hand the
    /// bus connection back.
    pub fn shutdown(mut self) -> B {
        self.agent().finalize();
        self.services().finalize();
        self.technologies().finalize();
        self.manager().finalize();
        if let Some(id) = self.availability.lookup.cancel(&mut self.bus) {
            self.routes.remove(&id);
        }
        if let Some(watch) = self.availability.watch.take() {
            self.bus.remove_watch(watch);
        }
        debug!("session detached");
        self.bus
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use connui_bus::{MockBus, Value, into_body};

    use super::*;

    fn owner_changed(name: &str, new_owner: &str) -> BusEvent {
        BusEvent::Signal(Signal::new(
            protocol::DBUS_PATH,
            protocol::DBUS_INTERFACE,
            member::NAME_OWNER_CHANGED,
            into_body([
                Value::from(name.to_owned()),
                Value::from(""),
                Value::from(new_owner.to_owned()),
            ])
            .unwrap(),
        ))
    }

    fn name_owner_lookup(session: &Session<MockBus>) -> CallId {
        session.bus().last_call(member::GET_NAME_OWNER).unwrap()
    }

    fn recorded(session: &mut Session<MockBus>) -> Arc<Mutex<Vec<bool>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.on_availability(move |present| sink.lock().unwrap().push(present));
        seen
    }

    #[test]
    fn availability_starts_absent_and_follows_name_owner() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let seen = recorded(&mut session);

        assert!(session.bus().is_watching(protocol::DBUS_INTERFACE, member::NAME_OWNER_CHANGED));
        assert_eq!(session.run_pending(), 1);

        session.dispatch(owner_changed("net.connman", ":1.9"));
        session.dispatch(owner_changed("org.other", ""));
        session.run_pending();
        assert!(session.is_available());

        session.dispatch(owner_changed("net.connman", ""));
        session.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn startup_lookup_reports_a_running_service() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let seen = recorded(&mut session);

        let lookup = name_owner_lookup(&session);
        let (_, call) = &session.bus().calls[0];
        assert_eq!(call.destination, protocol::DBUS_SERVICE);
        assert_eq!(call.args().get_basic::<String>().unwrap(), "net.connman");
        assert_eq!(session.outstanding_calls(), 1);

        session.dispatch(BusEvent::Reply {
            call: lookup,
            outcome: Ok(into_body([Value::from(":1.4")]).unwrap()),
        });
        assert!(session.is_available());
        assert_eq!(session.outstanding_calls(), 0);
        assert_eq!(session.run_pending(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[test]
    fn startup_lookup_without_owner_stays_absent() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let seen = recorded(&mut session);

        let lookup = name_owner_lookup(&session);
        session.dispatch(BusEvent::Reply {
            call: lookup,
            outcome: Err(ErrorReply::new(
                protocol::DBUS_NAME_HAS_NO_OWNER,
                "Could not get owner of name 'net.connman'",
            )),
        });
        assert!(!session.is_available());
        session.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn owner_change_supersedes_the_startup_lookup() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let lookup = name_owner_lookup(&session);

        session.dispatch(owner_changed("net.connman", ":1.9"));
        assert!(session.bus().canceled.contains(&lookup));
        assert_eq!(session.outstanding_calls(), 0);

        session.dispatch(BusEvent::Reply {
            call: lookup,
            outcome: Ok(into_body([Value::from("")]).unwrap()),
        });
        assert!(session.is_available());
    }

    #[test]
    fn failed_reissue_drops_the_replaced_route() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let mut slot = CallSlot::default();
        let get_services = || {
            MethodCall::new(
                protocol::SERVICE,
                protocol::MANAGER_PATH,
                protocol::MANAGER_INTERFACE,
                member::GET_SERVICES,
            )
        };

        let before = session.outstanding_calls();
        session
            .parts()
            .link
            .issue(&mut slot, get_services(), CallRoute::Services)
            .unwrap();
        assert_eq!(session.outstanding_calls(), before + 1);

        session.bus_mut().fail_next = true;
        assert!(
            session
                .parts()
                .link
                .issue(&mut slot, get_services(), CallRoute::Services)
                .is_err()
        );
        assert_eq!(session.outstanding_calls(), before);
        assert!(!slot.is_pending());
    }

    #[test]
    fn reply_for_unknown_call_is_ignored() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        session.run_pending();
        session.dispatch(BusEvent::Reply {
            call: CallId(999),
            outcome: Ok(Vec::new()),
        });
        assert_eq!(session.pending_notifications(), 0);
    }

    #[test]
    fn incoming_call_without_agent_gets_unknown_method() {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        session.dispatch(BusEvent::MethodCall(IncomingCall {
            token: connui_bus::ReplyToken {
                sender: ":1.2".into(),
                serial: 5,
            },
            path: protocol::AGENT_PATH.into(),
            interface: protocol::AGENT_INTERFACE.into(),
            member: member::RELEASE.into(),
            body: Vec::new(),
        }));
        let Reply::Error { error, .. } = &session.bus().replies[0] else {
            panic!("expected an error reply");
        };
        assert_eq!(error.name, protocol::DBUS_UNKNOWN_METHOD);
    }

    #[test]
    fn shutdown_removes_the_service_watch() {
        let session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        let bus = session.shutdown();
        assert_eq!(bus.watch_count(), 0);
    }
}
