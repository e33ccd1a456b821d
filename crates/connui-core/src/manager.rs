// ── Manager ──
//
// Global connectivity state of the remote service and the signal
// multiplexer the technology and service registries go through. The
// manager owns the bulk-fetch slots for both registries, so re-issuing
// either fetch replaces the outstanding one.

use connui_bus::{
    Bus, CallId, Cursor, OwnedValue, Signal, Value, ValueExt, WatchId, object_path, peel,
    to_owned_value,
};
use tracing::{debug, trace, warn};

use crate::call_slot::CallSlot;
use crate::error::CoreError;
use crate::events::{Callback, PropertyChanged};
use crate::model::{ConnState, ManagerProperty};
use crate::protocol::{self, member};
use crate::session::{CallRoute, Link, Outcome, Parts, Pending, Session, Task, reply_body};

pub(crate) struct Manager {
    state: ConnState,
    offline_mode: bool,
    properties: CallSlot,
    property_watch: Option<WatchId>,
    technologies: CallSlot,
    technology_watches: Option<[WatchId; 2]>,
    services: CallSlot,
    services_watch: Option<WatchId>,
    on_property_changed: Option<Callback<PropertyChanged<ManagerProperty>>>,
}

impl Manager {
    fn attach<B: Bus>(
        link: &mut Link<'_, B>,
        on_property_changed: Option<Callback<PropertyChanged<ManagerProperty>>>,
    ) -> Result<Self, CoreError> {
        let manager_path = link.config.manager_path.clone();
        let rule = link
            .rule(protocol::MANAGER_INTERFACE, member::PROPERTY_CHANGED)
            .path(manager_path.as_str());
        let watch = link.watch(rule)?;

        let mut manager = Self {
            state: ConnState::Unknown,
            offline_mode: true,
            properties: CallSlot::default(),
            property_watch: Some(watch),
            technologies: CallSlot::default(),
            technology_watches: None,
            services: CallSlot::default(),
            services_watch: None,
            on_property_changed,
        };

        let call = link.method(
            &manager_path,
            protocol::MANAGER_INTERFACE,
            member::GET_PROPERTIES,
        );
        if let Err(e) = link.issue(&mut manager.properties, call, CallRoute::ManagerProperties) {
            link.unwatch(watch);
            return Err(e);
        }
        debug!(path = %manager_path, "manager attached");
        Ok(manager)
    }

    fn detach<B: Bus>(mut self, link: &mut Link<'_, B>) {
        link.cancel(&mut self.properties);
        link.cancel(&mut self.technologies);
        link.cancel(&mut self.services);
        if let Some(watch) = self.property_watch.take() {
            link.unwatch(watch);
        }
        // Best effort: unwatching cannot fail.
        let _ = self.watch_technologies(link, false);
        let _ = self.watch_services(link, false);
        link.cancel_manager_tasks();
        debug!("manager detached");
    }

    pub(crate) fn state(&self) -> ConnState {
        self.state
    }

    pub(crate) fn offline_mode(&self) -> bool {
        self.offline_mode
    }

    // ── Properties ───────────────────────────────────────────────────

    fn apply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        name: &str,
        value: &Value<'static>,
    ) -> Result<(), CoreError> {
        let property = match name {
            "State" => {
                self.state = ConnState::from_wire(&value.get::<String>()?);
                ManagerProperty::State
            }
            "OfflineMode" => {
                self.offline_mode = value.get()?;
                ManagerProperty::OfflineMode
            }
            other => {
                trace!(property = other, "ignoring manager property");
                return Ok(());
            }
        };
        link.schedule(
            Task::Manager(property),
            Pending::Changed(to_owned_value(peel(value))?),
        );
        Ok(())
    }

    pub(crate) fn on_properties_reply<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        call: CallId,
        outcome: Outcome,
    ) -> Result<(), CoreError> {
        if !self.properties.complete(call) {
            return Ok(());
        }
        let Some(body) = reply_body(outcome, member::GET_PROPERTIES)? else {
            return Ok(());
        };
        let dict = Cursor::new(&body).get_dict()?;
        for (name, value) in dict.iter() {
            if let Err(e) = self.apply(link, name, value) {
                warn!(property = name, error = %e, "malformed manager property");
            }
        }
        Ok(())
    }

    pub(crate) fn on_property_changed<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        signal: &Signal,
    ) -> Result<(), CoreError> {
        let mut args = signal.args();
        let name: String = args.get_basic()?;
        args.advance();
        let value = args.get_variant()?;
        self.apply(link, &name, value)
    }

    pub(crate) fn notify(&mut self, path: &str, property: ManagerProperty, value: OwnedValue) {
        if let Some(callback) = self.on_property_changed.as_mut() {
            callback(&PropertyChanged {
                path: path.to_owned(),
                property,
                value,
            });
        }
    }

    // ── Technologies ─────────────────────────────────────────────────

    pub(crate) fn fetch_technologies<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
    ) -> Result<(), CoreError> {
        let call = link.method(
            &link.config.manager_path,
            protocol::MANAGER_INTERFACE,
            member::GET_TECHNOLOGIES,
        );
        let id = link.issue(&mut self.technologies, call, CallRoute::Technologies)?;
        debug!(call = %id, "fetching technologies");
        Ok(())
    }

    pub(crate) fn complete_technologies(&mut self, call: CallId) -> bool {
        self.technologies.complete(call)
    }

    pub(crate) fn cancel_technologies<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        link.cancel(&mut self.technologies);
    }

    /// Start or stop watching `TechnologyAdded` and `TechnologyRemoved`.
    pub(crate) fn watch_technologies<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        enable: bool,
    ) -> Result<(), CoreError> {
        if !enable {
            if let Some(watches) = self.technology_watches.take() {
                watches.into_iter().for_each(|w| link.unwatch(w));
            }
            return Ok(());
        }
        if self.technology_watches.is_some() {
            return Ok(());
        }

        let path = link.config.manager_path.clone();
        let added = link.watch(
            link.rule(protocol::MANAGER_INTERFACE, member::TECHNOLOGY_ADDED)
                .path(path.as_str()),
        )?;
        let removed = match link.watch(
            link.rule(protocol::MANAGER_INTERFACE, member::TECHNOLOGY_REMOVED)
                .path(path.as_str()),
        ) {
            Ok(watch) => watch,
            Err(e) => {
                link.unwatch(added);
                return Err(e);
            }
        };
        self.technology_watches = Some([added, removed]);
        Ok(())
    }

    pub(crate) fn watching_technologies(&self) -> bool {
        self.technology_watches.is_some()
    }

    // ── Services ─────────────────────────────────────────────────────

    pub(crate) fn fetch_services<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
    ) -> Result<(), CoreError> {
        let call = link.method(
            &link.config.manager_path,
            protocol::MANAGER_INTERFACE,
            member::GET_SERVICES,
        );
        let id = link.issue(&mut self.services, call, CallRoute::Services)?;
        debug!(call = %id, "fetching services");
        Ok(())
    }

    pub(crate) fn complete_services(&mut self, call: CallId) -> bool {
        self.services.complete(call)
    }

    pub(crate) fn cancel_services<B: Bus>(&mut self, link: &mut Link<'_, B>) {
        link.cancel(&mut self.services);
    }

    /// Start or stop watching `ServicesChanged`.
    pub(crate) fn watch_services<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        enable: bool,
    ) -> Result<(), CoreError> {
        match (enable, self.services_watch) {
            (true, None) => {
                let rule = link
                    .rule(protocol::MANAGER_INTERFACE, member::SERVICES_CHANGED)
                    .path(link.config.manager_path.as_str());
                self.services_watch = Some(link.watch(rule)?);
            }
            (false, Some(watch)) => {
                link.unwatch(watch);
                self.services_watch = None;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn watching_services(&self) -> bool {
        self.services_watch.is_some()
    }

    // ── One-shot sends ───────────────────────────────────────────────

    fn set_offline_mode<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        offline: bool,
    ) -> Result<(), CoreError> {
        let call = link
            .method(
                &link.config.manager_path,
                protocol::MANAGER_INTERFACE,
                member::SET_PROPERTY,
            )
            .with_args(|a| {
                a.append_keyed(ManagerProperty::OfflineMode.name(), offline);
            })?;
        link.send(call)
    }

    pub(crate) fn send_agent<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        method: &str,
        agent_path: &str,
    ) -> Result<(), CoreError> {
        let path = object_path(agent_path)?;
        let call = link
            .method(&link.config.manager_path, protocol::MANAGER_INTERFACE, method)
            .with_args(|a| {
                a.append_basic(path);
            })?;
        debug!(method, agent = agent_path, "agent registration");
        link.send(call)
    }
}

// ── Public handle ───────────────────────────────────────────────────

/// Access to the manager component of a [`Session`].
pub struct ManagerHandle<'s, B: Bus> {
    session: &'s mut Session<B>,
}

impl<'s, B: Bus> ManagerHandle<'s, B> {
    pub(crate) fn new(session: &'s mut Session<B>) -> Self {
        Self { session }
    }

    fn with_manager<R>(
        &mut self,
        op: impl FnOnce(&mut Manager, &mut Link<'_, B>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let Parts {
            mut link, manager, ..
        } = self.session.parts();
        let manager = manager
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("manager"))?;
        op(manager, &mut link)
    }

    /// Fetch the manager properties and start following their changes.
    /// `on_property_changed` runs once per changed property after each
    /// batch of updates. Calling `init` again while initialized does
    /// nothing.
    pub fn init<F>(&mut self, on_property_changed: F) -> Result<(), CoreError>
    where
        F: FnMut(&PropertyChanged<ManagerProperty>) + Send + 'static,
    {
        let Parts {
            mut link, manager, ..
        } = self.session.parts();
        if manager.is_some() {
            debug!("manager already initialized");
            return Ok(());
        }
        *manager = Some(Manager::attach(
            &mut link,
            Some(Box::new(on_property_changed)),
        )?);
        Ok(())
    }

    /// Cancel outstanding calls, drop every manager watch and forget the
    /// cached state.
    pub fn finalize(&mut self) {
        let Parts {
            mut link, manager, ..
        } = self.session.parts();
        if let Some(manager) = manager.take() {
            manager.detach(&mut link);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.manager_state().is_some()
    }

    /// Connectivity state; `Unknown` until the manager is initialized
    /// and has heard from the remote service.
    pub fn state(&self) -> ConnState {
        self.session
            .manager_state()
            .map_or(ConnState::Unknown, Manager::state)
    }

    /// Offline mode flag; reported as `true` while not initialized.
    pub fn offline_mode(&self) -> bool {
        self.session
            .manager_state()
            .is_none_or(Manager::offline_mode)
    }

    pub fn set_offline_mode(&mut self, offline: bool) -> Result<(), CoreError> {
        self.with_manager(|manager, link| manager.set_offline_mode(link, offline))
    }

    pub fn register_agent(&mut self, agent_path: &str) -> Result<(), CoreError> {
        self.with_manager(|manager, link| {
            manager.send_agent(link, member::REGISTER_AGENT, agent_path)
        })
    }

    pub fn unregister_agent(&mut self, agent_path: &str) -> Result<(), CoreError> {
        self.with_manager(|manager, link| {
            manager.send_agent(link, member::UNREGISTER_AGENT, agent_path)
        })
    }

    /// Re-fetch the technology list, replacing any outstanding fetch.
    pub fn get_technologies(&mut self) -> Result<(), CoreError> {
        self.with_manager(|manager, link| manager.fetch_technologies(link))
    }

    pub fn register_technology_signals(&mut self, enable: bool) -> Result<(), CoreError> {
        self.with_manager(|manager, link| manager.watch_technologies(link, enable))
    }

    /// Re-fetch the service list, replacing any outstanding fetch.
    pub fn get_services(&mut self) -> Result<(), CoreError> {
        self.with_manager(|manager, link| manager.fetch_services(link))
    }

    pub fn register_service_signal(&mut self, enable: bool) -> Result<(), CoreError> {
        self.with_manager(|manager, link| manager.watch_services(link, enable))
    }
}
