// ── Agent ──
//
// Answers the remote service's interactive requests (error reports,
// browser logins, credential input). At most one request waits for an
// answer at a time; a newer request cancels the older one on the bus
// before taking its place.

use std::ops::ControlFlow;

use connui_bus::{
    AccessError, Bus, DictAppender, ErrorReply, IncomingCall, Reply, ReplyToken, Value, ValueExt,
    into_body,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::convert::path_arg;
use crate::error::CoreError;
use crate::events::{Callback, Notify};
use crate::model::{BrowserRequest, ErrorReport, InputRequest, PassphraseKind, PassphraseReply};
use crate::protocol::{self, member};
use crate::session::{Link, Parts, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    ReportError,
    RequestBrowser,
    RequestInput,
}

#[derive(Debug)]
struct PendingRequest {
    token: ReplyToken,
    service: String,
    kind: RequestKind,
}

pub(crate) struct Agent {
    path: String,
    pending: Option<PendingRequest>,
    on_error: Option<Callback<ErrorReport>>,
    on_browser: Option<Callback<BrowserRequest>>,
    on_input: Option<Callback<InputRequest>>,
    on_cancel: Option<Notify>,
}

impl Agent {
    fn new(path: String) -> Self {
        Self {
            path,
            pending: None,
            on_error: None,
            on_browser: None,
            on_input: None,
            on_cancel: None,
        }
    }

    pub(crate) fn handles(&self, call: &IncomingCall) -> bool {
        call.path == self.path && call.interface == protocol::AGENT_INTERFACE
    }

    /// Make `token` the request waiting for an answer. An older one is
    /// canceled first.
    fn accept<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        token: ReplyToken,
        service: &str,
        kind: RequestKind,
    ) -> Result<(), CoreError> {
        if let Some(previous) = self.pending.take() {
            debug!(service = %previous.service, kind = ?previous.kind, "superseding pending request");
            link.reply(Reply::error(
                previous.token,
                protocol::AGENT_ERROR_CANCELED,
                "Superseded by a newer request",
            ))?;
        }
        debug!(service, ?kind, "request pending");
        self.pending = Some(PendingRequest {
            token,
            service: service.to_owned(),
            kind,
        });
        Ok(())
    }

    /// Handle a call on the agent object. Returns `true` when the remote
    /// side released the agent.
    pub(crate) fn on_method_call<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        call: IncomingCall,
    ) -> Result<bool, CoreError> {
        match call.member.as_str() {
            member::RELEASE => {
                if let Some(dropped) = self.pending.take() {
                    debug!(service = %dropped.service, "dropping pending request on release");
                }
                link.unexport(&self.path);
                link.reply(Reply::empty(call.token))?;
                debug!(path = %self.path, "agent released");
                return Ok(true);
            }
            member::REPORT_ERROR => {
                let parsed = parse_error_report(&call);
                match (parsed, self.on_error.is_some()) {
                    (Ok(report), true) => {
                        self.accept(link, call.token, &report.service, RequestKind::ReportError)?;
                        if let Some(callback) = self.on_error.as_mut() {
                            callback(&report);
                        }
                    }
                    (parsed, _) => {
                        if let Err(e) = parsed {
                            warn!(error = %e, "malformed ReportError");
                        }
                        link.reply(Reply::empty(call.token))?;
                    }
                }
            }
            member::REQUEST_BROWSER => {
                let parsed = parse_browser_request(&call);
                match (parsed, self.on_browser.is_some()) {
                    (Ok(request), true) => {
                        self.accept(link, call.token, &request.service, RequestKind::RequestBrowser)?;
                        if let Some(callback) = self.on_browser.as_mut() {
                            callback(&request);
                        }
                    }
                    (parsed, _) => {
                        if let Err(e) = parsed {
                            warn!(error = %e, "malformed RequestBrowser");
                        }
                        link.reply(refuse(call.token))?;
                    }
                }
            }
            member::REQUEST_INPUT => {
                let parsed = parse_input_request(&call);
                match (parsed, self.on_input.is_some()) {
                    (Ok(request), true) if request.is_answerable() => {
                        self.accept(link, call.token, &request.service, RequestKind::RequestInput)?;
                        if let Some(callback) = self.on_input.as_mut() {
                            callback(&request);
                        }
                    }
                    (parsed, _) => {
                        if let Err(e) = parsed {
                            warn!(error = %e, "malformed RequestInput");
                        }
                        link.reply(refuse(call.token))?;
                    }
                }
            }
            member::CANCEL => {
                if let Some(dropped) = self.pending.take() {
                    debug!(service = %dropped.service, "request canceled by remote");
                }
                if let Some(callback) = self.on_cancel.as_mut() {
                    callback();
                }
                link.reply(Reply::empty(call.token))?;
            }
            other => {
                debug!(member = other, "unknown agent method");
                link.reply(Reply::error(
                    call.token,
                    protocol::DBUS_UNKNOWN_METHOD,
                    format!("no method {other} on {}", protocol::AGENT_INTERFACE),
                ))?;
            }
        }
        Ok(false)
    }

    // ── Answers ──────────────────────────────────────────────────────

    fn respond<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        answer: impl FnOnce(ReplyToken) -> Reply,
    ) -> Result<(), CoreError> {
        let Some(pending) = self.pending.take() else {
            debug!("no pending request to answer");
            return Ok(());
        };
        debug!(service = %pending.service, kind = ?pending.kind, "answering request");
        link.reply(answer(pending.token))
    }

    fn respond_error<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        name: &str,
        message: &str,
    ) -> Result<(), CoreError> {
        self.respond(link, |token| Reply::error(token, name, message))
    }

    fn respond_dict<B: Bus>(
        &mut self,
        link: &mut Link<'_, B>,
        fill: impl FnOnce(&mut DictAppender),
    ) -> Result<(), CoreError> {
        let mut dict = DictAppender::default();
        fill(&mut dict);
        let body = into_body([dict.into_value()])?;
        self.respond(link, |token| Reply::Return { to: token, body })
    }
}

fn refuse(token: ReplyToken) -> Reply {
    Reply::Error {
        to: token,
        error: ErrorReply {
            name: protocol::ERROR_CANCELED.to_owned(),
            message: None,
        },
    }
}

// ── Request parsing ─────────────────────────────────────────────────

fn parse_error_report(call: &IncomingCall) -> Result<ErrorReport, AccessError> {
    let mut args = call.args();
    let service = path_arg(&args)?;
    args.advance();
    Ok(ErrorReport {
        service,
        error: args.get_basic()?,
    })
}

fn parse_browser_request(call: &IncomingCall) -> Result<BrowserRequest, AccessError> {
    let mut args = call.args();
    let service = path_arg(&args)?;
    args.advance();
    Ok(BrowserRequest {
        service,
        url: args.get_basic()?,
    })
}

fn parse_input_request(call: &IncomingCall) -> Result<InputRequest, AccessError> {
    let mut args = call.args();
    let mut request = InputRequest::new(path_arg(&args)?);
    args.advance();
    let fields = args.get_dict()?;

    fields.for_each(|name, value| {
        match name {
            "Passphrase" => request.passphrase = true,
            "WPS" => request.wps = true,
            "Name" => request.hidden = true,
            "Identity" => request.identity = true,
            "Username" => request.login = true,
            "PreviousPassphrase" => request.previous_passphrase = previous_passphrase(value),
            _ => {}
        }
        ControlFlow::Continue(())
    });
    Ok(request)
}

fn previous_passphrase(value: &Value<'static>) -> Option<(PassphraseKind, SecretString)> {
    let dict = value.get_dict().ok()?;
    let kind = dict.get_basic::<String>("Type").ok()?.parse().ok()?;
    let secret = dict.get_basic::<String>("Value").ok()?;
    Some((kind, SecretString::from(secret)))
}

// ── Public handle ───────────────────────────────────────────────────

/// Access to the agent of a [`Session`].
pub struct AgentHandle<'s, B: Bus> {
    session: &'s mut Session<B>,
}

impl<'s, B: Bus> AgentHandle<'s, B> {
    pub(crate) fn new(session: &'s mut Session<B>) -> Self {
        Self { session }
    }

    fn with_agent<R>(
        &mut self,
        op: impl FnOnce(&mut Agent, &mut Link<'_, B>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let Parts { mut link, agent, .. } = self.session.parts();
        let agent = agent
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("agent"))?;
        op(agent, &mut link)
    }

    /// Export the agent object and register it with the remote service.
    /// Requires an initialized manager. Calling `init` again while
    /// initialized does nothing.
    pub fn init(&mut self) -> Result<(), CoreError> {
        let Parts {
            mut link,
            manager,
            agent,
            ..
        } = self.session.parts();
        if agent.is_some() {
            debug!("agent already initialized");
            return Ok(());
        }
        let manager = manager
            .as_mut()
            .ok_or_else(|| CoreError::not_initialized("manager"))?;

        let path = link.config.agent_path.clone();
        link.export(&path)?;
        if let Err(e) = manager.send_agent(&mut link, member::REGISTER_AGENT, &path) {
            link.unexport(&path);
            return Err(e);
        }
        *agent = Some(Agent::new(path));
        Ok(())
    }

    /// Cancel a pending request, unregister from the remote service and
    /// withdraw the agent object.
    pub fn finalize(&mut self) {
        let Parts {
            mut link,
            manager,
            agent,
            ..
        } = self.session.parts();
        let Some(mut active) = agent.take() else {
            return;
        };
        let canceled = active.respond_error(&mut link, protocol::AGENT_ERROR_CANCELED, "Canceled");
        if let Err(e) = canceled {
            warn!(error = %e, "failed to cancel pending request");
        }
        if let Some(manager) = manager.as_mut() {
            if let Err(e) = manager.send_agent(&mut link, member::UNREGISTER_AGENT, &active.path) {
                warn!(error = %e, "failed to unregister agent");
            }
        }
        link.unexport(&active.path);
        debug!(path = %active.path, "agent finalized");
    }

    pub fn is_initialized(&self) -> bool {
        self.session.agent_state().is_some()
    }

    /// Service the pending request is about, if one is waiting.
    pub fn pending_service(&self) -> Option<String> {
        self.session
            .agent_state()
            .and_then(|a| a.pending.as_ref())
            .map(|p| p.service.clone())
    }

    // ── Callbacks ────────────────────────────────────────────────────

    pub fn on_error<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&ErrorReport) + Send + 'static,
    {
        self.with_agent(|agent, _| {
            agent.on_error = Some(Box::new(callback));
            Ok(())
        })
    }

    pub fn on_browser<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&BrowserRequest) + Send + 'static,
    {
        self.with_agent(|agent, _| {
            agent.on_browser = Some(Box::new(callback));
            Ok(())
        })
    }

    pub fn on_input<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut(&InputRequest) + Send + 'static,
    {
        self.with_agent(|agent, _| {
            agent.on_input = Some(Box::new(callback));
            Ok(())
        })
    }

    /// Called when the remote service withdraws the pending request.
    pub fn on_cancel<F>(&mut self, callback: F) -> Result<(), CoreError>
    where
        F: FnMut() + Send + 'static,
    {
        self.with_agent(|agent, _| {
            agent.on_cancel = Some(Box::new(callback));
            Ok(())
        })
    }

    // ── Replies ──────────────────────────────────────────────────────
    //
    // Each reply answers and clears the pending request. Without one
    // they do nothing.

    pub fn reply_retry(&mut self) -> Result<(), CoreError> {
        self.with_agent(|agent, link| {
            agent.respond_error(link, protocol::AGENT_ERROR_RETRY, "Retry")
        })
    }

    pub fn reply_canceled(&mut self) -> Result<(), CoreError> {
        self.with_agent(|agent, link| {
            agent.respond_error(link, protocol::AGENT_ERROR_CANCELED, "Canceled")
        })
    }

    pub fn reply_launch_browser(&mut self) -> Result<(), CoreError> {
        self.with_agent(|agent, link| {
            agent.respond_error(
                link,
                protocol::AGENT_ERROR_LAUNCH_BROWSER,
                "Launch the Browser",
            )
        })
    }

    pub fn reply_identity(
        &mut self,
        identity: &str,
        passphrase: &SecretString,
    ) -> Result<(), CoreError> {
        self.with_agent(|agent, link| {
            agent.respond_dict(link, |dict| {
                dict.entry_basic("Identity", identity.to_owned())
                    .entry_basic("Passphrase", passphrase.expose_secret().to_owned());
            })
        })
    }

    /// Answer with a passphrase, a hidden network name, or WPS. A passphrase
    /// takes precedence over WPS.
    pub fn reply_passphrase(&mut self, reply: PassphraseReply) -> Result<(), CoreError> {
        if reply.is_empty() {
            return Err(CoreError::invalid(
                "a passphrase reply needs a name, a passphrase or WPS",
            ));
        }
        self.with_agent(|agent, link| {
            agent.respond_dict(link, |dict| {
                dict.entry_optional("Name", reply.name);
                match reply.passphrase {
                    Some(passphrase) => {
                        dict.entry_basic("Passphrase", passphrase.expose_secret().to_owned());
                    }
                    None if reply.wps => {
                        dict.entry_basic("WPS", reply.wpspin.unwrap_or_default());
                    }
                    None => {}
                }
            })
        })
    }

    pub fn reply_login(
        &mut self,
        username: Option<&str>,
        password: Option<&SecretString>,
    ) -> Result<(), CoreError> {
        if username.is_none() && password.is_none() {
            return Err(CoreError::invalid(
                "a login reply needs a username or a password",
            ));
        }
        self.with_agent(|agent, link| {
            agent.respond_dict(link, |dict| {
                dict.entry_optional("Username", username.map(str::to_owned))
                    .entry_optional(
                        "Password",
                        password.map(|p| p.expose_secret().to_owned()),
                    );
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use connui_bus::{BusEvent, MockBus, OwnedObjectPath, object_path, property_dict};

    use super::*;
    use crate::config::SessionConfig;

    const SERVICE: &str = "/net/connman/service/wifi_home";

    fn service_path() -> Value<'static> {
        Value::from(object_path(SERVICE).unwrap())
    }

    fn incoming(serial: u32, member: &str, body: Vec<Value<'static>>) -> BusEvent {
        let body = into_body(body).unwrap();
        BusEvent::MethodCall(IncomingCall {
            token: ReplyToken {
                sender: ":1.7".into(),
                serial,
            },
            path: protocol::AGENT_PATH.into(),
            interface: protocol::AGENT_INTERFACE.into(),
            member: member.into(),
            body,
        })
    }

    fn agent_session() -> Session<MockBus> {
        let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
        session.manager().init(|_| {}).unwrap();
        session.agent().init().unwrap();
        session
    }

    #[test]
    fn init_exports_and_registers() {
        let session = agent_session();
        assert_eq!(
            session.bus().exported,
            vec![(protocol::AGENT_PATH.to_owned(), protocol::AGENT_INTERFACE.to_owned())]
        );
        let register = session.bus().sent_named(member::REGISTER_AGENT);
        assert_eq!(
            register[0].args().get_basic::<OwnedObjectPath>().unwrap().as_str(),
            protocol::AGENT_PATH
        );
    }

    #[test]
    fn browser_request_without_callback_is_refused() {
        let mut session = agent_session();
        session.dispatch(incoming(
            1,
            member::REQUEST_BROWSER,
            vec![service_path(), Value::from("http://portal")],
        ));
        let Reply::Error { error, .. } = &session.bus().replies[0] else {
            panic!("expected an error reply");
        };
        assert_eq!(error.name, protocol::ERROR_CANCELED);
        assert_eq!(session.agent().pending_service(), None);
    }

    #[test]
    fn reply_without_pending_request_is_a_noop() {
        let mut session = agent_session();
        session.agent().reply_retry().unwrap();
        assert!(session.bus().replies.is_empty());
    }

    #[test]
    fn login_reply_needs_something_and_keeps_request() {
        let mut session = agent_session();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        session
            .agent()
            .on_input(move |request| *sink.lock().unwrap() = Some(request.clone()))
            .unwrap();
        session.dispatch(incoming(
            4,
            member::REQUEST_INPUT,
            vec![
                service_path(),
                property_dict([(
                    "Username",
                    property_dict([("Type", Value::from("string"))]),
                )]),
            ],
        ));
        assert!(seen.lock().unwrap().as_ref().unwrap().login);

        let err = session.agent().reply_login(None, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
        assert_eq!(session.agent().pending_service().as_deref(), Some(SERVICE));

        let password = SecretString::from("s3cret".to_owned());
        session.agent().reply_login(Some("alice"), Some(&password)).unwrap();
        let Reply::Return { body, .. } = &session.bus().replies[0] else {
            panic!("expected a method return");
        };
        let dict = body[0].get_dict().unwrap();
        assert_eq!(dict.get_basic::<String>("Username").unwrap(), "alice");
        assert_eq!(dict.get_basic::<String>("Password").unwrap(), "s3cret");
        assert_eq!(session.agent().pending_service(), None);
    }

    #[test]
    fn release_withdraws_the_agent() {
        let mut session = agent_session();
        session.dispatch(incoming(9, member::RELEASE, Vec::new()));
        assert!(!session.agent().is_initialized());
        assert!(session.bus().exported.is_empty());
        assert!(matches!(session.bus().replies[0], Reply::Return { .. }));
    }

    #[test]
    fn unknown_member_gets_unknown_method() {
        let mut session = agent_session();
        session.dispatch(incoming(2, "RequestPeerAuthorization", Vec::new()));
        let Reply::Error { error, .. } = &session.bus().replies[0] else {
            panic!("expected an error reply");
        };
        assert_eq!(error.name, protocol::DBUS_UNKNOWN_METHOD);
    }

    #[test]
    fn finalize_cancels_pending_and_unregisters() {
        let mut session = agent_session();
        session.agent().on_error(|_| {}).unwrap();
        session.dispatch(incoming(
            3,
            member::REPORT_ERROR,
            vec![service_path(), Value::from("invalid-key")],
        ));
        session.agent().finalize();

        let Reply::Error { error, .. } = &session.bus().replies[0] else {
            panic!("expected an error reply");
        };
        assert_eq!(error.name, protocol::AGENT_ERROR_CANCELED);
        assert_eq!(session.bus().sent_named(member::UNREGISTER_AGENT).len(), 1);
        assert!(session.bus().exported.is_empty());
    }
}
