#![allow(clippy::unwrap_used)]
// Integration tests for the agent request/reply cycle.

use std::sync::{Arc, Mutex};

use connui_bus::{
    BusEvent, Cursor, IncomingCall, MockBus, Reply, ReplyToken, Value, ValueExt, into_body,
    object_path, property_dict,
};
use secrecy::ExposeSecret;
use pretty_assertions::assert_eq;
use secrecy::SecretString;

use connui_core::protocol::{self, member};
use connui_core::{
    CoreError, ErrorReport, InputRequest, PassphraseKind, PassphraseReply, Session, SessionConfig,
};

const HOME: &str = "/net/connman/service/wifi_home";
const CAFE: &str = "/net/connman/service/wifi_cafe";

// ── Helpers ─────────────────────────────────────────────────────────

fn token(serial: u32) -> ReplyToken {
    ReplyToken {
        sender: ":1.42".into(),
        serial,
    }
}

fn agent_call(serial: u32, name: &str, body: Vec<Value<'static>>) -> BusEvent {
    BusEvent::MethodCall(IncomingCall {
        token: token(serial),
        path: protocol::AGENT_PATH.into(),
        interface: protocol::AGENT_INTERFACE.into(),
        member: name.into(),
        body: into_body(body).unwrap(),
    })
}

fn field(kind: &str) -> Value<'static> {
    property_dict([("Type", Value::from(kind.to_owned()))])
}

fn path(path: &str) -> Value<'static> {
    Value::from(object_path(path).unwrap())
}

fn request_input(serial: u32, service: &str, fields: Vec<(&str, Value<'static>)>) -> BusEvent {
    agent_call(
        serial,
        member::REQUEST_INPUT,
        vec![path(service), property_dict(fields)],
    )
}

fn session_with_agent() -> Session<MockBus> {
    let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
    session.manager().init(|_| {}).unwrap();
    session.agent().init().unwrap();
    session
}

/// Agent with an input callback that records every request.
fn session_taking_input() -> (Session<MockBus>, Arc<Mutex<Vec<InputRequest>>>) {
    let mut session = session_with_agent();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session
        .agent()
        .on_input(move |request| sink.lock().unwrap().push(request.clone()))
        .unwrap();
    (session, seen)
}

fn error_name(reply: &Reply) -> &str {
    match reply {
        Reply::Error { error, .. } => &error.name,
        Reply::Return { .. } => panic!("expected an error reply, got {reply:?}"),
    }
}

fn assert_empty_return(reply: &Reply, serial: u32) {
    let Reply::Return { to, body } = reply else {
        panic!("expected a method return, got {reply:?}");
    };
    assert_eq!(to, &token(serial));
    assert!(body.is_empty());
}

fn returned_dict(reply: &Reply) -> Vec<(String, String)> {
    let Reply::Return { body, .. } = reply else {
        panic!("expected a method return, got {reply:?}");
    };
    Cursor::new(body)
        .get_dict()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.to_owned(), v.get::<String>().unwrap()))
        .collect()
}

// ── Request intake ──────────────────────────────────────────────────

#[test]
fn test_input_request_fields_are_parsed() {
    let (mut session, seen) = session_taking_input();
    session.dispatch(request_input(
        1,
        HOME,
        vec![
            ("Passphrase", field("psk")),
            ("WPS", field("wpspin")),
            (
                "PreviousPassphrase",
                property_dict([
                    ("Type", Value::from("psk")),
                    ("Value", Value::from("old-secret")),
                ]),
            ),
        ],
    ));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.service, HOME);
    assert!(request.passphrase);
    assert!(request.wps);
    assert!(!request.hidden);
    assert!(!request.login);
    let (kind, previous) = request.previous_passphrase.as_ref().unwrap();
    assert_eq!(*kind, PassphraseKind::Psk);
    assert_eq!(previous.expose_secret(), "old-secret");
    assert!(session.bus().replies.is_empty());
    assert_eq!(session.agent().pending_service().as_deref(), Some(HOME));
}

#[test]
fn test_unanswerable_input_request_is_refused() {
    let (mut session, seen) = session_taking_input();
    session.dispatch(request_input(1, HOME, vec![("WPS", field("wpspin"))]));

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(error_name(&session.bus().replies[0]), protocol::ERROR_CANCELED);
    assert_eq!(session.agent().pending_service(), None);
}

#[test]
fn test_malformed_input_request_is_refused() {
    let (mut session, seen) = session_taking_input();
    session.dispatch(agent_call(
        1,
        member::REQUEST_INPUT,
        vec![Value::from(7u32)],
    ));

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(error_name(&session.bus().replies[0]), protocol::ERROR_CANCELED);
}

#[test]
fn test_report_error_without_callback_gets_empty_reply() {
    let mut session = session_with_agent();
    session.dispatch(agent_call(
        3,
        member::REPORT_ERROR,
        vec![path(HOME), Value::from("invalid-key")],
    ));

    assert_eq!(session.bus().replies.len(), 1);
    assert_empty_return(&session.bus().replies[0], 3);
    assert_eq!(session.agent().pending_service(), None);
}

#[test]
fn test_report_error_waits_for_retry() {
    let mut session = session_with_agent();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session
        .agent()
        .on_error(move |report| sink.lock().unwrap().push(report.clone()))
        .unwrap();

    session.dispatch(agent_call(
        4,
        member::REPORT_ERROR,
        vec![path(HOME), Value::from("connect-failed")],
    ));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ErrorReport {
            service: HOME.into(),
            error: "connect-failed".into(),
        }]
    );
    assert!(session.bus().replies.is_empty());

    session.agent().reply_retry().unwrap();
    let reply = &session.bus().replies[0];
    assert_eq!(reply.token(), &token(4));
    assert_eq!(error_name(reply), protocol::AGENT_ERROR_RETRY);
}

#[test]
fn test_browser_request_answered_with_launch_browser() {
    let mut session = session_with_agent();
    let urls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&urls);
    session
        .agent()
        .on_browser(move |request| sink.lock().unwrap().push(request.url.clone()))
        .unwrap();

    session.dispatch(agent_call(
        5,
        member::REQUEST_BROWSER,
        vec![path(CAFE), Value::from("http://portal.cafe/login")],
    ));
    assert_eq!(*urls.lock().unwrap(), vec!["http://portal.cafe/login".to_owned()]);

    session.agent().reply_launch_browser().unwrap();
    assert_eq!(
        error_name(&session.bus().replies[0]),
        protocol::AGENT_ERROR_LAUNCH_BROWSER
    );
}

// ── Pending request lifecycle ───────────────────────────────────────

#[test]
fn test_second_request_cancels_the_first() {
    let (mut session, seen) = session_taking_input();
    session.dispatch(request_input(1, HOME, vec![("Passphrase", field("psk"))]));
    session.dispatch(request_input(2, CAFE, vec![("Passphrase", field("psk"))]));

    assert_eq!(seen.lock().unwrap().len(), 2);
    let replies = &session.bus().replies;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].token(), &token(1));
    assert_eq!(error_name(&replies[0]), protocol::AGENT_ERROR_CANCELED);
    assert_eq!(session.agent().pending_service().as_deref(), Some(CAFE));

    let passphrase = SecretString::from("cafe-wifi".to_owned());
    session
        .agent()
        .reply_passphrase(PassphraseReply::passphrase(passphrase))
        .unwrap();
    let replies = &session.bus().replies;
    assert_eq!(replies[1].token(), &token(2));
    assert_eq!(
        returned_dict(&replies[1]),
        vec![("Passphrase".to_owned(), "cafe-wifi".to_owned())]
    );
}

#[test]
fn test_cancel_drops_pending_without_answering_it() {
    let (mut session, _) = session_taking_input();
    let canceled = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&canceled);
    session
        .agent()
        .on_cancel(move || *sink.lock().unwrap() += 1)
        .unwrap();

    session.dispatch(request_input(1, HOME, vec![("Passphrase", field("psk"))]));
    session.dispatch(agent_call(2, member::CANCEL, Vec::new()));

    assert_eq!(*canceled.lock().unwrap(), 1);
    assert_eq!(session.bus().replies.len(), 1);
    assert_empty_return(&session.bus().replies[0], 2);
    assert_eq!(session.agent().pending_service(), None);

    // Nothing left to answer.
    session.agent().reply_canceled().unwrap();
    assert_eq!(session.bus().replies.len(), 1);
}

// ── Replies ─────────────────────────────────────────────────────────

#[test]
fn test_hidden_network_reply_carries_name_and_passphrase() {
    let (mut session, _) = session_taking_input();
    session.dispatch(request_input(
        1,
        HOME,
        vec![("Name", field("string")), ("Passphrase", field("psk"))],
    ));

    let reply = PassphraseReply::passphrase(SecretString::from("hunter22".to_owned()))
        .with_name("hidden-ssid");
    session.agent().reply_passphrase(reply).unwrap();

    assert_eq!(
        returned_dict(&session.bus().replies[0]),
        vec![
            ("Name".to_owned(), "hidden-ssid".to_owned()),
            ("Passphrase".to_owned(), "hunter22".to_owned()),
        ]
    );
}

#[test]
fn test_wps_reply_without_pin_sends_empty_pin() {
    let (mut session, _) = session_taking_input();
    session.dispatch(request_input(
        1,
        HOME,
        vec![("Passphrase", field("psk")), ("WPS", field("wpspin"))],
    ));

    session
        .agent()
        .reply_passphrase(PassphraseReply::wps(None))
        .unwrap();

    assert_eq!(
        returned_dict(&session.bus().replies[0]),
        vec![("WPS".to_owned(), "".to_owned())]
    );
}

#[test]
fn test_empty_passphrase_reply_keeps_request_pending() {
    let (mut session, _) = session_taking_input();
    session.dispatch(request_input(1, HOME, vec![("Passphrase", field("psk"))]));

    let err = session
        .agent()
        .reply_passphrase(PassphraseReply::default())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
    assert!(session.bus().replies.is_empty());
    assert_eq!(session.agent().pending_service().as_deref(), Some(HOME));
}

#[test]
fn test_identity_reply() {
    let (mut session, _) = session_taking_input();
    session.dispatch(request_input(
        1,
        HOME,
        vec![("Identity", field("string")), ("Passphrase", field("passphrase"))],
    ));

    let password = SecretString::from("eap-password".to_owned());
    session.agent().reply_identity("alice@example.org", &password).unwrap();

    assert_eq!(
        returned_dict(&session.bus().replies[0]),
        vec![
            ("Identity".to_owned(), "alice@example.org".to_owned()),
            ("Passphrase".to_owned(), "eap-password".to_owned()),
        ]
    );
}

#[test]
fn test_agent_calls_require_init() {
    let mut session = Session::new(MockBus::new(), SessionConfig::default()).unwrap();
    assert!(matches!(
        session.agent().init(),
        Err(CoreError::InvalidArgument { .. })
    ));
    assert!(matches!(
        session.agent().reply_retry(),
        Err(CoreError::InvalidArgument { .. })
    ));
}
