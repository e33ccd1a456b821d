// ── Message types ──
//
// Everything exchanged with the transport: outgoing method calls and
// replies, signal subscriptions, and the events the transport feeds
// back into the sync engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use zvariant::OwnedValue;

use crate::access::{AccessError, Cursor};
use crate::append::Appender;
use crate::value::into_body;

/// Handle of an outstanding method call awaiting its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Handle of an active signal subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchId(pub u64);

/// Correlation token of an incoming method call we still owe a reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyToken {
    pub sender: String,
    pub serial: u32,
}

// ── Outgoing calls ──────────────────────────────────────────────────

#[derive(Debug)]
pub struct MethodCall {
    pub destination: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub body: Vec<OwnedValue>,
}

impl MethodCall {
    pub fn new(
        destination: impl Into<String>,
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            body: Vec::new(),
        }
    }

    /// Fill the body through an [`Appender`].
    pub fn with_args<F>(mut self, fill: F) -> Result<Self, AccessError>
    where
        F: FnOnce(&mut Appender<'_>),
    {
        let mut values = Vec::new();
        fill(&mut Appender::new(&mut values));
        self.body.extend(into_body(values)?);
        Ok(self)
    }

    pub fn args(&self) -> Cursor<'_> {
        Cursor::new(&self.body)
    }
}

// ── Signals ─────────────────────────────────────────────────────────

/// Match rule for a signal subscription. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalRule {
    pub sender: Option<String>,
    pub path: Option<String>,
    pub interface: String,
    pub member: String,
    pub arg0: Option<String>,
}

impl SignalRule {
    pub fn new(interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            sender: None,
            path: None,
            interface: interface.into(),
            member: member.into(),
            arg0: None,
        }
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn arg0(mut self, arg0: impl Into<String>) -> Self {
        self.arg0 = Some(arg0.into());
        self
    }

    /// Whether `signal` satisfies this rule. Sender names are not
    /// compared since the transport resolves well-known names.
    pub fn matches(&self, signal: &Signal) -> bool {
        if self.interface != signal.interface || self.member != signal.member {
            return false;
        }
        if self.path.as_deref().is_some_and(|p| p != signal.path) {
            return false;
        }
        match &self.arg0 {
            Some(arg0) => signal.args().get_basic::<String>().is_ok_and(|a| &a == arg0),
            None => true,
        }
    }
}

#[derive(Debug)]
pub struct Signal {
    pub sender: Option<String>,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub body: Vec<OwnedValue>,
}

impl Signal {
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        body: Vec<OwnedValue>,
    ) -> Self {
        Self {
            sender: None,
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            body,
        }
    }

    pub fn args(&self) -> Cursor<'_> {
        Cursor::new(&self.body)
    }
}

// ── Incoming calls and replies ──────────────────────────────────────

/// A method call addressed to an object we export.
#[derive(Debug)]
pub struct IncomingCall {
    pub token: ReplyToken,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub body: Vec<OwnedValue>,
}

impl IncomingCall {
    pub fn args(&self) -> Cursor<'_> {
        Cursor::new(&self.body)
    }
}

/// Error returned by the remote side, or sent by us in reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub name: String,
    pub message: Option<String>,
}

impl ErrorReply {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Our answer to an [`IncomingCall`].
#[derive(Debug)]
pub enum Reply {
    Return {
        to: ReplyToken,
        body: Vec<OwnedValue>,
    },
    Error { to: ReplyToken, error: ErrorReply },
}

impl Reply {
    pub fn empty(to: ReplyToken) -> Self {
        Self::Return { to, body: Vec::new() }
    }

    pub fn error(to: ReplyToken, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            to,
            error: ErrorReply::new(name, message),
        }
    }

    pub fn token(&self) -> &ReplyToken {
        match self {
            Self::Return { to, .. } | Self::Error { to, .. } => to,
        }
    }
}

// ── Transport events ────────────────────────────────────────────────

/// Something the transport delivers to the sync engine.
#[derive(Debug)]
pub enum BusEvent {
    /// The reply (or remote error) for a call we issued.
    Reply {
        call: CallId,
        outcome: Result<Vec<OwnedValue>, ErrorReply>,
    },
    /// A call we issued will never get a reply (canceled, timed out,
    /// connection dropped).
    CallCanceled { call: CallId },
    Signal(Signal),
    MethodCall(IncomingCall),
}
