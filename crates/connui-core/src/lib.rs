//! Client-side sync engine for the connection manager.
//!
//! Mirrors the remote object graph (manager, technologies, services) into
//! local caches, keeps them current from change signals, and answers the
//! remote service's interactive requests through an agent:
//!
//! - **[`Session`]** — Owns the bus connection and every component. It is
//!   a plain state machine fed with [`BusEvent`](connui_bus::BusEvent)s;
//!   notifications produced while processing an event are queued and
//!   delivered by [`Session::run_pending`], one per property per
//!   iteration, carrying the last value received.
//!
//! - **Handles** — [`ManagerHandle`], [`TechnologiesHandle`],
//!   [`ServicesHandle`] and [`AgentHandle`] borrow the session for the
//!   duration of one operation. Each component has its own `init` /
//!   `finalize` lifecycle.
//!
//! - **[`EventLoop`]** — Drives a session on a tokio task. Other tasks
//!   reach it through a cloneable [`LoopHandle`].
//!
//! - **Domain model** ([`model`]) — Plain records (`TechnologyRecord`,
//!   `ServiceRecord`, IP and proxy configurations, agent requests) with
//!   no knowledge of the wire.

mod agent;
mod call_slot;
pub mod config;
mod convert;
mod deferred;
pub mod error;
pub mod events;
mod manager;
pub mod model;
pub mod protocol;
pub mod runtime;
mod service;
mod session;
mod technology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use agent::AgentHandle;
pub use config::SessionConfig;
pub use error::CoreError;
pub use events::{PropertyChanged, SetFailed};
pub use manager::ManagerHandle;
pub use runtime::{EventLoop, Job, LoopHandle};
pub use service::{Deselected, ServicesHandle};
pub use session::Session;
pub use technology::{ScanCallback, TechnologiesHandle};

pub use model::{
    BrowserRequest, ConnState, ErrorReport, EthernetInfo, InputRequest, Ipv4Config, Ipv6Config,
    ManagerProperty, PassphraseKind, PassphraseReply, ProviderInfo, ProxyConfig, ServiceProperty,
    ServiceRecord, TechnologyProperty, TechnologyRecord,
};
