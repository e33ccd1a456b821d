// ── Selected service ──
//
// The selected service is normally owned by the registry map. When the
// remote side removes it while selected, the record moves here and stays
// readable until the caller deselects it.

use super::Service;

#[derive(Default)]
pub(crate) enum Selection {
    #[default]
    None,
    InRegistry(String),
    Detached(Box<Service>),
}

impl Selection {
    pub(crate) fn path(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::InRegistry(path) => Some(path.as_str()),
            Self::Detached(service) => Some(service.record.path.as_str()),
        }
    }

    pub(crate) fn is(&self, path: &str) -> bool {
        self.path() == Some(path)
    }

    pub(crate) fn detached(&self, path: &str) -> Option<&Service> {
        match self {
            Self::Detached(service) if service.record.path == path => Some(&**service),
            _ => None,
        }
    }

    pub(crate) fn detached_mut(&mut self, path: &str) -> Option<&mut Service> {
        match self {
            Self::Detached(service) if service.record.path == path => Some(&mut **service),
            _ => None,
        }
    }

    /// Keep `service` alive outside the registry.
    pub(crate) fn detach(&mut self, service: Service) {
        *self = Self::Detached(Box::new(service));
    }

    /// Take back the detached record for `path` so it can return to the
    /// registry. The selection stays on `path`.
    pub(crate) fn reclaim(&mut self, path: &str) -> Option<Service> {
        if self.detached(path).is_none() {
            return None;
        }
        match std::mem::replace(self, Self::InRegistry(path.to_owned())) {
            Self::Detached(service) => Some(*service),
            _ => None,
        }
    }
}

/// What [`deselect`](crate::ServicesHandle::deselect) did with the
/// previously selected service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deselected {
    /// The service had already been removed; its record is now freed.
    Released,
    /// The service is still in the registry, which keeps owning it.
    Retained,
    /// Nothing was selected.
    NoSelection,
}
