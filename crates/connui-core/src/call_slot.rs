// ── Async call slot ──
//
// Holds at most one outstanding request of a given kind. Issuing a new
// request through `issue` cancels and replaces the old one; `issue_exclusive`
// refuses instead. A completion only counts when it is for the call the
// slot currently holds, so replies to replaced or canceled calls fall on
// the floor.

use connui_bus::{Bus, CallId, MethodCall};
use tracing::trace;

use crate::error::CoreError;

#[derive(Debug, Default)]
pub(crate) struct CallSlot {
    pending: Option<CallId>,
}

impl CallSlot {
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The call this slot is waiting for.
    pub(crate) fn pending(&self) -> Option<CallId> {
        self.pending
    }

    /// Send `call`, canceling whatever this slot was waiting for. Returns
    /// the new call and the one it replaced.
    pub(crate) fn issue<B: Bus>(
        &mut self,
        bus: &mut B,
        call: MethodCall,
    ) -> Result<(CallId, Option<CallId>), CoreError> {
        let replaced = self.pending.take();
        if let Some(old) = replaced {
            trace!(%old, member = %call.member, "replacing outstanding call");
            bus.cancel(old);
        }
        let id = bus.call(call)?;
        self.pending = Some(id);
        Ok((id, replaced))
    }

    /// Send `call` only if nothing is outstanding.
    pub(crate) fn issue_exclusive<B: Bus>(
        &mut self,
        bus: &mut B,
        call: MethodCall,
        path: &str,
    ) -> Result<CallId, CoreError> {
        if self.pending.is_some() {
            return Err(CoreError::AlreadyInProgress {
                path: path.to_owned(),
                property: property_of(&call),
            });
        }
        let id = bus.call(call)?;
        self.pending = Some(id);
        Ok(id)
    }

    /// Mark `id` as finished. Returns `true` when it was the outstanding
    /// call, `false` for stale completions.
    pub(crate) fn complete(&mut self, id: CallId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            trace!(%id, "ignoring stale completion");
            false
        }
    }

    /// Cancel the outstanding call, if any, and return its id.
    pub(crate) fn cancel<B: Bus>(&mut self, bus: &mut B) -> Option<CallId> {
        let id = self.pending.take()?;
        bus.cancel(id);
        Some(id)
    }
}

/// The property a `SetProperty` call targets, for error messages.
fn property_of(call: &MethodCall) -> String {
    call.args()
        .get_basic::<String>()
        .unwrap_or_else(|_| call.member.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use connui_bus::MockBus;

    use super::*;

    fn get_services() -> MethodCall {
        MethodCall::new("net.connman", "/", "net.connman.Manager", "GetServices")
    }

    fn set_powered() -> MethodCall {
        MethodCall::new(
            "net.connman",
            "/net/connman/technology/wifi",
            "net.connman.Technology",
            "SetProperty",
        )
        .with_args(|a| {
            a.append_keyed("Powered", true);
        })
        .unwrap()
    }

    #[test]
    fn reissue_cancels_and_replaces() {
        let mut bus = MockBus::new();
        let mut slot = CallSlot::default();

        let (first, replaced) = slot.issue(&mut bus, get_services()).unwrap();
        assert_eq!(replaced, None);
        let (second, replaced) = slot.issue(&mut bus, get_services()).unwrap();
        assert_eq!(replaced, Some(first));
        assert_eq!(bus.canceled, vec![first]);

        assert!(!slot.complete(first));
        assert!(slot.is_pending());
        assert!(slot.complete(second));
        assert!(!slot.is_pending());
    }

    #[test]
    fn exclusive_issue_rejects_while_pending() {
        let mut bus = MockBus::new();
        let mut slot = CallSlot::default();

        let id = slot
            .issue_exclusive(&mut bus, set_powered(), "/net/connman/technology/wifi")
            .unwrap();
        let err = slot
            .issue_exclusive(&mut bus, set_powered(), "/net/connman/technology/wifi")
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyInProgress { ref property, .. } if property == "Powered"
        ));
        assert_eq!(bus.calls.len(), 1);

        assert!(slot.complete(id));
        assert!(
            slot.issue_exclusive(&mut bus, set_powered(), "/net/connman/technology/wifi")
                .is_ok()
        );
    }

    #[test]
    fn failed_send_leaves_slot_empty() {
        let mut bus = MockBus::new();
        let mut slot = CallSlot::default();
        bus.fail_next = true;
        assert!(slot.issue(&mut bus, get_services()).is_err());
        assert!(!slot.is_pending());
    }

    #[test]
    fn cancel_reports_outstanding_call() {
        let mut bus = MockBus::new();
        let mut slot = CallSlot::default();
        assert_eq!(slot.cancel(&mut bus), None);
        let (id, _) = slot.issue(&mut bus, get_services()).unwrap();
        assert_eq!(slot.cancel(&mut bus), Some(id));
        assert_eq!(bus.canceled, vec![id]);
        assert!(!slot.complete(id));
    }
}
