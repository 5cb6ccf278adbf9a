//! Single-slot in-flight tracking for JSON posts.
//!
//! Only the most recent JSON post is remembered. A second post to the same
//! url while it is outstanding is suppressed; posts to other urls replace
//! the slot.

use std::sync::Mutex;

/// The request currently considered "in process".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlightRequest {
    pub url: String,
    pub token: String,
}

/// Shared in-flight slot. Empty while idle.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    slot: Mutex<Option<InFlightRequest>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `url`. Returns `None` when the same url is already
    /// in flight. The check and the claim happen under one lock.
    pub fn try_begin(&self, url: &str, token: &str) -> Option<InFlightTicket<'_>> {
        let mut slot = self.slot.lock().expect("in-flight guard mutex poisoned");
        if slot.as_ref().is_some_and(|current| current.url == url) {
            return None;
        }
        *slot = Some(InFlightRequest {
            url: url.to_string(),
            token: token.to_string(),
        });
        Some(InFlightTicket {
            guard: self,
            url: url.to_string(),
        })
    }

    /// Snapshot of the slot.
    pub fn current(&self) -> Option<InFlightRequest> {
        self.slot.lock().expect("in-flight guard mutex poisoned").clone()
    }

    pub fn is_idle(&self) -> bool {
        self.current().is_none()
    }

    fn finish(&self, url: &str) {
        let mut slot = self.slot.lock().expect("in-flight guard mutex poisoned");
        // A later post to another url may own the slot by now.
        if slot.as_ref().is_some_and(|current| current.url == url) {
            *slot = None;
        }
    }
}

/// Releases the slot when dropped, so a cancelled call cannot wedge it.
#[derive(Debug)]
pub struct InFlightTicket<'a> {
    guard: &'a InFlightGuard,
    url: String,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.guard.finish(&self.url);
    }
}
