//! Diagnostic debug-event channel.
//!
//! Components that must not fail their caller (validation in the property bag,
//! lifecycle transitions in the instance registry) report what happened here
//! instead. Dispatch is fire-and-forget: listeners are snapshotted under the
//! lock and invoked outside it, and a panicking listener is contained.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::validate::EventRejectedReason;

/// What a [`DebugEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugEventKind {
    /// An event name, record type or property key failed validation
    EventRejected,
    /// The instance registry created a pipeline instance
    InstanceCreated,
    /// The instance registry tore down a pipeline instance
    InstanceDestroyed,
    /// A data viewer failed while receiving a packet
    ViewerDispatchFailed,
}

/// A typed diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
    pub kind: DebugEventKind,
    /// Rejection cause, for `EventRejected`
    pub reason: Option<EventRejectedReason>,
    /// Identifier the event is about (rejected name, module name, viewer name)
    pub subject: String,
    /// Kind-specific numeric payload (e.g. remaining reference count)
    pub param: u64,
}

impl DebugEvent {
    pub fn new(kind: DebugEventKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            reason: None,
            subject: subject.into(),
            param: 0,
        }
    }

    pub fn rejected(reason: EventRejectedReason, subject: impl Into<String>) -> Self {
        Self {
            kind: DebugEventKind::EventRejected,
            reason: Some(reason),
            subject: subject.into(),
            param: reason.as_code() as u64,
        }
    }

    pub fn with_param(mut self, param: u64) -> Self {
        self.param = param;
        self
    }
}

/// Receiver of debug events.
pub trait DebugEventListener: Send + Sync {
    fn on_debug_event(&self, event: &DebugEvent);
}

impl<F> DebugEventListener for F
where
    F: Fn(&DebugEvent) + Send + Sync,
{
    fn on_debug_event(&self, event: &DebugEvent) {
        self(event)
    }
}

/// Broadcast sink for [`DebugEvent`]s.
#[derive(Default)]
pub struct DebugEventDispatcher {
    listeners: Mutex<Vec<Arc<dyn DebugEventListener>>>,
}

impl core::fmt::Debug for DebugEventDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DebugEventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl DebugEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide dispatcher used by components not bound to one.
    pub fn global() -> &'static Arc<DebugEventDispatcher> {
        static GLOBAL: OnceLock<Arc<DebugEventDispatcher>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(DebugEventDispatcher::new()))
    }

    // Every mutation is a single push/retain, so a poisoned list is still consistent.
    fn guard(&self) -> MutexGuard<'_, Vec<Arc<dyn DebugEventListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_listener(&self, listener: Arc<dyn DebugEventListener>) {
        self.guard().push(listener);
    }

    /// Remove a listener by identity. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn DebugEventListener>) -> bool {
        let mut listeners = self.guard();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.guard().len()
    }

    /// Deliver `event` to every listener. Returns whether anyone was listening.
    pub fn dispatch(&self, event: &DebugEvent) -> bool {
        let snapshot: Vec<_> = self.guard().clone();
        if snapshot.is_empty() {
            return false;
        }
        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.on_debug_event(event))).is_err() {
                tracing::warn!(kind = ?event.kind, "debug event listener panicked");
            }
        }
        true
    }
}

/// Test helper that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<DebugEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DebugEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: DebugEventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl DebugEventListener for RecordingListener {
    fn on_debug_event(&self, event: &DebugEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
