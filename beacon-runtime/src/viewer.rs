//! Diagnostic data-viewer registry.
//!
//! Viewers receive a copy of every encoded packet a pipeline emits. The
//! collection is either Disabled (empty) or Enabled (one or more viewers);
//! there is no separate switch.
//!
//! Dispatch holds the collection lock across the whole fan-out, so a
//! concurrent register or unregister never observes a partial broadcast.
//! A viewer must not call back into the collection from `receive_data`; doing
//! so deadlocks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use beacon_core::debug::{DebugEvent, DebugEventDispatcher, DebugEventKind};

/// Viewer registry errors. All are caller bugs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("viewer name must not be empty")]
    EmptyName,
    #[error("a viewer named `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("no viewer named `{0}` is registered")]
    NotRegistered(String),
}

/// Observer of encoded packets.
pub trait DataViewer: Send + Sync {
    /// Unique name within a collection
    fn name(&self) -> &str;

    /// Receive one encoded packet. Panics are contained by the collection.
    fn receive_data(&self, packet: &[u8]);
}

/// Ordered, named set of data viewers.
pub struct DataViewerCollection {
    viewers: Mutex<Vec<Arc<dyn DataViewer>>>,
    debug_events: Option<Arc<DebugEventDispatcher>>,
}

impl core::fmt::Debug for DataViewerCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<String> = self.guard().iter().map(|v| v.name().to_string()).collect();
        f.debug_struct("DataViewerCollection")
            .field("viewers", &names)
            .finish()
    }
}

impl Default for DataViewerCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl DataViewerCollection {
    pub fn new() -> Self {
        Self {
            viewers: Mutex::new(Vec::new()),
            debug_events: None,
        }
    }

    /// Report contained viewer failures on `dispatcher`.
    pub fn with_debug_events(mut self, dispatcher: Arc<DebugEventDispatcher>) -> Self {
        self.debug_events = Some(dispatcher);
        self
    }

    // Every mutation is a single push/remove/clear, so a poisoned vector is
    // still consistent.
    fn guard(&self) -> MutexGuard<'_, Vec<Arc<dyn DataViewer>>> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `viewer`. Name collisions are checked under the lock.
    pub fn register_viewer(&self, viewer: Arc<dyn DataViewer>) -> Result<(), ViewerError> {
        let name = viewer.name().to_string();
        if name.is_empty() {
            return Err(ViewerError::EmptyName);
        }

        let mut viewers = self.guard();
        if viewers.iter().any(|v| v.name() == name) {
            return Err(ViewerError::AlreadyRegistered(name));
        }
        viewers.push(viewer);
        tracing::debug!(viewer = %name, count = viewers.len(), "data viewer registered");
        Ok(())
    }

    /// Remove the viewer registered under `name`.
    pub fn unregister_viewer(&self, name: &str) -> Result<(), ViewerError> {
        if name.is_empty() {
            return Err(ViewerError::EmptyName);
        }

        let mut viewers = self.guard();
        let index = viewers
            .iter()
            .position(|v| v.name() == name)
            .ok_or_else(|| ViewerError::NotRegistered(name.to_string()))?;
        viewers.remove(index);
        tracing::debug!(viewer = name, count = viewers.len(), "data viewer unregistered");
        Ok(())
    }

    /// Remove every viewer.
    pub fn unregister_all_viewers(&self) {
        self.guard().clear();
    }

    /// True when at least one viewer is registered.
    pub fn is_viewer_enabled(&self) -> bool {
        !self.guard().is_empty()
    }

    /// True when a viewer with exactly `name` is registered.
    pub fn is_viewer_enabled_named(&self, name: &str) -> Result<bool, ViewerError> {
        if name.is_empty() {
            return Err(ViewerError::EmptyName);
        }
        Ok(self.guard().iter().any(|v| v.name() == name))
    }

    /// Names of registered viewers, in registration order
    pub fn viewer_names(&self) -> Vec<String> {
        self.guard().iter().map(|v| v.name().to_string()).collect()
    }

    /// Number of registered viewers
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// True when no viewer is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Broadcast `packet` to every viewer in registration order.
    ///
    /// Never fails. A panicking viewer is logged and skipped; the rest still
    /// receive the packet.
    pub fn dispatch_data_viewer_event(&self, packet: &[u8]) {
        let viewers = self.guard();
        if viewers.is_empty() {
            return;
        }

        for viewer in viewers.iter() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| viewer.receive_data(packet)));
            if delivered.is_err() {
                tracing::warn!(viewer = viewer.name(), bytes = packet.len(), "data viewer panicked");
                if let Some(dispatcher) = &self.debug_events {
                    dispatcher.dispatch(
                        &DebugEvent::new(DebugEventKind::ViewerDispatchFailed, viewer.name())
                            .with_param(packet.len() as u64),
                    );
                }
            }
        }
    }
}

/// Viewer that records every packet it receives.
#[derive(Debug)]
pub struct RecordingViewer {
    name: String,
    packets: Mutex<Vec<Vec<u8>>>,
}

impl RecordingViewer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packets: Mutex::new(Vec::new()),
        }
    }

    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn packet_count(&self) -> usize {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl DataViewer for RecordingViewer {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive_data(&self, packet: &[u8]) {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packet.to_vec());
    }
}
