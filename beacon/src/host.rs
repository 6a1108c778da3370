//! Composition root.
//!
//! A [`TelemetryHost`] wires one instance registry, one data-viewer collection
//! and one debug-event dispatcher together. Applications normally hold a
//! single host for the life of the process.

use std::sync::Arc;

use beacon_core::debug::DebugEventDispatcher;
use beacon_runtime::config::LogConfiguration;
use beacon_runtime::instance::InstanceFactory;
use beacon_runtime::registry::{Acquired, InstanceRegistry, ReleaseStatus};
use beacon_runtime::viewer::DataViewerCollection;

use crate::local_pipeline::LocalPipelineFactory;
use crate::Result;

/// Owner of the registry, the viewers and the debug channel.
#[derive(Debug)]
pub struct TelemetryHost {
    registry: InstanceRegistry,
    viewers: Arc<DataViewerCollection>,
    debug_events: Arc<DebugEventDispatcher>,
}

impl Default for TelemetryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHost {
    /// Host backed by [`LocalPipeline`](crate::local_pipeline::LocalPipeline) instances.
    pub fn new() -> Self {
        Self::with_factory(|viewers| Arc::new(LocalPipelineFactory::new(viewers)))
    }

    /// Host backed by a custom pipeline factory.
    ///
    /// `make_factory` receives the host's viewer collection so the instances it
    /// builds can broadcast their packets.
    pub fn with_factory<F>(make_factory: F) -> Self
    where
        F: FnOnce(Arc<DataViewerCollection>) -> Arc<dyn InstanceFactory>,
    {
        let debug_events = Arc::new(DebugEventDispatcher::new());
        let viewers = Arc::new(DataViewerCollection::new().with_debug_events(debug_events.clone()));
        let registry =
            InstanceRegistry::new(make_factory(viewers.clone())).with_debug_events(debug_events.clone());
        Self {
            registry,
            viewers,
            debug_events,
        }
    }

    pub fn acquire(&self, config: &LogConfiguration) -> Result<Acquired> {
        Ok(self.registry.acquire(config)?)
    }

    pub fn acquire_module(&self, module_name: &str) -> Result<Acquired> {
        Ok(self.registry.acquire_module(module_name)?)
    }

    pub fn release(&self, config: &LogConfiguration) -> Result<ReleaseStatus> {
        Ok(self.registry.release(config)?)
    }

    pub fn release_module(&self, module_name: &str) -> Result<ReleaseStatus> {
        Ok(self.registry.release_module(module_name)?)
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn viewers(&self) -> &Arc<DataViewerCollection> {
        &self.viewers
    }

    /// Dispatcher receiving lifecycle and viewer-failure events.
    ///
    /// Event bags report validation failures here only when bound with
    /// [`EventProperties::with_debug_events`](beacon_core::properties::EventProperties::with_debug_events).
    pub fn debug_events(&self) -> &Arc<DebugEventDispatcher> {
        &self.debug_events
    }

    /// Tear down every instance and drop every viewer.
    ///
    /// Returns the number of instances torn down.
    pub fn shutdown(&self) -> usize {
        let torn_down = self.registry.release_all();
        self.viewers.unregister_all_viewers();
        tracing::info!(torn_down, "telemetry host shut down");
        torn_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::debug::{DebugEventKind, RecordingListener};
    use beacon_core::properties::EventProperties;
    use beacon_runtime::registry::AcquireStatus;
    use beacon_runtime::viewer::RecordingViewer;

    #[test]
    fn acquired_instance_feeds_host_viewers() {
        let host = TelemetryHost::new();
        let recorder = Arc::new(RecordingViewer::new("recorder"));
        host.viewers().register_viewer(recorder.clone()).unwrap();

        let acquired = host.acquire_module("EventSender").unwrap();
        assert_eq!(acquired.status, AcquireStatus::Created);
        acquired
            .instance
            .submit(EventProperties::new("simple_event"))
            .unwrap();

        assert_eq!(recorder.packet_count(), 1);
    }

    #[test]
    fn lifecycle_reaches_debug_channel() {
        let host = TelemetryHost::new();
        let listener = Arc::new(RecordingListener::new());
        host.debug_events().add_listener(listener.clone());

        host.acquire_module("svc").unwrap();
        host.release_module("svc").unwrap();

        assert_eq!(listener.count(DebugEventKind::InstanceCreated), 1);
        assert_eq!(listener.count(DebugEventKind::InstanceDestroyed), 1);
    }

    #[test]
    fn shutdown_clears_everything() {
        let host = TelemetryHost::new();
        host.viewers()
            .register_viewer(Arc::new(RecordingViewer::new("r")))
            .unwrap();
        host.acquire_module("a").unwrap();
        host.acquire_module("b").unwrap();

        assert_eq!(host.shutdown(), 2);
        assert!(host.registry().is_empty());
        assert!(!host.viewers().is_viewer_enabled());
    }

    #[test]
    fn release_unknown_module_is_error() {
        let host = TelemetryHost::new();
        assert!(host.release_module("missing").is_err());
    }
}
