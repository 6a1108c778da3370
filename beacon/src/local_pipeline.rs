//! In-process reference pipeline.
//!
//! [`LocalPipeline`] stands in for the real upload pipeline: it encodes each
//! event as JSON, shows the packet to the data viewers, and keeps it in a
//! memory queue until drained or flushed to a [`PacketSink`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use beacon_core::properties::EventProperties;
use beacon_core::value::TimeTicks;
use beacon_runtime::config::LogConfiguration;
use beacon_runtime::instance::{InstanceFactory, PipelineError, PipelineInstance};
use beacon_runtime::viewer::DataViewerCollection;

/// Destination for packets flushed during teardown.
pub trait PacketSink: Send + Sync {
    fn upload(&self, module_name: &str, packet: &[u8]);
}

impl<F> PacketSink for F
where
    F: Fn(&str, &[u8]) + Send + Sync,
{
    fn upload(&self, module_name: &str, packet: &[u8]) {
        self(module_name, packet)
    }
}

/// Memory-queued pipeline instance.
pub struct LocalPipeline {
    config: LogConfiguration,
    viewers: Arc<DataViewerCollection>,
    sink: Option<Arc<dyn PacketSink>>,
    queue: Mutex<VecDeque<Vec<u8>>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for LocalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPipeline")
            .field("module", &self.config.module_name)
            .field("queued", &self.queued())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl LocalPipeline {
    pub fn new(config: LogConfiguration, viewers: Arc<DataViewerCollection>) -> Self {
        Self {
            config,
            viewers,
            sink: None,
            queue: Mutex::new(VecDeque::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PacketSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &LogConfiguration {
        &self.config
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encode an event the way `submit` does, without queueing it.
    pub fn encode(event: &EventProperties) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(event).map_err(|e| PipelineError::Encode(e.to_string()))
    }

    /// Take every queued packet, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.guard().drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.guard().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl PipelineInstance for LocalPipeline {
    fn module_name(&self) -> &str {
        &self.config.module_name
    }

    fn submit(&self, mut event: EventProperties) -> Result<(), PipelineError> {
        if self.is_shut_down() {
            return Err(PipelineError::ShutDown);
        }
        if event.timestamp() == 0 {
            event.set_timestamp(TimeTicks::now().to_unix_millis());
        }

        let packet = Self::encode(&event)?;
        self.viewers.dispatch_data_viewer_event(&packet);
        tracing::debug!(
            module = %self.config.module_name,
            event = event.name(),
            bytes = packet.len(),
            "event queued"
        );

        // Teardown sets the flag before its final drain, so checking under the
        // queue lock means no packet is queued after that drain.
        let mut queue = self.guard();
        if self.is_shut_down() {
            return Err(PipelineError::ShutDown);
        }
        queue.push_back(packet);
        Ok(())
    }

    fn flush_and_teardown(&self, budget: Duration) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let started = Instant::now();
        let mut flushed = 0usize;
        loop {
            if started.elapsed() > budget {
                break;
            }
            let Some(packet) = self.guard().pop_front() else {
                break;
            };
            if let Some(sink) = &self.sink {
                sink.upload(&self.config.module_name, &packet);
            }
            flushed += 1;
        }

        let dropped = self.drain().len();
        if dropped > 0 {
            tracing::warn!(
                module = %self.config.module_name,
                flushed,
                dropped,
                ?budget,
                "teardown budget exhausted"
            );
        } else {
            tracing::info!(module = %self.config.module_name, flushed, "pipeline torn down");
        }
    }
}

/// Factory producing [`LocalPipeline`] instances that share one viewer collection.
#[derive(Clone)]
pub struct LocalPipelineFactory {
    viewers: Arc<DataViewerCollection>,
    sink: Option<Arc<dyn PacketSink>>,
}

impl LocalPipelineFactory {
    pub fn new(viewers: Arc<DataViewerCollection>) -> Self {
        Self { viewers, sink: None }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PacketSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl InstanceFactory for LocalPipelineFactory {
    fn create(&self, config: &LogConfiguration) -> Result<Arc<dyn PipelineInstance>, PipelineError> {
        let mut pipeline = LocalPipeline::new(config.clone(), self.viewers.clone());
        if let Some(sink) = &self.sink {
            pipeline = pipeline.with_sink(sink.clone());
        }
        Ok(Arc::new(pipeline))
    }
}
