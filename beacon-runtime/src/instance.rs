//! Pipeline-instance capability.
//!
//! The pipeline itself (batching, persistence, upload, wire encoding) lives
//! outside this workspace. The registry only needs to construct an instance
//! from a configuration, hand it to callers, and tear it down.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::properties::EventProperties;

use crate::config::LogConfiguration;

/// Errors raised by pipeline instances and their factories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The instance has already been torn down
    #[error("pipeline instance is shut down")]
    ShutDown,
    /// The event could not be encoded into a packet
    #[error("event encoding failed: {0}")]
    Encode(String),
    /// The configuration cannot produce an instance
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// A shared telemetry pipeline handed out by the instance registry.
pub trait PipelineInstance: Send + Sync {
    /// Module name the instance was created for
    fn module_name(&self) -> &str;

    /// Accept one event for encoding and transmission
    fn submit(&self, event: EventProperties) -> Result<(), PipelineError>;

    /// Flush pending work, spending at most `budget`, then stop
    fn flush_and_teardown(&self, budget: Duration);
}

/// Constructs pipeline instances for the registry.
///
/// Called while the registry lock is held; implementations must not call back
/// into the registry.
pub trait InstanceFactory: Send + Sync {
    fn create(&self, config: &LogConfiguration) -> Result<Arc<dyn PipelineInstance>, PipelineError>;
}

impl<F> InstanceFactory for F
where
    F: Fn(&LogConfiguration) -> Result<Arc<dyn PipelineInstance>, PipelineError> + Send + Sync,
{
    fn create(&self, config: &LogConfiguration) -> Result<Arc<dyn PipelineInstance>, PipelineError> {
        self(config)
    }
}
