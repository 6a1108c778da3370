//! # Beacon Runtime
//!
//! Shared-handle plumbing for the Beacon telemetry client.
//!
//! This crate provides:
//! - `LogConfiguration` and its builder
//! - The `PipelineInstance` / `InstanceFactory` capability traits
//! - `InstanceRegistry`: one reference-counted pipeline instance per module
//! - `DataViewerCollection`: thread-safe fan-out of encoded packets to viewers

pub mod config;
pub mod instance;
pub mod registry;
pub mod viewer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{LogConfiguration, LogConfigurationBuilder};
    pub use crate::instance::{InstanceFactory, PipelineError, PipelineInstance};
    pub use crate::registry::{AcquireStatus, Acquired, InstanceRegistry, ReleaseStatus};
    pub use crate::viewer::{DataViewer, DataViewerCollection};
}

/// Result type for Beacon runtime operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for Beacon runtime operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Viewer(#[from] viewer::ViewerError),
    #[error(transparent)]
    Pipeline(#[from] instance::PipelineError),
}
