//! Facade error type.

/// Result type for Beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Beacon operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] beacon_core::Error),
    #[error(transparent)]
    Registry(#[from] beacon_runtime::registry::RegistryError),
    #[error(transparent)]
    Viewer(#[from] beacon_runtime::viewer::ViewerError),
    #[error(transparent)]
    Pipeline(#[from] beacon_runtime::instance::PipelineError),
    #[error(transparent)]
    Http(#[from] beacon_net::Error),
    /// Configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(String),
}
