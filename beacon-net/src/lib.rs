//! # Beacon Network
//!
//! HTTP plumbing for the Beacon telemetry client.
//!
//! This crate provides:
//! - The `HttpClient` trait that hosts implement over their HTTP stack
//! - `DefaultDataViewer`, a data viewer that forwards packets to a remote endpoint
//! - `MockHttpClient` for tests

pub mod default_viewer;
pub mod http;

mod mock;
pub use mock::MockHttpClient;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::default_viewer::{DefaultDataViewer, DefaultDataViewerConfig};
    pub use crate::http::*;
}

/// Network error type
pub use default_viewer::HttpViewerError as Error;

/// Result type for network operations
pub type Result<T> = core::result::Result<T, Error>;
