//! # Beacon
//!
//! In-process telemetry client core.
//!
//! Applications describe events with [`EventProperties`], obtain a shared
//! pipeline instance per module from the [`TelemetryHost`], and may attach
//! data viewers that see every encoded packet.
//!
//! ```rust,no_run
//! use beacon::prelude::*;
//!
//! fn main() -> beacon::Result<()> {
//!     let host = TelemetryHost::new();
//!     let config = LogConfiguration::builder()
//!         .module_name("EventSender")
//!         .version("1.0.0")
//!         .build();
//!
//!     let acquired = host.acquire(&config)?;
//!     acquired.instance.submit(EventProperties::new("simple_event"))?;
//!
//!     host.release(&config)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `flat` (default): Flat-record pack/unpack adapter
//!
//! ## Crate Structure
//!
//! - [`beacon_core`]: Event property bag, values, validation, debug events
//! - [`beacon_runtime`]: Instance registry and data-viewer collection
//! - [`beacon_net`]: HTTP abstraction and the remote default data viewer

#![forbid(unsafe_code)]

// Re-export sub-crates
pub use beacon_core as core;
pub use beacon_net as net;
pub use beacon_runtime as runtime;

// Re-export commonly used items at the top level
pub use beacon_core::{
    debug::{DebugEvent, DebugEventDispatcher, DebugEventKind, DebugEventListener},
    properties::EventProperties,
    value::{DataCategory, EventProperty, PiiKind, PropertyValue},
};
pub use beacon_runtime::{
    config::LogConfiguration,
    registry::{AcquireStatus, Acquired, InstanceRegistry, ReleaseStatus},
    viewer::{DataViewer, DataViewerCollection},
};

mod error;
pub mod host;
pub mod local_pipeline;

pub use error::{Error, Result};
pub use host::TelemetryHost;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::net::prelude::*;
    pub use crate::runtime::prelude::*;

    pub use crate::host::TelemetryHost;
    pub use crate::local_pipeline::{LocalPipeline, LocalPipelineFactory};
}
