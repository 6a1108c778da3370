//! # Beacon Core
//!
//! Event data model for the Beacon telemetry client.
//!
//! This crate provides:
//! - Typed property values with PII and customer-content classification
//! - The event property bag (`EventProperties`) with name/key validation
//! - Identifier sanitization and the rejection-reason enumeration
//! - The diagnostic debug-event channel that validation failures report to
//!
//! ## Feature Flags
//!
//! - `flat` (default): Enable the flat-record `pack`/`unpack` adapter

pub mod debug;
pub mod delivery;
pub mod properties;
pub mod validate;
pub mod value;

#[cfg(feature = "flat")]
pub mod flat;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::debug::{DebugEvent, DebugEventDispatcher, DebugEventKind, DebugEventListener};
    pub use crate::delivery::*;
    pub use crate::properties::EventProperties;
    pub use crate::validate::EventRejectedReason;
    pub use crate::value::*;
}

/// Result type for Beacon core operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for Beacon core operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A numeric code did not map onto any known enumeration value
    #[error("unknown {kind} code: {code}")]
    UnknownCode {
        /// Enumeration the code was decoded for
        kind: &'static str,
        /// Offending code
        code: i64,
    },
}
