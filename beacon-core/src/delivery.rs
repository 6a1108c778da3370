//! Delivery metadata attached to an event.
//!
//! `EventPriority` is the legacy coarse knob; the pipeline acts on the two
//! richer fields it maps onto, [`EventLatency`] and [`EventPersistence`].

use serde::{Deserialize, Serialize};

/// Legacy transmit priority. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EventPriority {
    #[default]
    Unspecified,
    Off,
    Low,
    Normal,
    High,
    Immediate,
}

impl EventPriority {
    /// Latency and persistence implied by this priority, if any.
    ///
    /// Priorities below `Low` imply nothing and leave the current values alone.
    pub fn delivery_class(self) -> Option<(EventLatency, EventPersistence)> {
        if self >= EventPriority::High {
            Some((EventLatency::RealTime, EventPersistence::Critical))
        } else if self >= EventPriority::Low {
            Some((EventLatency::Normal, EventPersistence::Normal))
        } else {
            None
        }
    }
}

/// How urgently the pipeline should transmit an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EventLatency {
    Unspecified,
    Off,
    #[default]
    Normal,
    CostDeferred,
    RealTime,
    Max,
}

impl EventLatency {
    pub fn as_str(self) -> &'static str {
        match self {
            EventLatency::Unspecified => "Unspecified",
            EventLatency::Off => "Off",
            EventLatency::Normal => "Normal",
            EventLatency::CostDeferred => "CostDeferred",
            EventLatency::RealTime => "RealTime",
            EventLatency::Max => "Max",
        }
    }
}

/// How durably an event should survive offline storage pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EventPersistence {
    #[default]
    Normal,
    Critical,
}
