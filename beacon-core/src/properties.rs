//! The event property bag.
//!
//! [`EventProperties`] owns an event's identity, delivery metadata and two
//! independent property maps (category C custom properties and category B
//! schema properties). Every mutation goes through the bag's setters, which
//! validate names and keys.
//!
//! Invalid input never fails the caller: the setter returns `false` (or does
//! nothing), logs at error level, and reports an `EventRejected` debug event.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::debug::{DebugEvent, DebugEventDispatcher};
use crate::delivery::{EventLatency, EventPersistence, EventPriority};
use crate::validate::{
    sanitize_identifier, validate_event_name, validate_property_name, EventRejectedReason,
};
use crate::value::{CustomerContentKind, DataCategory, EventProperty, PiiKind, PropertyValue};

/// Name given to events constructed without one.
pub const DEFAULT_EVENT_NAME: &str = "undefined";

/// Default client-side sampling percentage.
pub const DEFAULT_POP_SAMPLE: f64 = 100.0;

/// Key → property map for one category.
pub type PropertyMap = BTreeMap<String, EventProperty>;

/// Key → (canonical value, PII kind) projection.
pub type PiiPropertyMap = BTreeMap<String, (String, PiiKind)>;

/// Key → (canonical value, customer-content kind) projection.
pub type CustomerContentPropertyMap = BTreeMap<String, (String, CustomerContentKind)>;

/// Properties of a single telemetry event.
#[derive(Debug, Clone, Serialize)]
pub struct EventProperties {
    name: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    event_type: String,
    timestamp_millis: i64,
    priority: EventPriority,
    latency: EventLatency,
    persistence: EventPersistence,
    pop_sample: f64,
    policy_bit_flags: u64,
    properties: PropertyMap,
    properties_part_b: PropertyMap,
    #[serde(skip)]
    debug_events: Option<Arc<DebugEventDispatcher>>,
}

impl Default for EventProperties {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_NAME)
    }
}

impl EventProperties {
    /// Create an empty bag. An empty or invalid `name` leaves the default name.
    pub fn new(name: &str) -> Self {
        let mut props = Self {
            name: DEFAULT_EVENT_NAME.to_string(),
            event_type: String::new(),
            timestamp_millis: 0,
            priority: EventPriority::Unspecified,
            latency: EventLatency::Normal,
            persistence: EventPersistence::Normal,
            pop_sample: DEFAULT_POP_SAMPLE,
            policy_bit_flags: 0,
            properties: PropertyMap::new(),
            properties_part_b: PropertyMap::new(),
            debug_events: None,
        };
        if !name.is_empty() {
            props.set_name(name);
        }
        props
    }

    /// Like [`new`](Self::new), but a rejected `name` is reported to `dispatcher`.
    pub fn new_with_debug_events(name: &str, dispatcher: Arc<DebugEventDispatcher>) -> Self {
        let mut props = Self::new("").with_debug_events(dispatcher);
        if !name.is_empty() {
            props.set_name(name);
        }
        props
    }

    /// Create a bag and insert `properties` through the validated path.
    pub fn with_properties<K, I>(name: &str, properties: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, EventProperty)>,
    {
        let mut props = Self::new(name);
        props.extend(properties);
        props
    }

    /// Report rejections to `dispatcher` instead of the process-wide one.
    pub fn with_debug_events(mut self, dispatcher: Arc<DebugEventDispatcher>) -> Self {
        self.debug_events = Some(dispatcher);
        self
    }

    /// Rebind the rejection channel.
    pub fn set_debug_events(&mut self, dispatcher: Arc<DebugEventDispatcher>) {
        self.debug_events = Some(dispatcher);
    }

    fn reject(&self, reason: EventRejectedReason, what: &'static str, subject: &str) {
        tracing::error!(what, subject, %reason, "rejected event input");
        let event = DebugEvent::rejected(reason, subject);
        match &self.debug_events {
            Some(dispatcher) => dispatcher.dispatch(&event),
            None => DebugEventDispatcher::global().dispatch(&event),
        };
    }

    /// Set the event name. On failure the current name is kept.
    pub fn set_name(&mut self, name: &str) -> bool {
        let sanitized = sanitize_identifier(name);
        if let Err(reason) = validate_event_name(&sanitized) {
            self.reject(reason, "event name", name);
            return false;
        }
        self.name = sanitized;
        true
    }

    /// Current event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the record type; lower-cased before validation.
    pub fn set_type(&mut self, record_type: &str) -> bool {
        let sanitized = sanitize_identifier(&record_type.to_lowercase());
        if let Err(reason) = validate_event_name(&sanitized) {
            self.reject(reason, "event type", record_type);
            return false;
        }
        self.event_type = sanitized;
        true
    }

    /// Record type, empty when never set.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Epoch milliseconds; `0` lets the pipeline assign the time.
    pub fn set_timestamp(&mut self, timestamp_in_epoch_millis: i64) {
        self.timestamp_millis = timestamp_in_epoch_millis;
    }

    /// Event time in epoch milliseconds, `0` when unset
    pub fn timestamp(&self) -> i64 {
        self.timestamp_millis
    }

    /// Set the legacy priority and derive latency/persistence from it.
    pub fn set_priority(&mut self, priority: EventPriority) {
        self.priority = priority;
        if let Some((latency, persistence)) = priority.delivery_class() {
            self.latency = latency;
            self.persistence = persistence;
        }
    }

    /// Legacy priority as last set
    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    /// Override the latency class without touching the priority.
    pub fn set_latency(&mut self, latency: EventLatency) {
        self.latency = latency;
    }

    /// Current latency class
    pub fn latency(&self) -> EventLatency {
        self.latency
    }

    /// Override the persistence class without touching the priority.
    pub fn set_persistence(&mut self, persistence: EventPersistence) {
        self.persistence = persistence;
    }

    /// Current persistence class
    pub fn persistence(&self) -> EventPersistence {
        self.persistence
    }

    /// Set the sampling percentage. Values outside `0..=100` are rejected.
    pub fn set_pop_sample(&mut self, pop_sample: f64) -> bool {
        if !(0.0..=100.0).contains(&pop_sample) {
            self.reject(
                EventRejectedReason::ValueOutOfRange,
                "pop sample",
                &pop_sample.to_string(),
            );
            return false;
        }
        self.pop_sample = pop_sample;
        true
    }

    /// Sampling percentage, `100.0` unless set
    pub fn pop_sample(&self) -> f64 {
        self.pop_sample
    }

    /// Replace the policy bit flags.
    pub fn set_policy_bit_flags(&mut self, flags: u64) {
        self.policy_bit_flags = flags;
    }

    /// Policy bit flags as last set
    pub fn policy_bit_flags(&self) -> u64 {
        self.policy_bit_flags
    }

    /// Insert or overwrite `key` in the map chosen by `property.category`.
    ///
    /// Every `set_property*` variant ends here, so keys are validated exactly once.
    pub fn set_event_property(&mut self, key: &str, property: EventProperty) {
        if let Err(reason) = validate_property_name(key) {
            self.reject(reason, "property key", key);
            return;
        }
        self.map_mut(property.category)
            .insert(key.to_string(), property);
    }

    /// Unclassified category-C property
    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.set_event_property(key, EventProperty::new(value));
    }

    pub fn set_property_with_pii(
        &mut self,
        key: &str,
        value: impl Into<PropertyValue>,
        pii_kind: PiiKind,
    ) {
        self.set_event_property(key, EventProperty::new(value).with_pii(pii_kind));
    }

    pub fn set_property_with_content(
        &mut self,
        key: &str,
        value: impl Into<PropertyValue>,
        kind: CustomerContentKind,
    ) {
        self.set_event_property(key, EventProperty::new(value).with_customer_content(kind));
    }

    pub fn set_property_in(
        &mut self,
        key: &str,
        value: impl Into<PropertyValue>,
        pii_kind: PiiKind,
        category: DataCategory,
    ) {
        self.set_event_property(
            key,
            EventProperty::new(value)
                .with_pii(pii_kind)
                .with_category(category),
        );
    }

    /// Merge entries into their categories' maps; last write wins.
    pub fn extend<K, I>(&mut self, properties: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, EventProperty)>,
    {
        for (key, property) in properties {
            self.set_event_property(key.as_ref(), property);
        }
    }

    /// Clear both maps, then insert `properties`.
    pub fn assign<K, I>(&mut self, properties: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, EventProperty)>,
    {
        self.properties.clear();
        self.properties_part_b.clear();
        self.extend(properties);
    }

    fn map_mut(&mut self, category: DataCategory) -> &mut PropertyMap {
        match category {
            DataCategory::PartC => &mut self.properties,
            DataCategory::PartB => &mut self.properties_part_b,
        }
    }

    /// The map for `category`. Callers must not rely on its ordering.
    pub fn properties(&self, category: DataCategory) -> &PropertyMap {
        match category {
            DataCategory::PartC => &self.properties,
            DataCategory::PartB => &self.properties_part_b,
        }
    }

    /// Look up `key` in the map for `category`.
    pub fn property(&self, key: &str, category: DataCategory) -> Option<&EventProperty> {
        self.properties(category).get(key)
    }

    /// Entries of `category` with a PII kind, freshly computed on each call.
    pub fn pii_properties(&self, category: DataCategory) -> PiiPropertyMap {
        self.properties(category)
            .iter()
            .filter(|(_, prop)| prop.is_pii())
            .map(|(key, prop)| (key.clone(), (prop.value.to_string(), prop.pii_kind)))
            .collect()
    }

    /// Entries of `category` with a customer-content kind, freshly computed on each call.
    pub fn customer_content_properties(&self, category: DataCategory) -> CustomerContentPropertyMap {
        self.properties(category)
            .iter()
            .filter(|(_, prop)| prop.is_customer_content())
            .map(|(key, prop)| {
                (
                    key.clone(),
                    (prop.value.to_string(), prop.customer_content_kind),
                )
            })
            .collect()
    }
}
