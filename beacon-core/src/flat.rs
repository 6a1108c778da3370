//! Flat-record adapter for hosts that exchange properties as an array of
//! plain records (the legacy C API shape).
//!
//! This sits on top of [`EventProperties`]; the bag's own representation does
//! not depend on it. Classification travels as raw numeric codes, as it does
//! across the C boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::properties::EventProperties;
use crate::value::{DataCategory, EventProperty, PiiKind, PropertyValue, TimeTicks};
use crate::Result;

/// Reserved key carrying the event name.
pub const KEY_NAME: &str = "name";
/// Reserved key carrying the event time (epoch millis or ticks).
pub const KEY_TIME: &str = "time";
/// Reserved key carrying the sampling percentage.
pub const KEY_POP_SAMPLE: &str = "popSample";

/// Value slot of a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlatValue {
    Str(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Time(u64),
    Guid([u8; 16]),
    StrArray(Vec<String>),
    Int64Array(Vec<i64>),
    DoubleArray(Vec<f64>),
    GuidArray(Vec<[u8; 16]>),
}

/// One named property in flat form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatProperty {
    pub name: String,
    pub value: FlatValue,
    pub pii_kind: u8,
    pub category: u8,
}

impl FlatProperty {
    pub fn new(name: impl Into<String>, value: FlatValue) -> Self {
        Self {
            name: name.into(),
            value,
            pii_kind: PiiKind::None.as_code(),
            category: DataCategory::PartC.as_code(),
        }
    }
}

impl From<&PropertyValue> for FlatValue {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Str(s) => FlatValue::Str(s.clone()),
            PropertyValue::Int64(v) => FlatValue::Int64(*v),
            PropertyValue::Double(v) => FlatValue::Double(*v),
            PropertyValue::Bool(v) => FlatValue::Bool(*v),
            PropertyValue::Time(t) => FlatValue::Time(t.ticks()),
            PropertyValue::Guid(g) => FlatValue::Guid(*g.as_bytes()),
            PropertyValue::StrArray(v) => FlatValue::StrArray(v.clone()),
            PropertyValue::Int64Array(v) => FlatValue::Int64Array(v.clone()),
            PropertyValue::DoubleArray(v) => FlatValue::DoubleArray(v.clone()),
            PropertyValue::GuidArray(v) => {
                FlatValue::GuidArray(v.iter().map(|g| *g.as_bytes()).collect())
            }
        }
    }
}

impl From<FlatValue> for PropertyValue {
    fn from(value: FlatValue) -> Self {
        match value {
            FlatValue::Str(s) => PropertyValue::Str(s),
            FlatValue::Int64(v) => PropertyValue::Int64(v),
            FlatValue::Double(v) => PropertyValue::Double(v),
            FlatValue::Bool(v) => PropertyValue::Bool(v),
            FlatValue::Time(t) => PropertyValue::Time(TimeTicks::new(t)),
            FlatValue::Guid(b) => PropertyValue::Guid(Uuid::from_bytes(b)),
            FlatValue::StrArray(v) => PropertyValue::StrArray(v),
            FlatValue::Int64Array(v) => PropertyValue::Int64Array(v),
            FlatValue::DoubleArray(v) => PropertyValue::DoubleArray(v),
            FlatValue::GuidArray(v) => {
                PropertyValue::GuidArray(v.into_iter().map(Uuid::from_bytes).collect())
            }
        }
    }
}

/// Flatten both property maps: category C first, then category B.
pub fn pack(props: &EventProperties) -> Vec<FlatProperty> {
    [DataCategory::PartC, DataCategory::PartB]
        .into_iter()
        .flat_map(|category| {
            props.properties(category).iter().map(move |(key, prop)| FlatProperty {
                name: key.clone(),
                value: FlatValue::from(&prop.value),
                pii_kind: prop.pii_kind.as_code(),
                category: category.as_code(),
            })
        })
        .collect()
}

enum Decoded {
    Name(String),
    Timestamp(i64),
    PopSample(f64),
    Property(String, EventProperty),
}

// A reserved key whose value has another type is an ordinary property.
fn decode(record: &FlatProperty) -> Result<Decoded> {
    match (record.name.as_str(), &record.value) {
        (KEY_NAME, FlatValue::Str(name)) => Ok(Decoded::Name(name.clone())),
        (KEY_TIME, FlatValue::Int64(millis)) => Ok(Decoded::Timestamp(*millis)),
        (KEY_TIME, FlatValue::Time(ticks)) => {
            Ok(Decoded::Timestamp(TimeTicks::new(*ticks).to_unix_millis()))
        }
        (KEY_POP_SAMPLE, FlatValue::Double(v)) => Ok(Decoded::PopSample(*v)),
        (key, value) => {
            let property = EventProperty::new(PropertyValue::from(value.clone()))
                .with_pii(PiiKind::from_code(record.pii_kind)?)
                .with_category(DataCategory::from_code(record.category)?);
            Ok(Decoded::Property(key.to_string(), property))
        }
    }
}

/// Apply flat records to `props`.
///
/// All records are decoded before any is applied, so an unknown classification
/// code leaves `props` untouched. Decoded records then go
/// through the bag's normal setters and their validation.
pub fn unpack(props: &mut EventProperties, records: &[FlatProperty]) -> Result<()> {
    let decoded = records.iter().map(decode).collect::<Result<Vec<_>>>()?;
    for item in decoded {
        match item {
            Decoded::Name(name) => {
                props.set_name(&name);
            }
            Decoded::Timestamp(millis) => props.set_timestamp(millis),
            Decoded::PopSample(v) => {
                props.set_pop_sample(v);
            }
            Decoded::Property(key, property) => props.set_event_property(&key, property),
        }
    }
    Ok(())
}
