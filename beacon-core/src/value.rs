//! Property values and their classification.
//!
//! A [`PropertyValue`] is a closed sum over the scalar and array kinds an event
//! can carry. Every kind has exactly one canonical string form, produced by its
//! `Display` impl, which the PII/customer-content projections and diagnostics
//! rely on.

use core::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// 100-ns ticks per second.
const TICKS_PER_SECOND: u64 = 10_000_000;
/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const TICKS_AT_UNIX_EPOCH: u64 = 621_355_968_000_000_000;

/// A point in time as 100-ns ticks since 0001-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeTicks(pub u64);

impl TimeTicks {
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(&self) -> u64 {
        self.0
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a wall-clock time; times before year 1 saturate to zero.
    pub fn from_system_time(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => {
                let delta = (after.as_nanos() / 100).min(u64::MAX as u128) as u64;
                TICKS_AT_UNIX_EPOCH.saturating_add(delta)
            }
            Err(before) => {
                let delta = (before.duration().as_nanos() / 100).min(u64::MAX as u128) as u64;
                TICKS_AT_UNIX_EPOCH.saturating_sub(delta)
            }
        };
        Self(ticks)
    }

    /// Milliseconds since the Unix epoch (negative before 1970).
    pub fn to_unix_millis(&self) -> i64 {
        let ticks_per_milli = (TICKS_PER_SECOND / 1000) as i128;
        ((self.0 as i128 - TICKS_AT_UNIX_EPOCH as i128) / ticks_per_milli) as i64
    }
}

impl From<SystemTime> for TimeTicks {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for TimeTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Personally-identifiable information category of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PiiKind {
    #[default]
    None = 0,
    DistinguishedName = 1,
    GenericData = 2,
    IPv4Address = 3,
    IPv6Address = 4,
    MailSubject = 5,
    PhoneNumber = 6,
    QueryString = 7,
    SipAddress = 8,
    SmtpAddress = 9,
    Identity = 10,
    Uri = 11,
    Fqdn = 12,
}

impl PiiKind {
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::None,
            1 => Self::DistinguishedName,
            2 => Self::GenericData,
            3 => Self::IPv4Address,
            4 => Self::IPv6Address,
            5 => Self::MailSubject,
            6 => Self::PhoneNumber,
            7 => Self::QueryString,
            8 => Self::SipAddress,
            9 => Self::SmtpAddress,
            10 => Self::Identity,
            11 => Self::Uri,
            12 => Self::Fqdn,
            other => {
                return Err(Error::UnknownCode {
                    kind: "pii kind",
                    code: other as i64,
                })
            }
        })
    }
}

/// Content-sensitivity classification, independent of [`PiiKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CustomerContentKind {
    #[default]
    None = 0,
    GenericContent = 1,
}

impl CustomerContentKind {
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::GenericContent),
            other => Err(Error::UnknownCode {
                kind: "customer content kind",
                code: other as i64,
            }),
        }
    }
}

/// Which of the two property maps of an event a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataCategory {
    /// Free-form custom properties
    #[default]
    PartC = 0,
    /// Schema-defined properties
    PartB = 1,
}

impl DataCategory {
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::PartC),
            1 => Ok(Self::PartB),
            other => Err(Error::UnknownCode {
                kind: "data category",
                code: other as i64,
            }),
        }
    }
}

/// The closed set of value kinds an event property can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Str(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Time(TimeTicks),
    Guid(Uuid),
    StrArray(Vec<String>),
    Int64Array(Vec<i64>),
    DoubleArray(Vec<f64>),
    GuidArray(Vec<Uuid>),
}

impl PropertyValue {
    /// Short lowercase name of the value kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Str(_) => "string",
            PropertyValue::Int64(_) => "int64",
            PropertyValue::Double(_) => "double",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Time(_) => "time",
            PropertyValue::Guid(_) => "guid",
            PropertyValue::StrArray(_) => "string_array",
            PropertyValue::Int64Array(_) => "int64_array",
            PropertyValue::DoubleArray(_) => "double_array",
            PropertyValue::GuidArray(_) => "guid_array",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            PropertyValue::StrArray(_)
                | PropertyValue::Int64Array(_)
                | PropertyValue::DoubleArray(_)
                | PropertyValue::GuidArray(_)
        )
    }

    /// Canonical string form (same as `to_string()`).
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

struct UpperGuid<'a>(&'a Uuid);

impl fmt::Display for UpperGuid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.hyphenated())
    }
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Int64(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            PropertyValue::Time(t) => write!(f, "{t}"),
            PropertyValue::Guid(g) => write!(f, "{}", UpperGuid(g)),
            PropertyValue::StrArray(v) => write_joined(f, v),
            PropertyValue::Int64Array(v) => write_joined(f, v),
            PropertyValue::DoubleArray(v) => write_joined(f, v),
            PropertyValue::GuidArray(v) => write_joined(f, v.iter().map(UpperGuid)),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<&String> for PropertyValue {
    fn from(v: &String) -> Self {
        PropertyValue::Str(v.clone())
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Double(v as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<TimeTicks> for PropertyValue {
    fn from(v: TimeTicks) -> Self {
        PropertyValue::Time(v)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(v: Uuid) -> Self {
        PropertyValue::Guid(v)
    }
}

// All integer widths collapse into the signed 64-bit kind.
macro_rules! int_property_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PropertyValue {
                fn from(v: $t) -> Self {
                    PropertyValue::Int64(v as i64)
                }
            }
        )*
    };
}

int_property_value!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::StrArray(v)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(v: Vec<&str>) -> Self {
        PropertyValue::StrArray(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for PropertyValue {
    fn from(v: Vec<i64>) -> Self {
        PropertyValue::Int64Array(v)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(v: Vec<f64>) -> Self {
        PropertyValue::DoubleArray(v)
    }
}

impl From<Vec<Uuid>> for PropertyValue {
    fn from(v: Vec<Uuid>) -> Self {
        PropertyValue::GuidArray(v)
    }
}

/// A property value together with its classification and target map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProperty {
    pub value: PropertyValue,
    #[serde(default)]
    pub pii_kind: PiiKind,
    #[serde(default)]
    pub customer_content_kind: CustomerContentKind,
    #[serde(default)]
    pub category: DataCategory,
}

impl EventProperty {
    /// Unclassified category-C property
    pub fn new(value: impl Into<PropertyValue>) -> Self {
        Self {
            value: value.into(),
            pii_kind: PiiKind::None,
            customer_content_kind: CustomerContentKind::None,
            category: DataCategory::PartC,
        }
    }

    pub fn with_pii(mut self, pii_kind: PiiKind) -> Self {
        self.pii_kind = pii_kind;
        self
    }

    pub fn with_customer_content(mut self, kind: CustomerContentKind) -> Self {
        self.customer_content_kind = kind;
        self
    }

    pub fn with_category(mut self, category: DataCategory) -> Self {
        self.category = category;
        self
    }

    pub fn is_pii(&self) -> bool {
        self.pii_kind != PiiKind::None
    }

    pub fn is_customer_content(&self) -> bool {
        self.customer_content_kind != CustomerContentKind::None
    }
}

impl fmt::Display for EventProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}
