//! Identifier sanitization and validation.
//!
//! Event names, record types and property keys share one character policy:
//! ASCII alphanumerics plus `_` and `.`, starting and ending with an
//! alphanumeric. They differ only in their length bounds.

use serde::{Deserialize, Serialize};

/// Cause of a validation failure, reported on the debug-event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventRejectedReason {
    /// Identifier empty after sanitization
    NameMissing = 1,
    /// Identifier shorter than the rule's minimum
    TooShort = 2,
    /// Identifier longer than the rule's maximum
    TooLong = 3,
    /// Identifier contains a character outside `[A-Za-z0-9_.]`
    InvalidCharacter = 4,
    /// Identifier starts or ends with `_` or `.`
    InvalidBoundary = 5,
    /// A numeric metadata value was outside its permitted range
    ValueOutOfRange = 6,
}

impl EventRejectedReason {
    pub const fn as_code(self) -> u8 {
        self as u8
    }
}

impl core::fmt::Display for EventRejectedReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EventRejectedReason::NameMissing => write!(f, "identifier is empty"),
            EventRejectedReason::TooShort => write!(f, "identifier is too short"),
            EventRejectedReason::TooLong => write!(f, "identifier is too long"),
            EventRejectedReason::InvalidCharacter => {
                write!(f, "identifier contains an invalid character")
            }
            EventRejectedReason::InvalidBoundary => {
                write!(f, "identifier must start and end with an alphanumeric")
            }
            EventRejectedReason::ValueOutOfRange => write!(f, "value out of range"),
        }
    }
}

/// Length bounds for one class of identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierRule {
    pub min_len: usize,
    pub max_len: usize,
}

impl IdentifierRule {
    /// Event names and record types: 4 to 100 characters.
    pub const EVENT_NAME: Self = Self {
        min_len: 4,
        max_len: 100,
    };

    /// Property keys: 1 to 100 characters.
    pub const PROPERTY_NAME: Self = Self {
        min_len: 1,
        max_len: 100,
    };

    /// Check an already-sanitized identifier against this rule.
    pub fn validate(&self, ident: &str) -> Result<(), EventRejectedReason> {
        if ident.is_empty() {
            return Err(EventRejectedReason::NameMissing);
        }
        // Character check first so that `len()` below counts ASCII bytes only.
        if !ident.chars().all(is_identifier_char) {
            return Err(EventRejectedReason::InvalidCharacter);
        }
        if ident.len() < self.min_len {
            return Err(EventRejectedReason::TooShort);
        }
        if ident.len() > self.max_len {
            return Err(EventRejectedReason::TooLong);
        }
        let bytes = ident.as_bytes();
        if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
            return Err(EventRejectedReason::InvalidBoundary);
        }
        Ok(())
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Trim surrounding whitespace and strip control characters.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.trim().chars().filter(|c| !c.is_control()).collect()
}

pub fn validate_event_name(name: &str) -> Result<(), EventRejectedReason> {
    IdentifierRule::EVENT_NAME.validate(name)
}

pub fn validate_property_name(name: &str) -> Result<(), EventRejectedReason> {
    IdentifierRule::PROPERTY_NAME.validate(name)
}
