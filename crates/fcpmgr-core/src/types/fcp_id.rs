//! Typed identifier for an FCP device.
//!
//! Device numbers are four hexadecimal digits and compare
//! case-insensitively. [`FcpId`] normalizes to upper case on parse, so two
//! ids are equal exactly when the hypervisor would consider them the same
//! device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A validated, upper-cased FCP device number such as `1A0F`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct FcpId(String);

impl FcpId {
    /// Parse and normalize a device number.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::invalid_input(format!(
                "Invalid FCP device id '{raw}': expected 4 hexadecimal digits"
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Build an id from its numeric device number.
    pub fn from_number(number: u16) -> Self {
        Self(format!("{number:04X}"))
    }

    /// The numeric device number.
    pub fn number(&self) -> u16 {
        // Constructors only admit four hex digits.
        u16::from_str_radix(&self.0, 16).unwrap_or_default()
    }

    /// Return the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a list of raw ids, failing on the first malformed one.
    pub fn parse_many<I, S>(raw: I) -> Result<Vec<Self>, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter().map(|s| Self::parse(s.as_ref())).collect()
    }
}

impl fmt::Display for FcpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FcpId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FcpId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FcpId> for String {
    fn from(id: FcpId) -> String {
        id.0
    }
}

impl AsRef<str> for FcpId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
