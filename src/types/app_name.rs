// ABOUTME: Validated application name as registered on the management server.
// ABOUTME: Rejects characters the server refuses in application and file names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 255;
const FORBIDDEN: &[char] = &[
    '/', '\\', ',', '#', '$', '@', ':', ';', '"', '*', '?', '<', '>', '|', '=', '+', '&', '%', '\'',
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("application name cannot start with '{0}'")]
    InvalidStart(char),

    #[error("application name cannot have leading or trailing whitespace")]
    SurroundingWhitespace,

    #[error("invalid character in application name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.chars().count() > MAX_LEN {
            return Err(AppNameError::TooLong);
        }

        if value.trim() != value {
            return Err(AppNameError::SurroundingWhitespace);
        }

        if let Some(first @ ('.' | '-')) = value.chars().next() {
            return Err(AppNameError::InvalidStart(first));
        }

        if let Some(c) = value
            .chars()
            .find(|c| FORBIDDEN.contains(c) || c.is_control())
        {
            return Err(AppNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AppName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AppName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AppName::new(&s).map_err(serde::de::Error::custom)
    }
}
