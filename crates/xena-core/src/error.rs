// SPDX-License-Identifier: Apache-2.0

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Engine error taxonomy. `Schema` covers missing datasets, unknown
/// fields and malformed queries; `Integrity` covers unique-constraint
/// violations and is never swallowed; `Decode` is fatal per field;
/// `Input` marks a skippable bad field descriptor.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Schema(String),
    Integrity(String),
    Decode(String),
    Io(String),
    Input(String),
}

impl Error {
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::Integrity(_) => "integrity",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
            Self::Input(_) => "input",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(msg)
            | Self::Integrity(msg)
            | Self::Decode(msg)
            | Self::Io(msg)
            | Self::Input(msg) => write!(f, "{}: {msg}", self.code()),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Integrity(value.to_string())
            }
            _ => Self::Io(value.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Input(value.to_string())
    }
}
