//! Entry validation errors

use thiserror::Error;

/// Why a raw entry map was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required key is absent (keys are checked in the order url, title, tags)
    #[error("Key <{0}> not in entry")]
    MissingKey(&'static str),

    /// A required key holds the wrong JSON type
    #[error("Key <{key}> must be {expected}")]
    InvalidType { key: &'static str, expected: &'static str },

    /// A required string is empty
    #[error("Key <{0}> must not be empty")]
    Empty(&'static str),
}

impl ValidationError {
    /// The key this error refers to
    pub fn key(&self) -> &'static str {
        match self {
            ValidationError::MissingKey(key) => key,
            ValidationError::InvalidType { key, .. } => key,
            ValidationError::Empty(key) => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingKey("url");
        assert_eq!(err.to_string(), "Key <url> not in entry");
        assert_eq!(err.key(), "url");

        let err = ValidationError::InvalidType {
            key: "tags",
            expected: "an array of strings",
        };
        assert_eq!(err.to_string(), "Key <tags> must be an array of strings");
    }
}
