//! Error types shared across the domain crates.
//!
//! Uses `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// The top-level error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Identity errors ---
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Context ---
    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Problems with the acting user's context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("user context did not come from verified claims")]
    Unverified,

    #[error("user context is missing required field '{0}'")]
    MissingField(String),

    #[error("user context has an invalid role structure")]
    InvalidRole,

    #[error("claims must be a JSON object")]
    InvalidClaims,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_error_displays_correctly() {
        let err = Error::Identity(IdentityError::MissingField("email".into()));
        assert!(err.to_string().contains("email"));
        assert!(err.to_string().starts_with("Identity error"));
    }

    #[test]
    fn serialization_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
