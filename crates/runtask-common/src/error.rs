//! Error types for runtask
//!
//! Errors carry structured fields so the caller can tell which input was at
//! fault. Validation errors are always fatal to the current build; everything
//! else originates in a collaborator (subnet lookup, token resolution) and is
//! passed through unchanged.

use thiserror::Error;

/// Main error type for runtask operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid user-supplied configuration
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending input field (e.g., "containerOverrides[0].command")
        field: Option<String>,
    },

    /// The VPC cannot satisfy a subnet selection
    #[error("subnet selection error: {message}")]
    Subnet {
        /// Description of what could not be selected
        message: String,
    },

    /// A deferred value references a token the resolver does not know
    #[error("unresolved token {token}")]
    Unresolved {
        /// Display form of the token (e.g., "${TaskDef.Arn}")
        token: String,
    },

    /// Serialization of rendered output failed
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at a specific input field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a subnet selection error
    pub fn subnet(msg: impl Into<String>) -> Self {
        Self::Subnet {
            message: msg.into(),
        }
    }

    /// Create an unresolved-token error
    pub fn unresolved(token: impl Into<String>) -> Self {
        Self::Unresolved {
            token: token.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Whether this error is a validation failure of the user's input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Return the field path this error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Prefix the field path of a validation error with `outer`.
    ///
    /// Non-validation errors are returned untouched.
    pub fn within(self, outer: impl Into<String>) -> Self {
        match self {
            Self::Validation { message, field } => {
                let outer = outer.into();
                let field = match field {
                    Some(inner) => format!("{}.{}", outer, inner),
                    None => outer,
                };
                Self::Validation {
                    message,
                    field: Some(field),
                }
            }
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
