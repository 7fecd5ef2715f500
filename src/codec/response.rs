//! Method responses

use std::fmt;

use super::Value;

/// Structured application error carried in an error envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodError {
    /// Machine readable error code
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Additional structured details ([`Value::Null`] when absent)
    pub details: Value,
}

impl MethodError {
    /// Create an error without details
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Value::Null,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = details.into();
        self
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if !self.details.is_null() {
            write!(f, " ({})", self.details)?;
        }
        Ok(())
    }
}

impl std::error::Error for MethodError {}

/// Outcome of a method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// Call succeeded
    Success(Value),
    /// Call failed with an application error
    Error(MethodError),
    /// No handler, or the handler declined the call
    NotImplemented,
}

impl MethodResponse {
    /// Create a success response
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success(result.into())
    }

    /// Create an error response
    pub fn error(code: impl Into<String>, message: impl Into<String>, details: impl Into<Value>) -> Self {
        Self::Error(MethodError::new(code, message).with_details(details))
    }

    /// Check if this is a success response
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if this is a not-implemented response
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }

    /// Get the result of a successful call
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Get the error of a failed call
    #[must_use]
    pub const fn error_details(&self) -> Option<&MethodError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl From<MethodError> for MethodResponse {
    fn from(error: MethodError) -> Self {
        Self::Error(error)
    }
}
