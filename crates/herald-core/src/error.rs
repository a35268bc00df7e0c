use thiserror::Error;

/// Error taxonomy shared by every herald component
#[derive(Error, Debug)]
pub enum Error {
    /// The caller is not allowed to perform the operation on the topic
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// A rate-limit bucket lacked sufficient tokens
    #[error("Quota exceeded: {resource}")]
    QuotaExceeded { resource: String },

    /// Creating a reservation would exceed the tier's reservation count
    #[error("Reservation limit exceeded: limit is {limit}")]
    ReservationLimitExceeded { limit: u64 },

    /// Admin accounts have full access everywhere and cannot own topics
    #[error("Admin accounts cannot reserve topics")]
    AdminCannotReserve,

    /// Missing or invalid credentials
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Topic, account or reservation absent where required
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The operation collides with state owned by someone else
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Malformed input to a publish, subscribe or reservation request
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The service is shutting down and accepts no new streams
    #[error("Unavailable: {message}")]
    Unavailable { message: String },

    /// Opaque failure of the backing account store
    #[error("Store error: {source}")]
    Store {
        #[from]
        source: anyhow::Error,
    },
}

impl Error {
    /// Create a new forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a new quota exceeded error
    pub fn quota_exceeded(resource: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            resource: resource.into(),
        }
    }

    /// Create a new reservation limit error
    pub fn reservation_limit_exceeded(limit: u64) -> Self {
        Self::ReservationLimitExceeded { limit }
    }

    /// Create a new unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Check if retrying without an external state change could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Unavailable { .. })
    }

    /// Get the error category for logging and client backoff decisions
    pub fn category(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::ReservationLimitExceeded { .. } => "reservation_limit_exceeded",
            Self::AdminCannotReserve => "admin_cannot_reserve",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Validation { .. } => "validation",
            Self::Unavailable { .. } => "unavailable",
            Self::Store { .. } => "store",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quota_exceeded_creation() {
        let fixture = "messages";
        let actual = Error::quota_exceeded(fixture);

        match actual {
            Error::QuotaExceeded { resource } => assert_eq!(resource, fixture),
            _ => panic!("Expected QuotaExceeded error"),
        }
    }

    #[test]
    fn test_error_display() {
        let fixture = Error::forbidden("topic mytopic is reserved");
        let actual = format!("{fixture}");
        let expected = "Forbidden: topic mytopic is reserved";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_error_retryability() {
        let fixture = Error::from(anyhow::anyhow!("connection reset"));
        assert!(fixture.is_retryable());
        assert!(Error::unavailable("shutting down").is_retryable());

        let non_retryable_errors = vec![
            Error::forbidden("test"),
            Error::quota_exceeded("messages"),
            Error::reservation_limit_exceeded(2),
            Error::AdminCannotReserve,
            Error::unauthorized("test"),
            Error::not_found("test"),
            Error::conflict("test"),
            Error::validation("test"),
        ];

        for error in non_retryable_errors {
            assert!(
                !error.is_retryable(),
                "Error should not be retryable: {:?}",
                error
            );
        }
    }

    #[test]
    fn test_permission_and_quota_are_distinguishable() {
        let forbidden = Error::forbidden("test");
        let quota = Error::quota_exceeded("messages");
        assert_ne!(forbidden.category(), quota.category());
    }

    #[test]
    fn test_error_categories() {
        let test_cases = vec![
            (Error::forbidden("test"), "forbidden"),
            (Error::quota_exceeded("test"), "quota_exceeded"),
            (
                Error::reservation_limit_exceeded(1),
                "reservation_limit_exceeded",
            ),
            (Error::AdminCannotReserve, "admin_cannot_reserve"),
            (Error::unauthorized("test"), "unauthorized"),
            (Error::not_found("test"), "not_found"),
            (Error::conflict("test"), "conflict"),
            (Error::validation("test"), "validation"),
            (Error::unavailable("test"), "unavailable"),
        ];

        for (error, expected_category) in test_cases {
            let actual = error.category();
            assert_eq!(actual, expected_category);
        }
    }
}
