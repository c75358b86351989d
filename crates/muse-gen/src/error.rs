use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Why a generation request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No user key and no process default. Never reaches the backend.
    #[error("missing API key")]
    MissingCredentials,

    #[error("generation is not available in your region: {0}")]
    RegionRestricted(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("blocked by safety filter: {0}")]
    SafetyBlocked(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

impl GenerationError {
    /// Transient failures worth another attempt (on a fallback tier).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_)
                | Self::ServerUnavailable(_)
                | Self::SafetyBlocked(_)
                | Self::MalformedResponse(_)
        )
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classify an HTTP error status and its message.
    #[must_use]
    pub fn from_status(status: u16, message: &str) -> Self {
        let lower = message.to_lowercase();
        let message = message.to_string();
        match status {
            429 => Self::RateLimited(message),
            500 | 502 | 503 | 504 => Self::ServerUnavailable(message),
            // unknown or retired model name; the fallback tier may exist
            404 => Self::ServerUnavailable(message),
            400 | 403 if is_region_message(&lower) => Self::RegionRestricted(message),
            _ => Self::from_message(&message),
        }
    }

    /// Classify a failure that carries only a message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let message = message.to_string();
        if is_region_message(&lower) {
            Self::RegionRestricted(message)
        } else if lower.contains("quota")
            || lower.contains("resource_exhausted")
            || lower.contains("too many requests")
        {
            Self::RateLimited(message)
        } else if lower.contains("overloaded")
            || lower.contains("internal server error")
            || lower.contains("unavailable")
        {
            Self::ServerUnavailable(message)
        } else if lower.contains("safety") || lower.contains("blocked") {
            Self::SafetyBlocked(message)
        } else {
            Self::Unknown(message)
        }
    }
}

fn is_region_message(lower: &str) -> bool {
    lower.contains("location is not supported")
        || lower.contains("region")
        || lower.contains("country")
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::ServerUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::GenerationError;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(GenerationError::RateLimited(String::new()).is_retryable());
        assert!(GenerationError::ServerUnavailable(String::new()).is_retryable());
        assert!(GenerationError::SafetyBlocked(String::new()).is_retryable());
        assert!(GenerationError::MalformedResponse(String::new()).is_retryable());
        assert!(!GenerationError::MissingCredentials.is_retryable());
        assert!(!GenerationError::RegionRestricted(String::new()).is_retryable());
        assert!(!GenerationError::Cancelled.is_retryable());
        assert!(!GenerationError::Unknown(String::new()).is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            GenerationError::from_status(429, "slow down"),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            GenerationError::from_status(503, "The model is overloaded"),
            GenerationError::ServerUnavailable(_)
        ));
        assert!(matches!(
            GenerationError::from_status(404, "models/x is not found"),
            GenerationError::ServerUnavailable(_)
        ));
        assert!(matches!(
            GenerationError::from_status(400, "User location is not supported for the API use."),
            GenerationError::RegionRestricted(_)
        ));
        assert!(matches!(
            GenerationError::from_status(400, "API key not valid"),
            GenerationError::Unknown(_)
        ));
    }

    #[test]
    fn message_classification() {
        assert!(matches!(
            GenerationError::from_message("Quota exceeded for metric"),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            GenerationError::from_message("Response was blocked"),
            GenerationError::SafetyBlocked(_)
        ));
    }

    #[test]
    fn display_is_user_readable() {
        assert_eq!(GenerationError::Cancelled.to_string(), "operation cancelled");
        assert_eq!(GenerationError::Unknown("boom".into()).to_string(), "boom");
    }
}
