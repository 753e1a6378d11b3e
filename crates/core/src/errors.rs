use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} must be before window end {end}")]
    StartNotBeforeEnd { start: DateTime<Utc>, end: DateTime<Utc> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no recognizable date or time in `{0}`")]
    Unrecognized(String),
    #[error("`{0}` does not name a valid calendar date")]
    InvalidDate(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("calendar provider unreachable: {0}")]
    Unavailable(String),
    #[error("calendar provider rejected credentials: {0}")]
    Unauthorized(String),
    #[error("calendar provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// A provider failure must never read as "the slot is free", so the
    /// user-facing text always refuses to proceed rather than booking blind.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unavailable(_) | Self::Unauthorized(_) => {
                "I can't reach the calendar right now, so I won't book anything until I can verify availability. Please try again shortly."
            }
            Self::Rejected(_) => {
                "The calendar refused that request. Nothing was booked; please try again shortly."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn provider_failures_never_read_as_available() {
        for error in [
            ProviderError::Unavailable("connection refused".to_owned()),
            ProviderError::Unauthorized("expired token".to_owned()),
            ProviderError::Rejected("invalid window".to_owned()),
        ] {
            let message = error.user_message();
            assert!(!message.to_ascii_lowercase().contains("available"), "{message}");
            assert!(message.contains("book"), "{message}");
        }
    }
}
