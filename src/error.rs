use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to callers of the reminder engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum StudyError {
    /// Creation-time validation failure; the store is left unchanged.
    #[error("invalid reminder: {0}")]
    InvalidReminder(String),
    #[error("reminder not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
    /// A reminder reached the calculator in a state creation should have rejected.
    #[error("cannot compute schedule: {0}")]
    ScheduleComputation(String),
    #[error("network error: {0}")]
    Network(String),
}

impl From<StudyError> for String {
    fn from(error: StudyError) -> Self {
        error.to_string()
    }
}

impl StudyError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        StudyError::InvalidReminder(msg.into())
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        StudyError::NotFound(id.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        StudyError::Storage(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        StudyError::Config(msg.into())
    }

    pub fn schedule<S: Into<String>>(msg: S) -> Self {
        StudyError::ScheduleComputation(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        StudyError::Network(msg.into())
    }
}

pub type StudyResult<T> = Result<T, StudyError>;

/// Failure of a single notification channel. Never propagated past the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel not supported on this device")]
    Unsupported,
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StudyError::invalid("title is required");
        assert_eq!(err.to_string(), "invalid reminder: title is required");
    }

    #[test]
    fn test_error_conversion_to_string() {
        let err = StudyError::not_found("1700000000000");
        let s: String = err.into();
        assert!(s.contains("reminder not found"));
    }

    #[test]
    fn test_error_serialization() {
        let err = StudyError::storage("disk full");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Storage"));
        assert!(json.contains("disk full"));
    }

    #[test]
    fn test_channel_error_display() {
        assert_eq!(
            ChannelError::Unsupported.to_string(),
            "channel not supported on this device"
        );
        assert_eq!(ChannelError::Failed("no audio".into()).to_string(), "no audio");
    }
}
