use edge_session::{SessionError, StopReason};

/// Status of the most recent call on the calling thread.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorBackendNotReady = 2,
    ErrorModelLoad = 3,
    ErrorContextCreation = 4,
    ErrorTokenization = 5,
    ErrorPromptDecode = 6,
    ErrorInvalidState = 7,
    ErrorInternal = 8,
}

impl From<&SessionError> for EdgeStatus {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::BackendNotReady => EdgeStatus::ErrorBackendNotReady,
            SessionError::ModelLoad { .. } => EdgeStatus::ErrorModelLoad,
            SessionError::ContextCreation(_) => EdgeStatus::ErrorContextCreation,
            SessionError::Tokenization(_) => EdgeStatus::ErrorTokenization,
            SessionError::PromptDecode { .. } => EdgeStatus::ErrorPromptDecode,
            SessionError::InvalidState => EdgeStatus::ErrorInvalidState,
        }
    }
}

/// Why the most recent generation on the calling thread stopped.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStopReason {
    /// No generation has completed, or the last one failed before sampling.
    None = 0,
    EndOfGeneration = 1,
    MaxTokens = 2,
    DecodeFailed = 3,
    Cancelled = 4,
}

impl From<StopReason> for EdgeStopReason {
    fn from(stop: StopReason) -> Self {
        match stop {
            StopReason::EndOfGeneration => EdgeStopReason::EndOfGeneration,
            StopReason::MaxTokens => EdgeStopReason::MaxTokens,
            StopReason::DecodeFailed => EdgeStopReason::DecodeFailed,
            StopReason::Cancelled => EdgeStopReason::Cancelled,
        }
    }
}

/// Severity passed to the host log callback.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLogLevel {
    Info = 0,
    Error = 1,
}

/// Host log callback. `message` is only valid for the duration of the call.
pub type EdgeLogCallback =
    Option<extern "C" fn(level: EdgeLogLevel, message: *const std::os::raw::c_char)>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_from_session_error() {
        assert_eq!(EdgeStatus::from(&SessionError::InvalidState), EdgeStatus::ErrorInvalidState);
        assert_eq!(
            EdgeStatus::from(&SessionError::ContextCreation("oom".into())),
            EdgeStatus::ErrorContextCreation
        );
        let err = SessionError::ModelLoad {
            path: PathBuf::from("m.gguf"),
            source: edge_model::ModelError::UnsupportedArchitecture("gemma3".into()),
        };
        assert_eq!(EdgeStatus::from(&err), EdgeStatus::ErrorModelLoad);
    }

    #[test]
    fn test_stop_reason_codes() {
        assert_eq!(EdgeStopReason::from(StopReason::MaxTokens) as i32, 2);
        assert_eq!(EdgeStopReason::from(StopReason::Cancelled), EdgeStopReason::Cancelled);
    }
}
