//! Failure taxonomy of a live call.

use thiserror::Error;

/// Everything that can go wrong during a live call.
///
/// `MalformedPayload` is recovered locally (the chunk is dropped). Every other
/// variant ends the call; `RemoteClosed` is the only one that is not shown to
/// the user as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("failed to connect to the live model: {0}")]
    ConnectFailed(String),

    #[error("malformed audio payload: {0}")]
    MalformedPayload(String),

    #[error("live session error: {0}")]
    RemoteError(String),

    #[error("live session closed by the remote side")]
    RemoteClosed,
}

impl CallError {
    /// Message shown next to the call controls. `None` means nothing is shown.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            CallError::PermissionDenied(_) => Some(
                "Microphone access denied. Please allow microphone permissions in your system settings.",
            ),
            CallError::DeviceUnavailable(_) => {
                Some("Failed to initialize audio. Check your microphone.")
            }
            CallError::ConnectFailed(_) | CallError::RemoteError(_) => {
                Some("Connection to AI failed. Please try again.")
            }
            CallError::MalformedPayload(_) | CallError::RemoteClosed => None,
        }
    }
}
