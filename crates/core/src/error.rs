/// Result alias that carries the custom [`MeterError`] type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Categorised reasons a capture device could not be opened.
///
/// Each variant keeps the host's own description so it can be logged
/// verbatim, while [`CaptureError::user_message`] provides the reason shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("no microphone found: {0}")]
    DeviceNotFound(String),
    #[error("microphone busy or unavailable: {0}")]
    DeviceBusyOrUnknown(String),
}

impl CaptureError {
    /// Human readable reason suitable for display next to a retry button.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => {
                "Could not access the microphone. Please allow microphone access in your system settings."
            }
            Self::DeviceNotFound(_) => {
                "Could not access the microphone. No microphone was detected on this device."
            }
            Self::DeviceBusyOrUnknown(_) => {
                "Could not access the microphone. Check that no other program is using it."
            }
        }
    }

    /// Maps a free-form host message onto a category.
    pub fn categorise(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lowered = detail.to_ascii_lowercase();
        if ["permission", "denied", "not allowed", "access"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            Self::PermissionDenied(detail)
        } else if ["not found", "no device", "not available", "unavailable"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            Self::DeviceNotFound(detail)
        } else {
            Self::DeviceBusyOrUnknown(detail)
        }
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// Free-form message for conditions that have no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeterError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MeterError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MeterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorises_host_messages() {
        assert!(matches!(
            CaptureError::categorise("Permission denied by user"),
            CaptureError::PermissionDenied(_)
        ));
        assert!(matches!(
            CaptureError::categorise("The requested device is not available"),
            CaptureError::DeviceNotFound(_)
        ));
        assert!(matches!(
            CaptureError::categorise("ALSA function 'snd_pcm_open' failed with error 'EBUSY'"),
            CaptureError::DeviceBusyOrUnknown(_)
        ));
    }

    #[test]
    fn keeps_host_detail_in_display() {
        let err = MeterError::from(CaptureError::DeviceNotFound("no default input".into()));
        assert!(err.to_string().contains("no default input"));
    }
}
