/// Result alias for operations of the capture/recognition/playback core.
pub type Result<T> = std::result::Result<T, MoodError>;

/// Every failure the core can report to the host.
///
/// None of these are fatal: the pipeline falls back to a stable phase and the
/// player reverts to `paused`, so the user can always retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoodError {
    /// Camera permission denied or no device present.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// Frame grab, encode or upload read failed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    /// Classification boundary returned an error or a malformed response.
    #[error("emotion detection failed: {0}")]
    ClassificationFailed(String),
    /// Recommendation boundary returned an error, an empty or a malformed list.
    #[error("music recommendation failed: {0}")]
    RecommendationFailed(String),
    /// The media transport rejected a load or play request.
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
    /// A pipeline run was requested while another one is still in flight.
    #[error("a detection is already in progress")]
    RunInFlight,
}

impl MoodError {
    /// Message shown to the user, without the category prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::DeviceUnavailable(_) => {
                "Failed to access camera. Please check permissions.".to_string()
            }
            Self::CaptureFailed(msg)
            | Self::ClassificationFailed(msg)
            | Self::RecommendationFailed(msg)
            | Self::PlaybackFailed(msg) => msg.clone(),
            Self::RunInFlight => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_strips_category() {
        let err = MoodError::ClassificationFailed("No face detected".to_string());
        assert_eq!(err.user_message(), "No face detected");
        assert_eq!(err.to_string(), "emotion detection failed: No face detected");
    }

    #[test]
    fn test_device_unavailable_has_fixed_hint() {
        let err = MoodError::DeviceUnavailable("/dev/video0: permission denied".to_string());
        assert!(err.user_message().contains("check permissions"));
    }
}
