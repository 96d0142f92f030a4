use thiserror::Error;

/// Detection-model lifecycle and inference errors.
///
/// A load failure is fatal for the session; a new worker is required to retry.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model load failed: {0}")]
    LoadFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Post-acceptance processing errors from the cropper/normalizer.
///
/// Distinct from validation rejections: the frame was judged acceptable but
/// could not be turned into a normalized output. The session surfaces these
/// as a retryable processing failure.
#[derive(Debug, Error)]
pub enum CropError {
    #[error("could not decode source image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("bounding box has no area: {width}x{height}")]
    DegenerateBox { width: f32, height: f32 },
    #[error("could not encode normalized frame: {0}")]
    Encode(image::ImageError),
}

/// Capture-session state machine errors: transitions the caller attempted
/// that the machine does not allow in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("step index {index} out of range (session has {count} steps)")]
    StepOutOfRange { index: usize, count: usize },
    #[error("step {0} is busy (validation or processing in flight)")]
    StepBusy(usize),
    #[error("step {0} has no uploaded file to retry")]
    NothingToRetry(usize),
    #[error("model is not ready for uploads")]
    ModelNotReady,
    #[error("model failed to load; session cannot continue")]
    ModelFailed,
    #[error("current step is not complete")]
    StepNotComplete,
    #[error("session is not in the summary phase")]
    NotInSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::StepOutOfRange { index: 5, count: 3 };
        assert!(err.to_string().contains("out of range"));

        let err = ModelError::LoadFailed("weights missing".to_string());
        assert!(err.to_string().contains("model load failed"));

        let err = CropError::DegenerateBox {
            width: 0.0,
            height: 10.0,
        };
        assert!(err.to_string().contains("no area"));
    }
}
