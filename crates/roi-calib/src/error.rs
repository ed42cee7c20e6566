use roi_calib_core::ImageError;

/// Errors from reading or writing the calibration record.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("calibration record needs 4 clip and 4 visibility points (got {clip} and {visibility})")]
    IncompleteRecord { clip: usize, visibility: usize },
}

/// Errors from loading or writing JSON configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors from applying the calibration to a frame.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no perspective transform available")]
    NoTransform,
    #[error("no visibility mask available")]
    NoMask,
    #[error(transparent)]
    Image(#[from] ImageError),
}
