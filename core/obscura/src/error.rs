use thiserror::Error;

/// Everything that can go wrong while loading, editing or exporting a photo.
#[derive(Debug, Error)]
pub enum ObscuraError {
    /// Input bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    /// Input bytes are not a known image format.
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// Image has no pixels.
    #[error("image dimensions are zero")]
    ZeroDimensions,

    /// PNG encoding failed.
    #[error("failed to encode image: {0}")]
    EncodeError(String),

    /// The face model is unavailable. Ends the editing session.
    #[error("failed to load face detection model: {0}")]
    ModelLoad(String),

    /// A detector backend failed on one image.
    #[error("face detection failed: {0}")]
    Detection(String),

    /// A landmark set did not have 68 points.
    #[error("expected 68 landmark points, got {0}")]
    InvalidLandmarks(usize),

    /// A face lies entirely outside the canvas.
    #[error("face region is empty after clamping to the canvas")]
    EmptyRegion,

    /// Blur sigma is zero, negative or not finite.
    #[error("blur sigma must be positive, got {0}")]
    InvalidBlurSigma(f32),

    /// Some other configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A face index past the number of detected faces.
    #[error("face index {index} out of range for {count} detected faces")]
    FaceIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of faces in the scene.
        count: usize,
    },

    /// Detection results for an image that is no longer current.
    #[error("detection result for load #{ticket} arrived after load #{current} started")]
    StaleDetection {
        /// Generation the results belong to.
        ticket: u64,
        /// Generation of the current load.
        current: u64,
    },

    /// The operation needs a loaded image with finished detection.
    #[error("no image is ready for editing")]
    NotReady,
}
