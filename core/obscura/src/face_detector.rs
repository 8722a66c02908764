use std::ops::Range;

use image::RgbaImage;

use crate::error::ObscuraError;

/// Number of points in the iBUG-68 landmark layout.
pub const LANDMARK_COUNT: usize = 68;

const JAW: Range<usize> = 0..17;
const LEFT_EYEBROW: Range<usize> = 17..22;
const RIGHT_EYEBROW: Range<usize> = 22..27;

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate (pixels).
    pub x: f64,
    /// Vertical coordinate (pixels, growing downward).
    pub y: f64,
}

impl Point {
    /// Create a point from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
}

impl BoundingBox {
    /// Create a bounding box from its top-left corner and size.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (`x + width`).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Corners clockwise from the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }
}

/// The 68 facial keypoints returned by a landmark regressor.
///
/// Eyebrows are named by the side of the image they appear on.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks68 {
    points: Vec<Point>,
}

impl Landmarks68 {
    /// Wrap a landmark set, rejecting anything that is not exactly 68 points.
    pub fn new(points: Vec<Point>) -> Result<Self, ObscuraError> {
        if points.len() != LANDMARK_COUNT {
            return Err(ObscuraError::InvalidLandmarks(points.len()));
        }
        Ok(Self { points })
    }

    /// Jaw outline, ordered left to right across the chin.
    pub fn jaw_outline(&self) -> &[Point] {
        &self.points[JAW]
    }

    /// Eyebrow on the left side of the image (points 17-21).
    pub fn left_eyebrow(&self) -> &[Point] {
        &self.points[LEFT_EYEBROW]
    }

    /// Eyebrow on the right side of the image (points 22-26).
    pub fn right_eyebrow(&self) -> &[Point] {
        &self.points[RIGHT_EYEBROW]
    }
}

/// One detected face.
///
/// Detectors without a landmark stage produce [`FaceRecord::BoxOnly`].
#[derive(Debug, Clone, PartialEq)]
pub enum FaceRecord {
    /// Bounding box only.
    BoxOnly {
        /// Face bounding box.
        bounds: BoundingBox,
        /// Detection confidence score.
        confidence: f64,
    },

    /// Bounding box plus a 68-point landmark set.
    BoxWithLandmarks {
        /// Face bounding box.
        bounds: BoundingBox,
        /// Detection confidence score.
        confidence: f64,
        /// Landmark points from the regressor.
        landmarks: Landmarks68,
    },
}

impl FaceRecord {
    /// The face's bounding box, regardless of variant.
    pub fn bounds(&self) -> &BoundingBox {
        match self {
            FaceRecord::BoxOnly { bounds, .. } | FaceRecord::BoxWithLandmarks { bounds, .. } => {
                bounds
            }
        }
    }

    /// Detector score, on whatever scale the backend reports.
    pub fn confidence(&self) -> f64 {
        match self {
            FaceRecord::BoxOnly { confidence, .. }
            | FaceRecord::BoxWithLandmarks { confidence, .. } => *confidence,
        }
    }

    /// Landmarks, if the detector produced them.
    pub fn landmarks(&self) -> Option<&Landmarks68> {
        match self {
            FaceRecord::BoxOnly { .. } => None,
            FaceRecord::BoxWithLandmarks { landmarks, .. } => Some(landmarks),
        }
    }
}

/// Tuning knobs passed to detector backends.
///
/// `input_size` configures the page-side landmark model (face box + 68-point
/// regressor) and `score_threshold` filters whatever records come back. The
/// remaining fields drive the sliding-window box detector in the built-in
/// backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    /// Square side the landmark model resizes its input to. Handed to the
    /// page-side model by the browser shell.
    pub input_size: u32,
    /// Minimum confidence for a record to become a face outline. Applied to
    /// every detection result the editor receives.
    pub score_threshold: f64,
    /// Minimum classifier score for the sliding-window detector. Its scores
    /// are unbounded, unlike `score_threshold`.
    pub window_score_threshold: f64,
    /// Smallest face (pixels) the sliding window searches for.
    pub min_face_size: u32,
    /// Scale factor between image pyramid levels.
    pub pyramid_scale_factor: f32,
    /// Sliding window step in both directions (pixels).
    pub window_step: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            input_size: 608,
            score_threshold: 0.3,
            window_score_threshold: 2.0,
            min_face_size: 20,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to plug a face model into the editor. Records must be
/// returned in a stable order: face indices are positions in this sequence.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a decoded RGBA image.
    fn detect(&self, image: &RgbaImage) -> Result<Vec<FaceRecord>, ObscuraError>;
}

/// Run a single detection pass, degrading any detector error to "no faces".
pub fn detect_faces(detector: &dyn FaceDetector, image: &RgbaImage) -> Vec<FaceRecord> {
    match detector.detect(image) {
        Ok(faces) => {
            log::debug!(
                "detected {} face(s) in {}x{} image",
                faces.len(),
                image.width(),
                image.height()
            );
            faces
        }
        Err(e) => {
            log::warn!("face detection failed, continuing without faces: {e}");
            Vec::new()
        }
    }
}

/// Keep the records scoring at least `threshold`, in their original order.
pub fn retain_confident(records: Vec<FaceRecord>, threshold: f64) -> Vec<FaceRecord> {
    let total = records.len();
    let kept: Vec<FaceRecord> = records
        .into_iter()
        .filter(|record| record.confidence() >= threshold)
        .collect();
    if kept.len() < total {
        log::debug!(
            "dropped {} of {total} face(s) scoring below {threshold}",
            total - kept.len()
        );
    }
    kept
}
