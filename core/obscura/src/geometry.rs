//! Face outline derivation.
//!
//! An outline is the closed polygon used both for stroking the unblurred face
//! and for picking the pixels to blur.

use std::f64::consts::PI;

use crate::error::ObscuraError;
use crate::face_detector::{BoundingBox, FaceRecord, Point};

/// Points in the synthesized forehead curve (12 steps, both ends included).
pub const FOREHEAD_POINTS: usize = 13;

/// Forehead height as a fraction of the eyebrow-to-chin distance.
const FOREHEAD_RATIO: f64 = 0.3;

/// Hairline bulge amplitude as a fraction of the forehead height.
const HAIRLINE_BULGE: f64 = 0.05;

/// Which shape each face outline takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlinePolicy {
    /// Four corners of the detector's bounding box.
    Box,

    /// Jawline plus a synthesized forehead curve. Faces without landmarks
    /// fall back to [`OutlinePolicy::Box`].
    #[default]
    Contour,
}

/// Closed polygon covering one face.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceOutline {
    /// Axis-aligned box.
    Box(BoundingBox),
    /// Landmark-derived contour, implicitly closed.
    Contour(Vec<Point>),
}

impl FaceOutline {
    /// Polygon vertices in path order.
    pub fn points(&self) -> Vec<Point> {
        match self {
            FaceOutline::Box(bounds) => bounds.corners().to_vec(),
            FaceOutline::Contour(points) => points.clone(),
        }
    }
}

/// Integer pixel rectangle inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels, never zero.
    pub width: u32,
    /// Height in pixels, never zero.
    pub height: u32,
}

/// Forehead curve above the eyebrows, ordered left to right.
///
/// The curve spans the jaw horizontally and sits 30% of the eyebrow-to-chin
/// height above the highest eyebrow point, sagging by a half sine wave of 5%
/// of that height at the middle.
pub fn extended_forehead_points(
    jaw: &[Point],
    left_eyebrow: &[Point],
    right_eyebrow: &[Point],
) -> Result<[Point; FOREHEAD_POINTS], ObscuraError> {
    let (first, last) = match (jaw.first(), jaw.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ObscuraError::InvalidLandmarks(jaw.len())),
    };
    if left_eyebrow.is_empty() || right_eyebrow.is_empty() {
        return Err(ObscuraError::InvalidLandmarks(
            left_eyebrow.len() + right_eyebrow.len(),
        ));
    }

    let eyebrow_y = left_eyebrow
        .iter()
        .chain(right_eyebrow)
        .map(|p| p.y)
        .fold(f64::INFINITY, f64::min);
    let chin_y = jaw.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let forehead_height = (chin_y - eyebrow_y) * FOREHEAD_RATIO;
    let top_y = eyebrow_y - forehead_height;
    let (left_x, right_x) = (first.x, last.x);

    let steps = (FOREHEAD_POINTS - 1) as f64;
    let mut points = [Point::default(); FOREHEAD_POINTS];
    for (i, point) in points.iter_mut().enumerate() {
        let t = i as f64 / steps;
        let bulge = (t * PI).sin() * forehead_height * HAIRLINE_BULGE;
        *point = Point::new(left_x + (right_x - left_x) * t, top_y + bulge);
    }

    Ok(points)
}

/// Derive the outline for one face under the given policy.
pub fn outline_for(record: &FaceRecord, policy: OutlinePolicy) -> FaceOutline {
    let landmarks = match (policy, record.landmarks()) {
        (OutlinePolicy::Contour, Some(landmarks)) => landmarks,
        _ => return FaceOutline::Box(*record.bounds()),
    };

    let jaw = landmarks.jaw_outline();
    match extended_forehead_points(jaw, landmarks.left_eyebrow(), landmarks.right_eyebrow()) {
        Ok(forehead) => {
            let mut points = Vec::with_capacity(jaw.len() + FOREHEAD_POINTS);
            points.extend_from_slice(jaw);
            points.extend(forehead.iter().rev());
            FaceOutline::Contour(points)
        }
        Err(e) => {
            log::warn!("falling back to bounding box outline: {e}");
            FaceOutline::Box(*record.bounds())
        }
    }
}

/// One outline per record, in detection order.
pub fn build_outlines(records: &[FaceRecord], policy: OutlinePolicy) -> Vec<FaceOutline> {
    records.iter().map(|r| outline_for(r, policy)).collect()
}

/// Pixel rectangle enclosing the outline, clamped to a `canvas_width` x
/// `canvas_height` canvas.
///
/// The minimum corner is floored and the maximum corner ceiled so every pixel
/// the polygon touches is covered. Returns `None` if nothing remains after
/// clamping.
pub fn bounding_rect(outline: &FaceOutline, canvas_width: u32, canvas_height: u32) -> Option<Region> {
    let points = outline.points();
    if points.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }

    let x0 = min_x.floor().clamp(0.0, canvas_width as f64) as u32;
    let y0 = min_y.floor().clamp(0.0, canvas_height as f64) as u32;
    let x1 = max_x.ceil().clamp(0.0, canvas_width as f64) as u32;
    let y1 = max_y.ceil().clamp(0.0, canvas_height as f64) as u32;

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(Region {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}
