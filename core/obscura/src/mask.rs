use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;

use crate::error::ObscuraError;
use crate::face_detector::Point;
use crate::geometry::{bounding_rect, FaceOutline};
use crate::hit_test::contains;

/// Shortest dash or gap, in pixels, a pattern may use.
pub const MIN_DASH: f64 = 0.5;

/// Stroke used for faces that are not blurred.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineStyle {
    /// Stroke color.
    pub color: Rgba<u8>,
    /// Stroke width in pixels.
    pub width: u32,
    /// Alternating on/off run lengths in pixels, starting with "on".
    /// Runs shorter than [`MIN_DASH`] are drawn as `MIN_DASH`, except zero.
    pub dash: Vec<f64>,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0, 255, 0, 255]),
            width: 2,
            dash: vec![5.0, 5.0],
        }
    }
}

/// Blur applied to faces marked as blurred.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurStyle {
    /// Gaussian standard deviation per pass, in pixels.
    pub sigma: f32,
    /// Number of successive passes. Each pass widens the effective radius.
    pub passes: u32,
    /// Only write blurred pixels that fall inside the outline polygon.
    /// When off, the whole bounding rectangle is blurred.
    pub clip_to_outline: bool,
}

impl Default for BlurStyle {
    fn default() -> Self {
        Self {
            sigma: 20.0,
            passes: 2,
            clip_to_outline: false,
        }
    }
}

/// Stroke the closed outline path with a dashed line.
///
/// The dash phase carries over from one edge to the next, so the pattern runs
/// continuously around the whole polygon. Only the part of each edge near the
/// canvas is stepped through; the rest just advances the phase.
pub fn draw_outline(canvas: &mut RgbaImage, outline: &FaceOutline, style: &OutlineStyle) {
    let points = outline.points();
    if points.len() < 2 || style.width == 0 {
        return;
    }
    let margin = style.width as f64 + 1.0;
    let (canvas_w, canvas_h) = (canvas.width() as f64, canvas.height() as f64);

    let mut dashes = Dashes::new(&style.dash);
    let closing = (points[points.len() - 1], points[0]);
    let edges = points
        .windows(2)
        .map(|w| (w[0], w[1]))
        .chain(std::iter::once(closing));

    for (from, to) in edges {
        let length = (to.x - from.x).hypot(to.y - from.y);
        if !length.is_finite() {
            continue;
        }
        let Some((t0, t1)) = visible_span(from, to, canvas_w, canvas_h, margin) else {
            dashes.skip(length);
            continue;
        };
        let (start, end) = (t0 * length, t1 * length);

        dashes.skip(start);
        let mut travelled = start;
        while travelled < end {
            let run = dashes.remaining.min(end - travelled);
            if dashes.is_on() {
                stamp_segment(canvas, from, to, length, travelled, travelled + run, style);
            }
            travelled += run;
            dashes.advance(run);
        }
        dashes.skip(length - end);
    }
}

/// Parameter range `[t0, t1]` of the edge `from -> to` lying within the
/// canvas grown by `margin` on every side (Liang-Barsky clipping).
fn visible_span(
    from: Point,
    to: Point,
    width: f64,
    height: f64,
    margin: f64,
) -> Option<(f64, f64)> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let bounds = [
        (-dx, from.x + margin),
        (dx, width + margin - from.x),
        (-dy, from.y + margin),
        (dy, height + margin - from.y),
    ];

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in bounds {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Replace the outline's bounding rectangle with a blurred copy of itself.
///
/// The rectangle is read from `canvas` as it currently is, blurred
/// `style.passes` times, and written back at the same position. With
/// `clip_to_outline`, only pixels whose centers fall inside the polygon are
/// written.
pub fn blur_outline(
    canvas: &mut RgbaImage,
    outline: &FaceOutline,
    style: &BlurStyle,
) -> Result<(), ObscuraError> {
    if !(style.sigma > 0.0) {
        return Err(ObscuraError::InvalidBlurSigma(style.sigma));
    }
    let region = bounding_rect(outline, canvas.width(), canvas.height())
        .ok_or(ObscuraError::EmptyRegion)?;

    let mut buffer =
        image::imageops::crop_imm(canvas, region.x, region.y, region.width, region.height)
            .to_image();
    for _ in 0..style.passes {
        buffer = gaussian_blur_f32(&buffer, style.sigma);
    }

    if style.clip_to_outline {
        for (dx, dy, pixel) in buffer.enumerate_pixels() {
            let (x, y) = (region.x + dx, region.y + dy);
            let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if contains(outline, center) {
                canvas.put_pixel(x, y, *pixel);
            }
        }
    } else {
        image::imageops::replace(canvas, &buffer, region.x as i64, region.y as i64);
    }

    Ok(())
}

/// Fill `width`-sized squares along the sub-segment `[start, end]` of the
/// edge `from -> to`, one every half pixel.
fn stamp_segment(
    canvas: &mut RgbaImage,
    from: Point,
    to: Point,
    length: f64,
    start: f64,
    end: f64,
    style: &OutlineStyle,
) {
    if length <= 0.0 {
        return;
    }
    let half = style.width as f64 / 2.0;
    let samples = ((end - start) * 2.0).ceil().max(1.0) as usize;
    for i in 0..=samples {
        let along = start + (end - start) * i as f64 / samples as f64;
        let t = along / length;
        let cx = from.x + (to.x - from.x) * t;
        let cy = from.y + (to.y - from.y) * t;
        let rect = Rect::at((cx - half).round() as i32, (cy - half).round() as i32)
            .of_size(style.width, style.width);
        draw_filled_rect_mut(canvas, rect, style.color);
    }
}

/// Position within a repeating dash pattern.
struct Dashes {
    pattern: Vec<f64>,
    period: f64,
    index: usize,
    remaining: f64,
}

impl Dashes {
    fn new(dash: &[f64]) -> Self {
        let mut pattern: Vec<f64> = dash
            .iter()
            .map(|&d| if d > 0.0 { d.max(MIN_DASH) } else { 0.0 })
            .collect();
        // an odd-length pattern repeats once so on/off alternate cleanly
        if pattern.len() % 2 == 1 {
            pattern.extend_from_within(..);
        }
        if pattern.iter().sum::<f64>() <= 0.0 {
            pattern = vec![f64::INFINITY, 0.0];
        }
        let mut dashes = Self {
            remaining: pattern[0],
            period: pattern.iter().sum(),
            pattern,
            index: 0,
        };
        dashes.skip_empty();
        dashes
    }

    fn is_on(&self) -> bool {
        self.index % 2 == 0
    }

    fn advance(&mut self, distance: f64) {
        self.remaining -= distance;
        if self.remaining <= 0.0 {
            self.index = (self.index + 1) % self.pattern.len();
            self.remaining = self.pattern[self.index];
            self.skip_empty();
        }
    }

    /// Advance the phase by `distance` without drawing.
    fn skip(&mut self, distance: f64) {
        if !self.period.is_finite() || !(distance > 0.0) {
            return;
        }
        let mut left = distance % self.period;
        while left > 0.0 {
            let run = self.remaining.min(left);
            self.advance(run);
            left -= run;
        }
    }

    fn skip_empty(&mut self) {
        while self.remaining <= 0.0 {
            self.index = (self.index + 1) % self.pattern.len();
            self.remaining = self.pattern[self.index];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detector::BoundingBox;

    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    fn small_blur() -> BlurStyle {
        BlurStyle {
            sigma: 2.0,
            ..BlurStyle::default()
        }
    }

    #[test]
    fn outline_is_dashed_along_the_top_edge() {
        let mut canvas = RgbaImage::from_pixel(60, 60, Rgba([0, 0, 0, 255]));
        let outline = FaceOutline::Box(BoundingBox::new(10.0, 10.0, 40.0, 40.0));
        draw_outline(&mut canvas, &outline, &OutlineStyle::default());

        // first dash covers x in [10, 15], the gap sits around x = 17..18
        assert_eq!(*canvas.get_pixel(12, 10), GREEN);
        assert_ne!(*canvas.get_pixel(17, 10), GREEN);
        assert_eq!(*canvas.get_pixel(22, 10), GREEN);
        // interior untouched
        assert_eq!(*canvas.get_pixel(30, 30), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn solid_dash_pattern_draws_full_stroke() {
        let mut canvas = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let outline = FaceOutline::Box(BoundingBox::new(5.0, 5.0, 30.0, 30.0));
        let style = OutlineStyle {
            dash: vec![],
            ..OutlineStyle::default()
        };
        draw_outline(&mut canvas, &outline, &style);
        for x in 5..=35 {
            assert_eq!(*canvas.get_pixel(x, 5), GREEN, "gap at x={x}");
        }
    }

    #[test]
    fn outline_partially_off_canvas_does_not_panic() {
        let mut canvas = RgbaImage::new(20, 20);
        let outline = FaceOutline::Box(BoundingBox::new(-10.0, -10.0, 50.0, 50.0));
        draw_outline(&mut canvas, &outline, &OutlineStyle::default());
    }

    #[test]
    fn clipped_edges_keep_the_dash_phase() {
        let outline = FaceOutline::Box(BoundingBox::new(10.0, 10.0, 40.0, 40.0));
        let mut full = RgbaImage::from_pixel(60, 60, Rgba([0, 0, 0, 255]));
        let mut cut = RgbaImage::from_pixel(30, 30, Rgba([0, 0, 0, 255]));
        draw_outline(&mut full, &outline, &OutlineStyle::default());
        draw_outline(&mut cut, &outline, &OutlineStyle::default());

        for (x, y, pixel) in cut.enumerate_pixels() {
            assert_eq!(pixel, full.get_pixel(x, y), "mismatch at ({x}, {y})");
        }
    }

    #[test]
    fn huge_outline_only_draws_what_is_visible() {
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let outline = FaceOutline::Box(BoundingBox::new(5.0, 5.0, 1e9, 1e9));
        draw_outline(&mut canvas, &outline, &OutlineStyle::default());
        assert_eq!(*canvas.get_pixel(7, 5), GREEN);
        assert_eq!(*canvas.get_pixel(12, 12), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn tiny_dashes_are_widened() {
        let mut canvas = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let outline = FaceOutline::Box(BoundingBox::new(5.0, 5.0, 30.0, 30.0));
        let style = OutlineStyle {
            dash: vec![1e-9, 1e-9],
            ..OutlineStyle::default()
        };
        draw_outline(&mut canvas, &outline, &style);
        assert_eq!(*canvas.get_pixel(5, 5), GREEN);
    }

    #[test]
    fn blur_changes_only_the_bounding_rect() {
        let original = checkerboard(40, 40);
        let mut canvas = original.clone();
        let outline = FaceOutline::Box(BoundingBox::new(10.0, 10.0, 20.0, 20.0));
        blur_outline(&mut canvas, &outline, &small_blur()).unwrap();

        assert_ne!(canvas.get_pixel(20, 20), original.get_pixel(20, 20));
        assert_eq!(canvas.get_pixel(5, 5), original.get_pixel(5, 5));
        assert_eq!(canvas.get_pixel(35, 35), original.get_pixel(35, 35));
    }

    #[test]
    fn blur_is_deterministic() {
        let outline = FaceOutline::Box(BoundingBox::new(4.0, 4.0, 16.0, 16.0));
        let mut a = checkerboard(24, 24);
        let mut b = checkerboard(24, 24);
        blur_outline(&mut a, &outline, &small_blur()).unwrap();
        blur_outline(&mut b, &outline, &small_blur()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn clipped_blur_leaves_corners_outside_the_polygon() {
        let original = checkerboard(40, 40);
        let mut canvas = original.clone();
        let outline = FaceOutline::Contour(vec![
            Point::new(20.0, 0.0),
            Point::new(40.0, 20.0),
            Point::new(20.0, 40.0),
            Point::new(0.0, 20.0),
        ]);
        let style = BlurStyle {
            clip_to_outline: true,
            ..small_blur()
        };
        blur_outline(&mut canvas, &outline, &style).unwrap();

        assert_eq!(canvas.get_pixel(1, 1), original.get_pixel(1, 1));
        assert_eq!(canvas.get_pixel(38, 38), original.get_pixel(38, 38));
        assert_ne!(canvas.get_pixel(20, 20), original.get_pixel(20, 20));
    }

    #[test]
    fn empty_region_is_an_error() {
        let mut canvas = RgbaImage::new(10, 10);
        let outline = FaceOutline::Box(BoundingBox::new(50.0, 50.0, 5.0, 5.0));
        let err = blur_outline(&mut canvas, &outline, &small_blur()).unwrap_err();
        assert!(matches!(err, ObscuraError::EmptyRegion));
    }

    #[test]
    fn non_positive_sigma_is_an_error() {
        let mut canvas = RgbaImage::new(10, 10);
        let outline = FaceOutline::Box(BoundingBox::new(0.0, 0.0, 5.0, 5.0));
        let style = BlurStyle {
            sigma: 0.0,
            ..BlurStyle::default()
        };
        assert!(matches!(
            blur_outline(&mut canvas, &outline, &style),
            Err(ObscuraError::InvalidBlurSigma(_))
        ));
    }
}
