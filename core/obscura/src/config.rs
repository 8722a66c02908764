use crate::error::ObscuraError;
use crate::face_detector::DetectorOptions;
use crate::geometry::OutlinePolicy;
use crate::mask::{BlurStyle, OutlineStyle, MIN_DASH};

/// Editor settings: outline shape, stroke and blur styles, detector knobs.
///
/// ```
/// use obscura::{EditorConfig, OutlinePolicy};
///
/// let config = EditorConfig::default()
///     .outline_policy(OutlinePolicy::Box)
///     .blur_sigma(8.0)
///     .clip_blur_to_outline(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorConfig {
    /// How face outlines are derived from detections.
    pub policy: OutlinePolicy,
    /// Stroke for unblurred faces.
    pub outline: OutlineStyle,
    /// Blur for blurred faces.
    pub blur: BlurStyle,
    /// Detector tuning and the score filter.
    pub detector: DetectorOptions,
}

impl EditorConfig {
    /// Set the outline policy (default: `OutlinePolicy::Contour`).
    pub fn outline_policy(mut self, policy: OutlinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the whole outline stroke style.
    pub fn outline_style(mut self, style: OutlineStyle) -> Self {
        self.outline = style;
        self
    }

    /// Set the dash pattern of the outline stroke (default: `[5, 5]`).
    /// An empty pattern draws a solid line.
    pub fn dash(mut self, pattern: Vec<f64>) -> Self {
        self.outline.dash = pattern;
        self
    }

    /// Set the per-pass Gaussian sigma in pixels (default: 20.0).
    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.blur.sigma = sigma;
        self
    }

    /// Set how many blur passes are applied (default: 2).
    pub fn blur_passes(mut self, passes: u32) -> Self {
        self.blur.passes = passes;
        self
    }

    /// Restrict the blur to the outline polygon instead of its bounding
    /// rectangle (default: false).
    pub fn clip_blur_to_outline(mut self, enable: bool) -> Self {
        self.blur.clip_to_outline = enable;
        self
    }

    /// Replace the detector options passed to backends.
    pub fn detector_options(mut self, options: DetectorOptions) -> Self {
        self.detector = options;
        self
    }

    /// Check every setting, returning the first invalid one.
    pub fn validate(&self) -> Result<(), ObscuraError> {
        if !(self.blur.sigma > 0.0) || !self.blur.sigma.is_finite() {
            return Err(ObscuraError::InvalidBlurSigma(self.blur.sigma));
        }
        if self.blur.passes == 0 {
            return Err(ObscuraError::InvalidConfig(
                "blur passes must be > 0".into(),
            ));
        }
        if self.outline.width == 0 {
            return Err(ObscuraError::InvalidConfig(
                "outline width must be > 0".into(),
            ));
        }
        if self
            .outline
            .dash
            .iter()
            .any(|d| !d.is_finite() || *d < 0.0)
        {
            return Err(ObscuraError::InvalidConfig(
                "dash lengths must be finite and non-negative".into(),
            ));
        }
        if self
            .outline
            .dash
            .iter()
            .any(|&d| d > 0.0 && d < MIN_DASH)
        {
            return Err(ObscuraError::InvalidConfig(format!(
                "dash lengths must be 0 or at least {MIN_DASH} px"
            )));
        }
        if !self.outline.dash.is_empty() && self.outline.dash.iter().sum::<f64>() <= 0.0 {
            return Err(ObscuraError::InvalidConfig(
                "dash pattern must not be all zeros".into(),
            ));
        }
        if self.detector.input_size == 0 {
            return Err(ObscuraError::InvalidConfig(
                "detector input size must be > 0".into(),
            ));
        }
        let scale = self.detector.pyramid_scale_factor;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(ObscuraError::InvalidConfig(format!(
                "pyramid scale factor must be in (0, 1], got {scale}"
            )));
        }
        Ok(())
    }
}
