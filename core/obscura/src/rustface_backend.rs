use std::io::Read;
use std::path::Path;

use image::RgbaImage;

use crate::error::ObscuraError;
use crate::face_detector::{BoundingBox, DetectorOptions, FaceDetector, FaceRecord};

/// Where the SeetaFace frontal model is looked up at startup.
pub const DEFAULT_MODEL_PATH: &str = "model/seeta_fd_frontal_v1.0.bin";

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// SeetaFace only finds boxes, so every record is [`FaceRecord::BoxOnly`]
/// and outlines fall back to the bounding box.
pub struct RustfaceDetector {
    model: rustface::Model,
    options: DetectorOptions,
}

impl RustfaceDetector {
    /// Load the model file from `path`.
    ///
    /// There is no detector without a model: any read or parse failure is
    /// returned as [`ObscuraError::ModelLoad`].
    pub fn load(path: impl AsRef<Path>, options: DetectorOptions) -> Result<Self, ObscuraError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ObscuraError::ModelLoad(format!("{}: {e}", path.display())))?;
        let detector = Self::from_reader(std::io::BufReader::new(file), options)?;
        log::info!("loaded face model from {}", path.display());
        Ok(detector)
    }

    /// Parse the model from any reader (an embedded byte slice, a fetched buffer).
    pub fn from_reader<R: Read>(reader: R, options: DetectorOptions) -> Result<Self, ObscuraError> {
        let model =
            rustface::read_model(reader).map_err(|e| ObscuraError::ModelLoad(e.to_string()))?;
        Ok(Self { model, options })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, image: &RgbaImage) -> Result<Vec<FaceRecord>, ObscuraError> {
        let gray = image::imageops::grayscale(image);
        let (width, height) = gray.dimensions();

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.options.min_face_size);
        detector.set_score_thresh(self.options.window_score_threshold);
        detector.set_pyramid_scale_factor(self.options.pyramid_scale_factor);
        detector.set_slide_window_step(self.options.window_step, self.options.window_step);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRecord::BoxOnly {
                    bounds: BoundingBox::new(
                        bbox.x() as f64,
                        bbox.y() as f64,
                        bbox.width() as f64,
                        bbox.height() as f64,
                    ),
                    confidence: face.score(),
                }
            })
            .collect())
    }
}
