use std::collections::BTreeSet;

use image::RgbaImage;

use crate::codec::{decode_image, encode_png};
use crate::config::EditorConfig;
use crate::error::ObscuraError;
use crate::face_detector::{detect_faces, retain_confident, FaceDetector, FaceRecord, Point};
use crate::geometry::{build_outlines, FaceOutline};
use crate::hit_test::hit_test;
use crate::mask::{blur_outline, draw_outline};

/// Suggested file name for the exported image.
pub const EXPORT_FILE_NAME: &str = "obscured-image.png";

/// Indices of faces currently rendered blurred.
///
/// Bound to the face count it was created for; indices outside it are
/// rejected rather than stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleSet {
    blurred: BTreeSet<usize>,
    face_count: usize,
}

impl ToggleSet {
    /// Empty set for `face_count` faces.
    pub fn new(face_count: usize) -> Self {
        Self {
            blurred: BTreeSet::new(),
            face_count,
        }
    }

    /// Number of faces the set was created for.
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Whether face `index` is blurred.
    pub fn contains(&self, index: usize) -> bool {
        self.blurred.contains(&index)
    }

    /// Flip one face. Returns whether it is blurred afterwards.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ObscuraError> {
        self.check(index)?;
        if self.blurred.remove(&index) {
            Ok(false)
        } else {
            self.blurred.insert(index);
            Ok(true)
        }
    }

    /// Blur every face, or none.
    pub fn set_all(&mut self, blurred: bool) {
        if blurred {
            self.blurred = (0..self.face_count).collect();
        } else {
            self.blurred.clear();
        }
    }

    /// Blurred indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.blurred.iter().copied()
    }

    /// Number of blurred faces.
    pub fn len(&self) -> usize {
        self.blurred.len()
    }

    /// True when no face is blurred.
    pub fn is_empty(&self) -> bool {
        self.blurred.is_empty()
    }

    fn check(&self, index: usize) -> Result<(), ObscuraError> {
        if index >= self.face_count {
            return Err(ObscuraError::FaceIndexOutOfRange {
                index,
                count: self.face_count,
            });
        }
        Ok(())
    }
}

/// Base image, face outlines and toggle state of one loaded photo.
///
/// Rendering is a pure function of these three values.
#[derive(Debug, Clone)]
pub struct Scene {
    base: RgbaImage,
    outlines: Vec<FaceOutline>,
    toggles: ToggleSet,
}

impl Scene {
    /// New scene with every face unblurred.
    pub fn new(base: RgbaImage, outlines: Vec<FaceOutline>) -> Self {
        let toggles = ToggleSet::new(outlines.len());
        Self {
            base,
            outlines,
            toggles,
        }
    }

    /// The photo as loaded.
    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    /// One outline per face, in detection order.
    pub fn outlines(&self) -> &[FaceOutline] {
        &self.outlines
    }

    /// Which faces are blurred.
    pub fn toggles(&self) -> &ToggleSet {
        &self.toggles
    }

    pub(crate) fn toggles_mut(&mut self) -> &mut ToggleSet {
        &mut self.toggles
    }

    /// Render into a fresh canvas.
    pub fn render(&self, config: &EditorConfig) -> RgbaImage {
        let mut canvas = self.base.clone();
        self.draw_faces(&mut canvas, config);
        canvas
    }

    /// Redraw `canvas` from scratch: base image, then every face in order.
    ///
    /// A face whose blur fails is logged and left as plain base pixels; the
    /// remaining faces are still drawn.
    pub fn render_into(&self, canvas: &mut RgbaImage, config: &EditorConfig) {
        canvas.clone_from(&self.base);
        self.draw_faces(canvas, config);
    }

    fn draw_faces(&self, canvas: &mut RgbaImage, config: &EditorConfig) {
        for (index, outline) in self.outlines.iter().enumerate() {
            if self.toggles.contains(index) {
                if let Err(e) = blur_outline(canvas, outline, &config.blur) {
                    log::warn!("face {index} left unblurred: {e}");
                }
            } else {
                draw_outline(canvas, outline, &config.outline);
            }
        }
    }
}

/// Where the editor is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    /// No image loaded.
    Empty,
    /// Image shown, detection outstanding.
    Detecting {
        /// Load the detection belongs to.
        generation: u64,
    },
    /// Outlines known; faces can be toggled.
    Ready,
    /// The face model failed to load. Nothing can be edited any more.
    ModelFailed,
}

/// Handle identifying one image load. Detection results must come back with
/// the ticket of the load they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    /// Load counter value, increasing with every load.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns the canvas and drives the load, detect, toggle and redraw cycle.
///
/// ```
/// use obscura::{BoundingBox, EditorConfig, FaceRecord, Point, SceneController};
/// use image::RgbaImage;
///
/// let mut editor = SceneController::new(EditorConfig::default()).unwrap();
/// let ticket = editor.begin_load(RgbaImage::new(64, 64)).unwrap();
/// let faces = vec![FaceRecord::BoxOnly {
///     bounds: BoundingBox::new(8.0, 8.0, 24.0, 24.0),
///     confidence: 0.9,
/// }];
/// editor.complete_load(ticket, faces).unwrap();
///
/// assert_eq!(editor.click(Point::new(16.0, 16.0)), Some(0));
/// assert!(editor.is_blurred(0));
/// ```
pub struct SceneController {
    config: EditorConfig,
    state: SceneState,
    generation: u64,
    scene: Option<Scene>,
    canvas: RgbaImage,
    model_error: Option<String>,
}

impl SceneController {
    /// Create an empty editor after validating `config`.
    pub fn new(config: EditorConfig) -> Result<Self, ObscuraError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SceneState::Empty,
            generation: 0,
            scene: None,
            canvas: RgbaImage::new(0, 0),
            model_error: None,
        })
    }

    /// Settings the editor was created with.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Current load state.
    pub fn state(&self) -> SceneState {
        self.state
    }

    /// The loaded scene, if any.
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The composited image as currently displayed.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Number of faces in the current scene (zero while detecting).
    pub fn face_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |s| s.outlines().len())
    }

    /// Whether face `index` is currently blurred.
    pub fn is_blurred(&self, index: usize) -> bool {
        self.scene
            .as_ref()
            .is_some_and(|s| s.toggles().contains(index))
    }

    /// True once detection finished without finding any face.
    pub fn shows_no_faces_overlay(&self) -> bool {
        self.state == SceneState::Ready && self.face_count() == 0
    }

    /// Start a new load: show the bare image and invalidate every earlier
    /// load's outstanding detection.
    pub fn begin_load(&mut self, image: RgbaImage) -> Result<LoadTicket, ObscuraError> {
        self.ensure_model()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ObscuraError::ZeroDimensions);
        }

        self.generation += 1;
        self.state = SceneState::Detecting {
            generation: self.generation,
        };
        log::debug!(
            "load #{}: {}x{} image, awaiting detection",
            self.generation,
            image.width(),
            image.height()
        );

        self.canvas.clone_from(&image);
        self.scene = Some(Scene::new(image, Vec::new()));

        Ok(LoadTicket {
            generation: self.generation,
        })
    }

    /// Decode raw bytes and start a load.
    pub fn load_bytes(&mut self, input: &[u8]) -> Result<LoadTicket, ObscuraError> {
        let image = decode_image(input)?;
        self.begin_load(image)
    }

    /// Finish a load with its detection results and draw every face outline.
    ///
    /// Records scoring below the configured threshold are dropped. Results
    /// for a superseded load are discarded with
    /// [`ObscuraError::StaleDetection`]. Returns the number of faces.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        records: Vec<FaceRecord>,
    ) -> Result<usize, ObscuraError> {
        self.ensure_model()?;
        let current = self.generation;
        let expected = SceneState::Detecting {
            generation: ticket.generation,
        };
        if self.state != expected {
            log::warn!(
                "discarding detection for load #{} (current load #{current})",
                ticket.generation
            );
            return Err(ObscuraError::StaleDetection {
                ticket: ticket.generation,
                current,
            });
        }

        let base = match self.scene.take() {
            Some(scene) => scene.base,
            None => return Err(ObscuraError::NotReady),
        };
        let records = retain_confident(records, self.config.detector.score_threshold);
        let outlines = build_outlines(&records, self.config.policy);
        let count = outlines.len();

        self.scene = Some(Scene::new(base, outlines));
        self.state = SceneState::Ready;
        self.redraw();
        log::info!("load #{}: ready with {count} face(s)", ticket.generation);

        Ok(count)
    }

    /// Load an image and run `detector` on it in one step.
    pub fn load_with(
        &mut self,
        image: RgbaImage,
        detector: &dyn FaceDetector,
    ) -> Result<usize, ObscuraError> {
        let ticket = self.begin_load(image)?;
        let records = match &self.scene {
            Some(scene) => detect_faces(detector, scene.base()),
            None => Vec::new(),
        };
        self.complete_load(ticket, records)
    }

    /// Toggle whichever face contains `point` and redraw.
    ///
    /// Returns the toggled face, or `None` if nothing was hit or no image is
    /// ready.
    pub fn click(&mut self, point: Point) -> Option<usize> {
        if self.state != SceneState::Ready {
            return None;
        }
        let scene = self.scene.as_mut()?;
        let index = hit_test(point, scene.outlines())?;
        let blurred = scene.toggles_mut().toggle(index).ok()?;
        log::debug!("face {index} toggled, blurred = {blurred}");
        self.redraw();
        Some(index)
    }

    /// Toggle one face by index and redraw. Returns whether it is now blurred.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ObscuraError> {
        let blurred = self.ready_scene()?.toggles_mut().toggle(index)?;
        self.redraw();
        Ok(blurred)
    }

    /// Blur or unblur every face at once.
    pub fn set_all(&mut self, blurred: bool) -> Result<(), ObscuraError> {
        self.ready_scene()?.toggles_mut().set_all(blurred);
        self.redraw();
        Ok(())
    }

    /// Drop the current image and return to [`SceneState::Empty`].
    ///
    /// Does nothing once the model has failed.
    pub fn reset(&mut self) {
        if self.model_error.is_some() {
            return;
        }
        self.generation += 1;
        self.state = SceneState::Empty;
        self.scene = None;
        self.canvas = RgbaImage::new(0, 0);
    }

    /// Rebuild the canvas from the current scene.
    pub fn redraw(&mut self) {
        if let Some(scene) = &self.scene {
            scene.render_into(&mut self.canvas, &self.config);
        }
    }

    /// Encode the canvas as displayed (outlines included) as PNG.
    pub fn export_png(&self) -> Result<Vec<u8>, ObscuraError> {
        self.ensure_model()?;
        if self.state == SceneState::Empty {
            return Err(ObscuraError::NotReady);
        }
        let data = encode_png(&self.canvas)?;
        log::info!(
            "exported {}x{} canvas as {} bytes",
            self.canvas.width(),
            self.canvas.height(),
            data.len()
        );
        Ok(data)
    }

    /// Put the editor in [`SceneState::ModelFailed`] for good.
    ///
    /// The image is dropped and every later load, edit or export fails with
    /// [`ObscuraError::ModelLoad`] carrying `reason`.
    pub fn fail_model(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("face model unavailable: {reason}");
        self.generation += 1;
        self.state = SceneState::ModelFailed;
        self.scene = None;
        self.canvas = RgbaImage::new(0, 0);
        self.model_error = Some(reason);
    }

    /// Why the model failed, if it did.
    pub fn model_error(&self) -> Option<&str> {
        self.model_error.as_deref()
    }

    fn ensure_model(&self) -> Result<(), ObscuraError> {
        match &self.model_error {
            Some(reason) => Err(ObscuraError::ModelLoad(reason.clone())),
            None => Ok(()),
        }
    }

    fn ready_scene(&mut self) -> Result<&mut Scene, ObscuraError> {
        self.ensure_model()?;
        if self.state != SceneState::Ready {
            return Err(ObscuraError::NotReady);
        }
        self.scene.as_mut().ok_or(ObscuraError::NotReady)
    }
}
