use image::Rgba;
use obscura::hit_test::scale_to_canvas;
use obscura::{
    BoundingBox, EditorConfig, FaceRecord, Landmarks68, LoadTicket, ObscuraError, OutlinePolicy,
    Point, SceneController, SceneState,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Editor options, passed as a JavaScript object.
///
/// All fields are optional; missing ones keep the library defaults.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorOptions {
    pub outline_policy: Option<String>,
    pub blur_sigma: Option<f32>,
    pub blur_passes: Option<u32>,
    pub clip_blur_to_outline: Option<bool>,
    pub outline_color: Option<String>,
    pub line_width: Option<u32>,
    pub dash: Option<Vec<f64>>,
    pub input_size: Option<u32>,
    pub score_threshold: Option<f64>,
}

/// Settings the page should run its face model with.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSettings {
    pub input_size: u32,
    pub score_threshold: f64,
}

/// One face as reported by the page's detector
/// (`{ box: {x, y, width, height}, score, landmarks: [{x, y}, ...] }`).
#[derive(Deserialize)]
pub struct FaceInput {
    #[serde(rename = "box")]
    pub bounds: BoxInput,
    /// Faces reported without a score are always kept.
    #[serde(default = "unscored")]
    pub score: f64,
    #[serde(default)]
    pub landmarks: Option<Vec<PointInput>>,
}

fn unscored() -> f64 {
    1.0
}

#[derive(Deserialize)]
pub struct BoxInput {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Deserialize)]
pub struct PointInput {
    pub x: f64,
    pub y: f64,
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Create a JS `Error` with a `code` property.
fn make_error(code: &str, message: &str) -> JsValue {
    let err = js_sys::Error::new(message);
    let _ = js_sys::Reflect::set(&err, &"code".into(), &JsValue::from_str(code));
    JsValue::from(err)
}

/// Convert an `ObscuraError` into a JS `Error` with a machine-readable `code` property.
fn to_js_error(e: ObscuraError) -> JsValue {
    let code = match &e {
        ObscuraError::DecodeError(_) => "DECODE_ERROR",
        ObscuraError::UnsupportedFormat => "UNSUPPORTED_FORMAT",
        ObscuraError::ZeroDimensions => "ZERO_DIMENSIONS",
        ObscuraError::EncodeError(_) => "ENCODE_ERROR",
        ObscuraError::ModelLoad(_) => "MODEL_LOAD_FAILED",
        ObscuraError::Detection(_) => "DETECTION_FAILED",
        ObscuraError::InvalidLandmarks(_) => "INVALID_LANDMARKS",
        ObscuraError::EmptyRegion => "EMPTY_REGION",
        ObscuraError::InvalidBlurSigma(_) => "INVALID_BLUR_SIGMA",
        ObscuraError::InvalidConfig(_) => "INVALID_OPTIONS",
        ObscuraError::FaceIndexOutOfRange { .. } => "FACE_INDEX_OUT_OF_RANGE",
        ObscuraError::StaleDetection { .. } => "STALE_DETECTION",
        ObscuraError::NotReady => "NOT_READY",
    };
    make_error(code, &e.to_string())
}

fn string_to_policy(policy: &str) -> Result<OutlinePolicy, JsValue> {
    match policy {
        "box" => Ok(OutlinePolicy::Box),
        "contour" => Ok(OutlinePolicy::Contour),
        _ => Err(make_error(
            "INVALID_OPTIONS",
            &format!("unknown outline policy: {policy}"),
        )),
    }
}

/// Parse `#rrggbb` or `#rrggbbaa`.
fn parse_hex_color(color: &str) -> Result<Rgba<u8>, JsValue> {
    let invalid = || make_error("INVALID_OPTIONS", &format!("invalid color: {color}"));
    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

fn parse_options(options: JsValue) -> Result<EditorOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(EditorOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| make_error("INVALID_OPTIONS", &format!("invalid options: {e}")))
    }
}

/// Apply parsed `EditorOptions` on top of the default configuration.
fn apply_options(opts: &EditorOptions) -> Result<EditorConfig, JsValue> {
    let mut config = EditorConfig::default();
    if let Some(ref policy) = opts.outline_policy {
        config = config.outline_policy(string_to_policy(policy)?);
    }
    if let Some(sigma) = opts.blur_sigma {
        config = config.blur_sigma(sigma);
    }
    if let Some(passes) = opts.blur_passes {
        config = config.blur_passes(passes);
    }
    if let Some(clip) = opts.clip_blur_to_outline {
        config = config.clip_blur_to_outline(clip);
    }
    if let Some(ref dash) = opts.dash {
        config = config.dash(dash.clone());
    }
    if let Some(ref color) = opts.outline_color {
        config.outline.color = parse_hex_color(color)?;
    }
    if let Some(width) = opts.line_width {
        config.outline.width = width;
    }
    if let Some(size) = opts.input_size {
        config.detector.input_size = size;
    }
    if let Some(threshold) = opts.score_threshold {
        config.detector.score_threshold = threshold;
    }
    Ok(config)
}

/// Convert the page's detections into records, keeping their order.
///
/// A face with a malformed landmark set keeps its box and loses the
/// landmarks.
fn to_records(faces: Vec<FaceInput>) -> Vec<FaceRecord> {
    faces
        .into_iter()
        .map(|face| {
            let bounds = BoundingBox::new(
                face.bounds.x,
                face.bounds.y,
                face.bounds.width,
                face.bounds.height,
            );
            let confidence = face.score;
            let points = match face.landmarks {
                Some(points) => points,
                None => return FaceRecord::BoxOnly { bounds, confidence },
            };
            match Landmarks68::new(points.into_iter().map(|p| Point::new(p.x, p.y)).collect()) {
                Ok(landmarks) => FaceRecord::BoxWithLandmarks {
                    bounds,
                    confidence,
                    landmarks,
                },
                Err(e) => {
                    log::warn!("ignoring landmarks: {e}");
                    FaceRecord::BoxOnly { bounds, confidence }
                }
            }
        })
        .collect()
}

/// Browser-side face blur editor.
///
/// Typical use from JS:
///
/// ```js
/// const editor = new Editor({ outlinePolicy: "contour" });
/// try { await loadModels(editor.detectorOptions); }
/// catch (e) { editor.modelFailed(String(e)); }   // every later call throws
/// const generation = editor.load(bytes);
/// const faces = await detectFaces(img);   // page-side model
/// editor.completeDetection(generation, faces);
/// ctx.putImageData(new ImageData(editor.pixels(), editor.width, editor.height), 0, 0);
/// ```
#[wasm_bindgen]
pub struct Editor {
    inner: SceneController,
    latest: Option<LoadTicket>,
}

#[wasm_bindgen]
impl Editor {
    /// @param options - Optional object with fields: outlinePolicy ("box" |
    ///   "contour"), blurSigma, blurPasses, clipBlurToOutline, outlineColor
    ///   ("#rrggbb"), lineWidth, dash, inputSize, scoreThreshold
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<Editor, JsValue> {
        let opts = parse_options(options)?;
        let config = apply_options(&opts)?;
        let inner = SceneController::new(config).map_err(to_js_error)?;
        Ok(Editor {
            inner,
            latest: None,
        })
    }

    /// Report that the page's face model could not be loaded.
    ///
    /// The editor drops its image and every later call throws with code
    /// `MODEL_LOAD_FAILED`; the page should ask the user to reload.
    #[wasm_bindgen(js_name = "modelFailed")]
    pub fn model_failed(&mut self, message: &str) {
        self.inner.fail_model(message);
        self.latest = None;
    }

    /// `{ inputSize, scoreThreshold }` for the page's face model.
    #[wasm_bindgen(getter, js_name = "detectorOptions")]
    pub fn detector_options(&self) -> JsValue {
        let options = &self.inner.config().detector;
        let settings = DetectorSettings {
            input_size: options.input_size,
            score_threshold: options.score_threshold,
        };
        serde_wasm_bindgen::to_value(&settings).unwrap_or(JsValue::UNDEFINED)
    }

    /// Decode image bytes, show them, and return the load generation that
    /// `completeDetection` must be called with.
    pub fn load(&mut self, input: Vec<u8>) -> Result<f64, JsValue> {
        let ticket = self.inner.load_bytes(&input).map_err(to_js_error)?;
        self.latest = Some(ticket);
        Ok(ticket.generation() as f64)
    }

    /// Hand over the page detector's faces for load `generation`.
    ///
    /// Faces scoring below `scoreThreshold` are dropped. Results for an
    /// older load are rejected with code `STALE_DETECTION`. Returns the
    /// number of faces.
    #[wasm_bindgen(js_name = "completeDetection")]
    pub fn complete_detection(&mut self, generation: f64, faces: JsValue) -> Result<u32, JsValue> {
        self.check_model()?;
        let ticket = match self.latest {
            Some(ticket) if ticket.generation() as f64 == generation => ticket,
            _ => {
                return Err(make_error(
                    "STALE_DETECTION",
                    &format!("load {generation} is no longer current"),
                ))
            }
        };

        let faces: Vec<FaceInput> = if faces.is_undefined() || faces.is_null() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(faces).unwrap_or_else(|e| {
                log::warn!("unreadable detections, continuing without faces: {e}");
                Vec::new()
            })
        };

        let count = self
            .inner
            .complete_load(ticket, to_records(faces))
            .map_err(to_js_error)?;
        Ok(count as u32)
    }

    /// Toggle the face under a canvas-pixel click. Returns its index, if any.
    pub fn click(&mut self, x: f64, y: f64) -> Result<Option<u32>, JsValue> {
        self.check_model()?;
        Ok(self.inner.click(Point::new(x, y)).map(|i| i as u32))
    }

    /// Like `click`, for coordinates within a canvas element displayed at
    /// `displayWidth` x `displayHeight` CSS pixels.
    #[wasm_bindgen(js_name = "clickScaled")]
    pub fn click_scaled(
        &mut self,
        x: f64,
        y: f64,
        display_width: f64,
        display_height: f64,
    ) -> Result<Option<u32>, JsValue> {
        let canvas = self.inner.canvas().dimensions();
        let point = scale_to_canvas(
            Point::new(x, y),
            (display_width, display_height),
            canvas,
        );
        self.click(point.x, point.y)
    }

    pub fn toggle(&mut self, index: u32) -> Result<bool, JsValue> {
        self.inner.toggle(index as usize).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "setAll")]
    pub fn set_all(&mut self, blurred: bool) -> Result<(), JsValue> {
        self.inner.set_all(blurred).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "isBlurred")]
    pub fn is_blurred(&self, index: u32) -> bool {
        self.inner.is_blurred(index as usize)
    }

    /// Forget the current image ("upload a different image").
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.check_model()?;
        self.inner.reset();
        self.latest = None;
        Ok(())
    }

    /// "empty", "detecting", "ready" or "model-failed".
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.inner.state() {
            SceneState::Empty => "empty",
            SceneState::Detecting { .. } => "detecting",
            SceneState::Ready => "ready",
            SceneState::ModelFailed => "model-failed",
        }
        .to_string()
    }

    #[wasm_bindgen(getter, js_name = "faceCount")]
    pub fn face_count(&self) -> u32 {
        self.inner.face_count() as u32
    }

    /// Whether the page should show its "no faces detected" overlay.
    #[wasm_bindgen(getter, js_name = "showsNoFacesOverlay")]
    pub fn shows_no_faces_overlay(&self) -> bool {
        self.inner.shows_no_faces_overlay()
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.canvas().width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.canvas().height()
    }

    /// RGBA canvas pixels, ready for `new ImageData(...)`.
    pub fn pixels(&self) -> js_sys::Uint8ClampedArray {
        js_sys::Uint8ClampedArray::from(self.inner.canvas().as_raw().as_slice())
    }

    /// Encode the current canvas as PNG for download.
    #[wasm_bindgen(js_name = "exportPng")]
    pub fn export_png(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let data = self.inner.export_png().map_err(to_js_error)?;
        Ok(js_sys::Uint8Array::from(&data[..]))
    }

    /// Suggested download file name.
    #[wasm_bindgen(js_name = "exportFileName")]
    pub fn export_file_name() -> String {
        obscura::EXPORT_FILE_NAME.to_string()
    }
}

impl Editor {
    fn check_model(&self) -> Result<(), JsValue> {
        match self.inner.model_error() {
            Some(reason) => Err(to_js_error(ObscuraError::ModelLoad(reason.to_string()))),
            None => Ok(()),
        }
    }
}
