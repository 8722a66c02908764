//! Interactive face blurring: detect faces in a photo, toggle a blur on each
//! one by clicking it, and export the result as PNG.
//!
//! Face detection is pluggable through [`FaceDetector`]; everything after it
//! (outline geometry, hit testing, masking and redraw) lives here.
//!
//! # Example
//!
//! ```no_run
//! use obscura::{EditorConfig, FaceDetector, FaceRecord, ObscuraError, Point, SceneController};
//! use image::RgbaImage;
//!
//! struct MyDetector;
//! impl FaceDetector for MyDetector {
//!     fn detect(&self, _image: &RgbaImage) -> Result<Vec<FaceRecord>, ObscuraError> {
//!         // Your detection logic here
//!         Ok(vec![])
//!     }
//! }
//!
//! let raw_bytes = std::fs::read("photo.jpg").unwrap();
//! let mut editor = SceneController::new(EditorConfig::default()).unwrap();
//! let image = obscura::decode_image(&raw_bytes).unwrap();
//! editor.load_with(image, &MyDetector).unwrap();
//!
//! editor.click(Point::new(120.0, 80.0));
//! std::fs::write(obscura::EXPORT_FILE_NAME, editor.export_png().unwrap()).unwrap();
//! ```
#![warn(missing_docs)]

mod codec;
mod config;
mod error;
/// Face detection traits and data types.
pub mod face_detector;
/// Outline policies and face polygon derivation.
pub mod geometry;
/// Dashed outline stroking and region blurring.
pub mod mask;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;
mod scene;

pub use codec::{decode_image, encode_png};
pub use config::EditorConfig;
/// Error type returned by obscura operations.
pub use error::ObscuraError;
pub use face_detector::{
    detect_faces, retain_confident, BoundingBox, DetectorOptions, FaceDetector, FaceRecord,
    Landmarks68, Point,
};
pub use geometry::{FaceOutline, OutlinePolicy};
pub use mask::{BlurStyle, OutlineStyle};
#[cfg(feature = "rustface")]
/// Built-in detector that loads the SeetaFace model from disk.
pub use rustface_backend::RustfaceDetector;
pub use scene::{LoadTicket, Scene, SceneController, SceneState, ToggleSet, EXPORT_FILE_NAME};
