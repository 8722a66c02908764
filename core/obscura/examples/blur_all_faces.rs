//! Detect faces with the built-in SeetaFace backend, blur all of them, and
//! write the result to the current directory.
//!
//! Usage:
//!   cargo run --example blur_all_faces --features rustface -- photo.jpg [model.bin]

use obscura::{
    rustface_backend::DEFAULT_MODEL_PATH, EditorConfig, RustfaceDetector, SceneController,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next().ok_or("usage: blur_all_faces <image> [model]")?;
    let model_path = args.next().unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string());

    let config = EditorConfig::default();
    let detector = RustfaceDetector::load(&model_path, config.detector.clone())?;
    let mut editor = SceneController::new(config)?;

    let input = std::fs::read(&input_path)?;
    let image = obscura::decode_image(&input)?;
    let (width, height) = image.dimensions();
    let faces = editor.load_with(image, &detector)?;

    println!("=== {input_path} ({width}x{height}) ===");
    if faces == 0 {
        println!("  no faces detected, writing the image unchanged");
    } else {
        println!("  found {faces} face(s), blurring all");
        editor.set_all(true)?;
    }

    std::fs::write(obscura::EXPORT_FILE_NAME, editor.export_png()?)?;
    println!("  wrote {}", obscura::EXPORT_FILE_NAME);
    Ok(())
}
