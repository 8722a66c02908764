use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use obscura_wasm::Editor;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

fn make_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let check = if (x / 3 + y / 3) % 2 == 0 { 230 } else { 20 };
        *pixel = Rgb([check, (y * 255 / height.max(1)) as u8, 128]);
    }

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buffer
}

fn faces(json: &str) -> JsValue {
    js_sys::JSON::parse(json).unwrap()
}

fn error_code(err: JsValue) -> String {
    js_sys::Reflect::get(&err, &"code".into())
        .unwrap()
        .as_string()
        .unwrap()
}

#[wasm_bindgen_test]
fn load_and_detect_two_faces() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(120, 60)).unwrap();
    assert_eq!(editor.state(), "detecting");

    let detections = faces(
        r#"[{"box":{"x":10,"y":10,"width":40,"height":40},"score":0.9},
            {"box":{"x":70,"y":10,"width":40,"height":40},"score":0.8}]"#,
    );
    assert_eq!(editor.complete_detection(generation, detections).unwrap(), 2);
    assert_eq!(editor.state(), "ready");
    assert_eq!(editor.face_count(), 2);
    assert!(!editor.shows_no_faces_overlay());

    assert_eq!(editor.click(30.0, 30.0).unwrap(), Some(0));
    assert!(editor.is_blurred(0));
    assert!(!editor.is_blurred(1));
    assert_eq!(editor.click(60.0, 5.0).unwrap(), None);
}

#[wasm_bindgen_test]
fn scaled_click_maps_display_to_canvas() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(200, 100)).unwrap();
    editor
        .complete_detection(
            generation,
            faces(r#"[{"box":{"x":100,"y":0,"width":100,"height":100}}]"#),
        )
        .unwrap();

    // canvas shown at half size: (60, 20) on screen is (120, 40) on canvas
    assert_eq!(editor.click_scaled(60.0, 20.0, 100.0, 50.0).unwrap(), Some(0));
    assert_eq!(editor.click_scaled(20.0, 20.0, 100.0, 50.0).unwrap(), None);
}

#[wasm_bindgen_test]
fn unreadable_detections_leave_image_without_faces() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(40, 40)).unwrap();
    let count = editor
        .complete_detection(generation, JsValue::from_str("garbage"))
        .unwrap();

    assert_eq!(count, 0);
    assert!(editor.shows_no_faces_overlay());
    assert_eq!(editor.pixels().length(), 40 * 40 * 4);
}

#[wasm_bindgen_test]
fn short_landmark_list_falls_back_to_box() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(60, 60)).unwrap();
    let detections = faces(
        r#"[{"box":{"x":5,"y":5,"width":20,"height":20},"landmarks":[{"x":1,"y":1}]}]"#,
    );
    editor.complete_detection(generation, detections).unwrap();

    // a box corner is only inside the box outline
    assert_eq!(editor.click(25.0, 25.0).unwrap(), Some(0));
}

#[wasm_bindgen_test]
fn stale_generation_is_rejected() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let old = editor.load(make_test_png(40, 40)).unwrap();
    let new = editor.load(make_test_png(30, 30)).unwrap();

    let err = editor.complete_detection(old, faces("[]")).unwrap_err();
    assert_eq!(error_code(err), "STALE_DETECTION");
    assert_eq!(editor.state(), "detecting");
    assert_eq!(editor.complete_detection(new, faces("[]")).unwrap(), 0);
}

#[wasm_bindgen_test]
fn export_produces_png() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(50, 40)).unwrap();
    editor
        .complete_detection(
            generation,
            faces(r#"[{"box":{"x":5,"y":5,"width":20,"height":20}}]"#),
        )
        .unwrap();
    editor.set_all(true).unwrap();

    let png = editor.export_png().unwrap().to_vec();
    assert_eq!(&png[1..4], b"PNG");
    assert_eq!(Editor::export_file_name(), "obscured-image.png");
}

#[wasm_bindgen_test]
fn export_before_upload_is_not_ready() {
    let editor = Editor::new(JsValue::UNDEFINED).unwrap();
    assert_eq!(error_code(editor.export_png().unwrap_err()), "NOT_READY");
}

#[wasm_bindgen_test]
fn reset_returns_to_empty() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(20, 20)).unwrap();
    editor.reset().unwrap();

    assert_eq!(editor.state(), "empty");
    let err = editor.complete_detection(generation, faces("[]")).unwrap_err();
    assert_eq!(error_code(err), "STALE_DETECTION");
}

#[wasm_bindgen_test]
fn invalid_input_has_error_code() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let err = editor.load(b"not an image".to_vec()).unwrap_err();
    assert_eq!(error_code(err), "UNSUPPORTED_FORMAT");
}

#[wasm_bindgen_test]
fn options_are_validated() {
    let bad_policy = faces(r#"{"outlinePolicy":"circle"}"#);
    assert_eq!(
        error_code(Editor::new(bad_policy).err().unwrap()),
        "INVALID_OPTIONS"
    );

    let bad_sigma = faces(r#"{"blurSigma":0}"#);
    assert_eq!(
        error_code(Editor::new(bad_sigma).err().unwrap()),
        "INVALID_BLUR_SIGMA"
    );

    let bad_color = faces(r##"{"outlineColor":"green"}"##);
    assert_eq!(
        error_code(Editor::new(bad_color).err().unwrap()),
        "INVALID_OPTIONS"
    );

    let good = faces(
        r##"{"outlinePolicy":"box","blurSigma":8,"blurPasses":1,"outlineColor":"#ff0000","dash":[]}"##,
    );
    assert!(Editor::new(good).is_ok());
}

#[wasm_bindgen_test]
fn model_failure_blocks_the_editor() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let generation = editor.load(make_test_png(40, 40)).unwrap();
    editor.model_failed("could not fetch weights");

    assert_eq!(editor.state(), "model-failed");
    let err = editor.load(make_test_png(40, 40)).unwrap_err();
    assert_eq!(error_code(err), "MODEL_LOAD_FAILED");
    let err = editor.complete_detection(generation, faces("[]")).unwrap_err();
    assert_eq!(error_code(err), "MODEL_LOAD_FAILED");
    assert_eq!(error_code(editor.click(5.0, 5.0).unwrap_err()), "MODEL_LOAD_FAILED");
    assert_eq!(error_code(editor.export_png().unwrap_err()), "MODEL_LOAD_FAILED");
    assert_eq!(error_code(editor.reset().unwrap_err()), "MODEL_LOAD_FAILED");
}

#[wasm_bindgen_test]
fn detector_options_reach_the_page() {
    let defaults = Editor::new(JsValue::UNDEFINED).unwrap().detector_options();
    let field = |options: &JsValue, name: &str| {
        js_sys::Reflect::get(options, &name.into())
            .unwrap()
            .as_f64()
            .unwrap()
    };
    assert_eq!(field(&defaults, "inputSize"), 608.0);
    assert_eq!(field(&defaults, "scoreThreshold"), 0.3);

    let custom = Editor::new(faces(r#"{"inputSize":416,"scoreThreshold":0.5}"#))
        .unwrap()
        .detector_options();
    assert_eq!(field(&custom, "inputSize"), 416.0);
    assert_eq!(field(&custom, "scoreThreshold"), 0.5);
}

#[wasm_bindgen_test]
fn faces_below_score_threshold_are_dropped() {
    let mut editor = Editor::new(faces(r#"{"scoreThreshold":0.5}"#)).unwrap();
    let generation = editor.load(make_test_png(120, 60)).unwrap();
    let detections = faces(
        r#"[{"box":{"x":10,"y":10,"width":40,"height":40},"score":0.2},
            {"box":{"x":70,"y":10,"width":40,"height":40},"score":0.9}]"#,
    );

    assert_eq!(editor.complete_detection(generation, detections).unwrap(), 1);
    assert_eq!(editor.click(30.0, 30.0).unwrap(), None);
    assert_eq!(editor.click(90.0, 30.0).unwrap(), Some(0));
}

#[wasm_bindgen_test]
fn generations_count_up_across_loads() {
    let mut editor = Editor::new(JsValue::UNDEFINED).unwrap();
    let first = editor.load(make_test_png(10, 10)).unwrap();
    let second = editor.load(make_test_png(10, 10)).unwrap();
    assert_eq!(second, first + 1.0);
    assert_eq!(editor.complete_detection(second, faces("[]")).unwrap(), 0);
}
