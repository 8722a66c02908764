use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, RgbaImage};

use crate::error::ObscuraError;

/// Detect the input image format from the raw bytes.
pub(crate) fn detect_format(input: &[u8]) -> Result<ImageFormat, ObscuraError> {
    image::guess_format(input).map_err(|_| ObscuraError::UnsupportedFormat)
}

/// Decode input bytes (any format the `image` crate was built with) into RGBA.
pub fn decode_image(input: &[u8]) -> Result<RgbaImage, ObscuraError> {
    let format = detect_format(input)?;
    let decoded = image::load_from_memory_with_format(input, format)
        .map_err(|e| ObscuraError::DecodeError(e.to_string()))?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ObscuraError::ZeroDimensions);
    }

    Ok(decoded.to_rgba8())
}

/// Encode a canvas as PNG, keeping edges lossless.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ObscuraError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ObscuraError::EncodeError(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn make_test_rgb(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ]);
        }
        img
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let rgba = image::DynamicImage::ImageRgb8(make_test_rgb(32, 24)).to_rgba8();
        let png = encode_png(&rgba).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(decode_image(&png).unwrap(), rgba);
    }

    #[test]
    fn jpeg_input_decodes_to_rgba() {
        let img = make_test_rgb(40, 30);
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, 90)
            .write_image(img.as_raw(), 40, 30, image::ExtendedColorType::Rgb8)
            .unwrap();
        let decoded = decode_image(&buffer).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert_eq!(decoded.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn garbage_is_unsupported() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(ObscuraError::UnsupportedFormat)
        ));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let png = encode_png(&RgbaImage::new(16, 16)).unwrap();
        let result = decode_image(&png[..png.len() / 2]);
        assert!(matches!(result, Err(ObscuraError::DecodeError(_))));
    }
}
