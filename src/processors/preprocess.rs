//! Image preprocessing for the recognition model.
//!
//! The transform is fixed and order matters: sniff the container format from
//! magic bytes, decode to RGB, resize to exactly 200x60, scale to [0,1]
//! floats, and lay the result out width-first with a single-element batch
//! dimension. The width axis leads because the network treats the horizontal
//! axis as the temporal axis it decodes over.

use crate::core::constants::{IMG_CHANNELS, IMG_HEIGHT, IMG_WIDTH};
use crate::core::errors::CaptchaError;
use crate::core::Tensor4D;
use base64::Engine;
use image::{imageops::FilterType, ImageFormat, RgbImage};
use ndarray::Array4;

/// Detects the image container format from its magic bytes.
///
/// Returns `None` when the buffer matches no supported container; the caller
/// reports that without attempting a decode.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [b'B', b'M', ..] => Some(ImageFormat::Bmp),
        [b'G', b'I', b'F', b'8', ..] => Some(ImageFormat::Gif),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Decodes a base64 image payload, stripping an optional
/// `data:image/...;base64,` prefix first.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, CaptchaError> {
    let encoded = payload
        .split_once(',')
        .map(|(_, rest)| rest)
        .unwrap_or(payload);
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| CaptchaError::image_decode(format!("invalid base64 payload: {e}")))
}

/// Deterministic transform from raw image bytes to the model input tensor.
#[derive(Debug, Clone)]
pub struct CaptchaPreprocessor {
    width: u32,
    height: u32,
}

impl Default for CaptchaPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptchaPreprocessor {
    /// Creates a preprocessor producing the model's fixed input shape.
    pub fn new() -> Self {
        Self {
            width: IMG_WIDTH,
            height: IMG_HEIGHT,
        }
    }

    /// Maps raw image bytes to a tensor of shape (1, 200, 60, 3).
    ///
    /// Any input resolution and aspect ratio is accepted and resized.
    /// Undecodable bytes fail with an image decode error.
    pub fn apply(&self, bytes: &[u8]) -> Result<Tensor4D, CaptchaError> {
        let format = sniff_format(bytes).ok_or_else(|| {
            CaptchaError::image_decode(
                "unrecognized image container (magic bytes match no supported format)",
            )
        })?;
        let img = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            CaptchaError::image_decode(format!("failed to decode {format:?} image: {e}"))
        })?;
        Ok(self.tensor_from_rgb(&img.to_rgb8()))
    }

    /// Maps an already-decoded RGB image to the model input tensor.
    pub fn tensor_from_rgb(&self, img: &RgbImage) -> Tensor4D {
        let resized = image::imageops::resize(img, self.width, self.height, FilterType::Triangle);

        // tensor[[0, x, y, c]] = channel c of the pixel at column x, row y
        let mut tensor = Array4::zeros((
            1,
            self.width as usize,
            self.height as usize,
            IMG_CHANNELS,
        ));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..IMG_CHANNELS {
                tensor[[0, x as usize, y as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
        }
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_sniff_format_png_and_jpeg() {
        assert_eq!(
            sniff_format(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(sniff_format(b"not an image"), None);
        assert_eq!(sniff_format(&[]), None);
    }

    #[test]
    fn test_output_shape_is_fixed_for_any_input_resolution() {
        let preprocessor = CaptchaPreprocessor::new();
        for (w, h) in [(200, 60), (37, 113), (640, 480), (1, 1)] {
            let tensor = preprocessor.apply(&png_bytes(w, h)).unwrap();
            assert_eq!(tensor.shape(), &[1, 200, 60, 3]);
            assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_width_axis_leads() {
        // Left half black, right half white: the split must show up along
        // the leading spatial axis.
        let mut img = RgbImage::new(100, 40);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = if x < 50 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) };
        }
        let tensor = CaptchaPreprocessor::new().tensor_from_rgb(&img);
        assert!(tensor[[0, 10, 30, 0]] < 0.1);
        assert!(tensor[[0, 190, 30, 0]] > 0.9);
    }

    #[test]
    fn test_undecodable_bytes_fail_with_decode_error() {
        let preprocessor = CaptchaPreprocessor::new();
        let result = preprocessor.apply(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(result, Err(CaptchaError::ImageDecode { .. })));

        // Valid PNG magic but truncated body.
        let result = preprocessor.apply(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert!(matches!(result, Err(CaptchaError::ImageDecode { .. })));
    }

    #[test]
    fn test_base64_prefix_stripping() {
        let plain = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let prefixed = format!("data:image/png;base64,{plain}");
        assert_eq!(decode_base64_image(&plain).unwrap(), b"hello");
        assert_eq!(decode_base64_image(&prefixed).unwrap(), b"hello");
    }

    #[test]
    fn test_invalid_base64_fails_with_decode_error() {
        let result = decode_base64_image("!!not base64!!");
        assert!(matches!(result, Err(CaptchaError::ImageDecode { .. })));
    }
}
