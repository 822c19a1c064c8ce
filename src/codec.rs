// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Image decoding. The format is sniffed from the bytes, never from the file name.

use image::DynamicImage;

use crate::error::DecodeError;

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    Ok(image::load_from_memory(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, image::Rgb([200, 10, 10])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = decode(&encoded(ImageFormat::Png)).unwrap();
        assert_eq!((img.width(), img.height()), (6, 4));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = decode(&encoded(ImageFormat::Jpeg)).unwrap();
        assert_eq!((img.width(), img.height()), (6, 4));
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode(b"definitely not an image").is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_decode_truncated_png_is_error() {
        let mut bytes = encoded(ImageFormat::Png);
        bytes.truncate(bytes.len() / 2);
        assert!(decode(&bytes).is_err());
    }
}
