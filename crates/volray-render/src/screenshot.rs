//! Encoding captured frames as image files.

use std::path::Path;

use image::{ImageBuffer, Rgba};

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,
}

fn to_image(
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, ScreenshotError> {
    // wgpu uses a top-left origin, same as the image crate.
    ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(ScreenshotError::InvalidImageData)
}

/// Saves RGBA8 pixels as PNG or JPEG, chosen by the file extension.
pub fn save_image(
    path: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ScreenshotError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => {
            to_image(data, width, height)?.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel.
            let rgb = image::DynamicImage::ImageRgba8(to_image(data, width, height)?).to_rgb8();
            rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }

    log::info!("saved {width}x{height} image to {}", path.display());
    Ok(())
}

/// Encodes RGBA8 pixels as PNG in memory.
pub fn save_to_buffer(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScreenshotError> {
    let img = to_image(data, width, height)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let v = if i % 2 == 0 { 255 } else { 0 };
                [v, 0, 255 - v, 255]
            })
            .collect()
    }

    #[test]
    fn test_png_buffer_decodes_to_same_pixels() {
        let data = checker(4, 3);
        let png = save_to_buffer(&data, 4, 3).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.into_raw(), data);
    }

    #[test]
    fn test_short_data_rejected() {
        let err = save_to_buffer(&[0; 7], 2, 1).unwrap_err();
        assert!(matches!(err, ScreenshotError::InvalidImageData));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let path = std::env::temp_dir().join("volray_screenshot_test.bmpx");
        let err = save_image(&path, &checker(2, 2), 2, 2).unwrap_err();
        assert!(matches!(err, ScreenshotError::UnsupportedFormat(ext) if ext == "bmpx"));
        assert!(!path.exists());
    }

    #[test]
    fn test_save_png_and_jpeg() {
        let dir = std::env::temp_dir();
        for name in ["volray_screenshot_test.png", "volray_screenshot_test.JPG"] {
            let path = dir.join(name);
            save_image(&path, &checker(8, 8), 8, 8).unwrap();
            let img = image::open(&path).unwrap();
            assert_eq!((img.width(), img.height()), (8, 8));
            let _ = std::fs::remove_file(&path);
        }
    }
}
