use std::time::Duration;

use base64::{
    engine::general_purpose::STANDARD,
    Engine as _,
};
use image::{
    codecs::jpeg::JpegEncoder,
    imageops::{
        self,
        FilterType,
    },
    Rgb,
    RgbImage,
    RgbaImage,
};
use tracing::debug;

use crate::core::AnkipipeError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const JPEG_QUALITY: u8 = 85;

/// Downloads an image and returns it base64-encoded, flattened and scaled
/// down so its longest side is at most max_side. Processing failures fall
/// back to the untouched download; only transport problems are errors.
pub async fn fetch_image_as_base64(url: &str, max_side: u32) -> Result<String, AnkipipeError> {
    if max_side < 1 {
        return Err(AnkipipeError::Validation("max_side must be at least 1".to_string()));
    }

    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    let content = response.bytes().await?;

    Ok(STANDARD.encode(try_resize_to_jpeg(&content, max_side)))
}

/// Lossy degrade to passthrough: any decode or encode failure hands the
/// original bytes back unchanged instead of failing the caller.
pub fn try_resize_to_jpeg(content: &[u8], max_side: u32) -> Vec<u8> {
    match resize_to_jpeg(content, max_side) {
        Ok(encoded) => encoded,
        Err(error) => {
            debug!("image left unprocessed: {}", error);
            content.to_vec()
        }
    }
}

fn resize_to_jpeg(content: &[u8], max_side: u32) -> Result<Vec<u8>, image::ImageError> {
    let original = image::load_from_memory(content)?;

    // Transparency has to go before JPEG; composite onto white.
    let mut rgb = if original.color().has_alpha() {
        flatten_onto_white(&original.to_rgba8())
    } else {
        original.to_rgb8()
    };

    let (width, height) = rgb.dimensions();
    let longest = width.max(height);
    if longest > max_side {
        let scale = longest as f64 / max_side as f64;
        let new_width = ((width as f64 / scale).round() as u32).max(1);
        let new_height = ((height as f64 / scale).round() as u32).max(1);
        rgb = imageops::resize(&rgb, new_width, new_height, FilterType::CatmullRom);
    }

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(buffer)
}

fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    let (width, height) = rgba.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |fg: u8| (((fg as u32) * alpha + 255 * (255 - alpha)) / 255) as u8;
        canvas.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    canvas
}
