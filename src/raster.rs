use std::io::Cursor;

use anyhow::Context;

use crate::{
    core::{Extent, Rgba8},
    error::{InklayError, InklayResult},
};

/// Owned contiguous straight-RGBA8 pixel buffer.
///
/// Every transform in the crate produces a new buffer; nothing aliases the
/// pixel storage of another `RasterBuffer`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap raw RGBA8 bytes, enforcing `pixels.len() == width * height * 4`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> InklayResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| InklayError::validation("raster buffer size overflow"))?;
        if pixels.len() != expected {
            return Err(InklayError::validation(
                "raster buffer expects pixels matching width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform-color buffer. Used as the placeholder when a load fails.
    pub fn solid(width: u32, height: u32, color: Rgba8) -> Self {
        let mut pixels = vec![0u8; (width as usize) * (height as usize) * 4];
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode PNG/JPEG (or any format the `image` crate recognizes) into an
    /// owned RGBA8 buffer.
    pub fn decode(bytes: &[u8]) -> InklayResult<Self> {
        let dyn_img = image::load_from_memory(bytes)
            .map_err(|e| InklayError::decode(format!("undecodable image bytes: {e}")))?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.extent().is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Pixel at (x, y). Callers must stay in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = &self.pixels[idx..idx + 4];
        Rgba8::new(px[0], px[1], px[2], px[3])
    }

    /// Resample to `target` with Catmull-Rom filtering. Identical dimensions
    /// return an exact copy.
    pub fn resized(&self, target: Extent) -> InklayResult<RasterBuffer> {
        if target.is_empty() {
            return Err(InklayError::validation("resize target must be non-empty"));
        }
        if target == self.extent() {
            return Ok(self.clone());
        }
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("raster buffer into image")?;
        let resized = image::imageops::resize(
            &img,
            target.width,
            target.height,
            image::imageops::FilterType::CatmullRom,
        );
        Ok(Self {
            width: target.width,
            height: target.height,
            pixels: resized.into_raw(),
        })
    }

    /// Encode as PNG bytes.
    pub fn encode_png(&self) -> InklayResult<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("raster buffer into image")?;
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| InklayError::composition(format!("png encode failed: {e}")))?;
        Ok(buf)
    }

    /// Encode as JPEG bytes at `quality` (0-100). Alpha is dropped.
    pub fn encode_jpeg(&self, quality: u8) -> InklayResult<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("raster buffer into image")?;
        let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| InklayError::composition(format!("jpeg encode failed: {e}")))?;
        Ok(buf)
    }
}

/// Convert straight RGBA8 to premultiplied, in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Convert premultiplied RGBA8 back to straight, in place.
pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = (((px[0] as u32) * 255 + a / 2) / a).min(255) as u8;
        px[1] = (((px[1] as u32) * 255 + a / 2) / a).min(255) as u8;
        px[2] = (((px[2] as u32) * 255 + a / 2) / a).min(255) as u8;
    }
}
