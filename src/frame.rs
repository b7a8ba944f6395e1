//! Decoded frames flowing from a source to the detector and renderer.
//!
//! - `Frame`: packed RGB24 pixels plus dimensions and a sequence number.
//!
//! Frames are owned by the processing loop and dropped once the frame's
//! report has been handed to the sink. Nothing here outlives a single frame.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// One decoded RGB24 frame.
pub struct Frame {
    /// Packed RGB bytes, row-major, `width * height * 3` long.
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Zero-based position in the source stream.
    pub index: u64,
}

impl Frame {
    /// Wrap packed RGB24 bytes. Fails if the buffer does not match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{} frame, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
        })
    }

    /// Solid black frame, handy for dry runs where only detections matter.
    pub fn blank(width: u32, height: u32, index: u64) -> Self {
        Self {
            pixels: vec![0u8; width as usize * height as usize * 3],
            width,
            height,
            index,
        }
    }

    pub fn from_image(img: RgbImage, index: u64) -> Self {
        let (width, height) = img.dimensions();
        Self {
            pixels: img.into_raw(),
            width,
            height,
            index,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy into an `image` buffer for drawing or encoding.
    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("index", &self.index)
            .finish()
    }
}
