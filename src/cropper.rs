//! Crop and normalization of accepted frames.
//!
//! Takes the original file plus the accepted bounding box and produces one
//! fixed-canvas frame of the rotation sequence: the box region uniformly
//! scaled to fit the canvas with padding, centered on a white background,
//! re-encoded as PNG.

use crate::config::CanvasConfig;
use crate::errors::CropError;
use crate::types::{BoundingBox, NormalizedFrame};
use image::imageops::FilterType;
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

pub struct FrameNormalizer {
    canvas: CanvasConfig,
}

impl FrameNormalizer {
    pub fn new(canvas: CanvasConfig) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> CanvasConfig {
        self.canvas
    }

    /// Produce the normalized frame for one accepted capture.
    pub fn normalize(&self, bytes: &[u8], bbox: BoundingBox) -> Result<NormalizedFrame, CropError> {
        let source = image::load_from_memory(bytes)?.to_rgba8();
        let (img_w, img_h) = source.dimensions();

        let region = clamp_to_image(bbox, img_w, img_h)?;
        let cropped =
            imageops::crop_imm(&source, region.0, region.1, region.2, region.3).to_image();

        // Uniform, aspect-preserving fit with padding around the subject.
        let scale = (self.canvas.width as f32 / region.2 as f32)
            .min(self.canvas.height as f32 / region.3 as f32)
            * self.canvas.fit_scale;
        let target_w = ((region.2 as f32 * scale).round() as u32).max(1);
        let target_h = ((region.3 as f32 * scale).round() as u32).max(1);

        let scaled = imageops::resize(&cropped, target_w, target_h, FilterType::Triangle);

        let mut canvas = RgbaImage::from_pixel(
            self.canvas.width,
            self.canvas.height,
            Rgba([255, 255, 255, 255]),
        );
        let offset_x = (self.canvas.width.saturating_sub(target_w)) / 2;
        let offset_y = (self.canvas.height.saturating_sub(target_h)) / 2;
        imageops::overlay(&mut canvas, &scaled, offset_x as i64, offset_y as i64);

        let mut encoded = Cursor::new(Vec::new());
        canvas
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(CropError::Encode)?;

        log::debug!(
            "normalized frame: box {:.0}x{:.0} -> {}x{} on {}x{} canvas",
            bbox.width,
            bbox.height,
            target_w,
            target_h,
            self.canvas.width,
            self.canvas.height
        );

        Ok(NormalizedFrame {
            width: self.canvas.width,
            height: self.canvas.height,
            data: encoded.into_inner(),
        })
    }
}

impl Default for FrameNormalizer {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}

/// Clamp a bounding box to image bounds, rejecting boxes with no area left.
fn clamp_to_image(
    bbox: BoundingBox,
    img_w: u32,
    img_h: u32,
) -> Result<(u32, u32, u32, u32), CropError> {
    if bbox.width < 1.0 || bbox.height < 1.0 {
        return Err(CropError::DegenerateBox {
            width: bbox.width,
            height: bbox.height,
        });
    }

    let x = bbox.x.max(0.0) as u32;
    let y = bbox.y.max(0.0) as u32;
    if x >= img_w || y >= img_h {
        return Err(CropError::DegenerateBox {
            width: bbox.width,
            height: bbox.height,
        });
    }

    let w = (bbox.width as u32).min(img_w - x).max(1);
    let h = (bbox.height as u32).min(img_h - y).max(1);
    Ok((x, y, w, h))
}
