//! Synthetic test data for offline pipeline testing.
//!
//! Generates raw RGBA buffers and encoded photos with controlled brightness,
//! contrast, and size characteristics, plus a stub detector loader, so the
//! full capture pipeline can be exercised without a camera or a real model.

use crate::detector::{FixedDetector, ModelLoader, VehicleDetector};
use crate::errors::ModelError;
use crate::types::{BoundingBox, Detection, VehicleClass};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Raw RGBA buffer of one uniform color.
pub fn rgba_solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    data
}

/// Raw RGBA buffer of alternating horizontal rows.
///
/// Every pixel differs from the one below it by `high - low` per channel,
/// which makes the vertical-difference contrast score easy to predict.
pub fn rgba_striped(width: u32, height: u32, low: u8, high: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let v = if y % 2 == 0 { low } else { high };
        for _ in 0..width {
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    data
}

/// Encode a raw RGBA buffer as a PNG file.
pub fn encode_png(rgba: Vec<u8>, width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_raw(width, height, rgba).expect("buffer matches dimensions");
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .expect("png encoding of a valid buffer");
    bytes.into_inner()
}

/// A photo that passes every quality heuristic: bright striped rows give it
/// plenty of brightness and vertical contrast.
pub fn vehicle_photo(width: u32, height: u32) -> Vec<u8> {
    encode_png(rgba_striped(width, height, 100, 200), width, height)
}

/// A photo failing the brightness check (mean luminance well below 40).
pub fn dark_photo(width: u32, height: u32) -> Vec<u8> {
    encode_png(rgba_striped(width, height, 5, 25), width, height)
}

/// A photo failing the contrast check: uniform mid-gray.
pub fn flat_photo(width: u32, height: u32) -> Vec<u8> {
    encode_png(rgba_solid(width, height, [128, 128, 128]), width, height)
}

/// A solid-color photo with a centered rectangle of a second color, for
/// visual crop checks.
pub fn photo_with_subject(
    width: u32,
    height: u32,
    background: [u8; 3],
    subject: [u8; 3],
    bbox: BoundingBox,
) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(
        width,
        height,
        Rgba([background[0], background[1], background[2], 255]),
    );
    let x0 = bbox.x.max(0.0) as u32;
    let y0 = bbox.y.max(0.0) as u32;
    let x1 = ((bbox.x + bbox.width) as u32).min(width);
    let y1 = ((bbox.y + bbox.height) as u32).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Rgba([subject[0], subject[1], subject[2], 255]));
        }
    }
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .expect("png encoding of a valid buffer");
    bytes.into_inner()
}

/// A well-framed car detection for an 800x600 photo: covers 25% of the image
/// with its center on the image center.
pub fn centered_car_detection() -> Detection {
    Detection {
        class: VehicleClass::Car,
        confidence: 0.9,
        bbox: BoundingBox::new(200.0, 150.0, 400.0, 300.0),
    }
}

/// Loader producing a stub detector that reports `centered_car_detection()`
/// for every frame. Pairs with 800x600 photos from `vehicle_photo`.
pub fn stub_vehicle_loader() -> impl ModelLoader {
    || -> Result<Box<dyn VehicleDetector>, ModelError> {
        Ok(Box::new(FixedDetector::new(vec![centered_car_detection()])))
    }
}
