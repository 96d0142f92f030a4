//! Per-frame quality heuristics.
//!
//! Three cheap signals computed from decoded RGBA pixel data: resolution,
//! mean brightness, and a vertical-difference contrast score used as a blur
//! proxy. All three run unconditionally in a fixed order (resolution,
//! brightness, contrast) and the last failing check's message wins, so at
//! most one warning string reaches the user per frame.

use crate::config::QualityThresholds;
use crate::types::RejectionReason;

const RGBA_CHANNELS: usize = 4;

/// Raw heuristic measurements for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    pub width: u32,
    pub height: u32,
    /// Mean of (R+G+B)/3 over all pixels, 0-255
    pub mean_brightness: f32,
    /// Sum of per-channel absolute differences between vertically adjacent
    /// pixels, normalized by pixel count
    pub contrast_score: f32,
}

/// Quality heuristics analyzer over decoded RGBA buffers.
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    thresholds: QualityThresholds,
}

impl QualityAnalyzer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Measure brightness and contrast in one linear pass each.
    pub fn measure(&self, rgba: &[u8], width: u32, height: u32) -> QualityMetrics {
        let pixel_count = (width as usize) * (height as usize);
        debug_assert_eq!(rgba.len(), pixel_count * RGBA_CHANNELS);

        // Sum whole channels and divide once at the end; per-pixel integer
        // division would bias the mean low near the threshold.
        let mut channel_sum = 0u64;
        for pixel in rgba.chunks_exact(RGBA_CHANNELS) {
            channel_sum += pixel[0] as u64 + pixel[1] as u64 + pixel[2] as u64;
        }

        // Each pixel against the pixel directly below it, RGB channels only.
        let row_stride = (width as usize) * RGBA_CHANNELS;
        let mut diff_sum = 0u64;
        if height > 1 {
            for i in 0..(pixel_count - width as usize) {
                let base = i * RGBA_CHANNELS;
                let below = base + row_stride;
                for c in 0..3 {
                    diff_sum +=
                        (rgba[base + c] as i32 - rgba[below + c] as i32).unsigned_abs() as u64;
                }
            }
        }

        let denom = pixel_count.max(1) as f64;
        QualityMetrics {
            width,
            height,
            mean_brightness: (channel_sum as f64 / (3.0 * denom)) as f32,
            contrast_score: (diff_sum as f64 / denom) as f32,
        }
    }

    /// Run all three checks and return the surviving warning, if any.
    ///
    /// Order is resolution, brightness, contrast; a later failure overwrites
    /// an earlier one. Callers rely on getting at most one warning.
    pub fn check(&self, rgba: &[u8], width: u32, height: u32) -> Option<RejectionReason> {
        let metrics = self.measure(rgba, width, height);
        let warning = self.check_metrics(&metrics);
        if let Some(reason) = warning {
            log::debug!(
                "quality check failed ({}): {}x{}, brightness {:.1}, contrast {:.1}",
                reason,
                width,
                height,
                metrics.mean_brightness,
                metrics.contrast_score
            );
        }
        warning
    }

    /// Threshold evaluation with overwrite-last-failure semantics.
    pub fn check_metrics(&self, metrics: &QualityMetrics) -> Option<RejectionReason> {
        let mut warning = None;

        if metrics.width < self.thresholds.min_width || metrics.height < self.thresholds.min_height
        {
            warning = Some(RejectionReason::LowResolution);
        }
        if metrics.mean_brightness < self.thresholds.min_brightness {
            warning = Some(RejectionReason::TooDark);
        }
        if metrics.contrast_score < self.thresholds.min_contrast {
            warning = Some(RejectionReason::Blurry);
        }

        warning
    }
}
