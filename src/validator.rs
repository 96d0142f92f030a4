//! Single-frame validation.
//!
//! Orchestrates decode, quality heuristics, and vehicle detection into one
//! terminal accept/reject outcome per frame. Heuristics short-circuit ahead
//! of inference so obviously bad frames never reach the model.

use crate::config::{FramingConfig, QualityThresholds};
use crate::detector::{select_vehicle, ModelLifecycleState, VehicleDetector};
use crate::quality::QualityAnalyzer;
use crate::types::{BoundingBox, RejectionReason, ValidationResult};

pub struct FrameValidator {
    analyzer: QualityAnalyzer,
    framing: FramingConfig,
}

impl FrameValidator {
    pub fn new(quality: QualityThresholds, framing: FramingConfig) -> Self {
        Self {
            analyzer: QualityAnalyzer::new(quality),
            framing,
        }
    }

    /// Classify one raw file. Terminal after a single pass, no retries.
    ///
    /// `detector` is `None` until the model finishes loading; frames passing
    /// the heuristics before that point reject with "model not ready".
    pub fn validate(
        &self,
        bytes: &[u8],
        model_state: ModelLifecycleState,
        detector: Option<&dyn VehicleDetector>,
    ) -> ValidationResult {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::debug!("frame decode failed: {}", e);
                return ValidationResult::Rejected(RejectionReason::NotAValidImage);
            }
        };
        let (width, height) = decoded.dimensions();

        if let Some(reason) = self.analyzer.check(decoded.as_raw(), width, height) {
            return ValidationResult::Rejected(reason);
        }

        let detector = match (model_state, detector) {
            (ModelLifecycleState::Ready, Some(detector)) => detector,
            _ => return ValidationResult::Rejected(RejectionReason::ModelNotReady),
        };

        let detections = match detector.detect(&decoded) {
            Ok(detections) => detections,
            Err(e) => {
                log::error!("inference failed, treating frame as vehicle-free: {}", e);
                return ValidationResult::Rejected(RejectionReason::NoVehicleDetected);
            }
        };

        let vehicle = match select_vehicle(&detections) {
            Some(detection) => detection,
            None => return ValidationResult::Rejected(RejectionReason::NoVehicleDetected),
        };

        match self.check_framing(&vehicle.bbox, width, height) {
            Some(reason) => ValidationResult::Rejected(reason),
            None => {
                log::debug!(
                    "frame accepted: {:?} at {:.0},{:.0} ({:.0}x{:.0}), confidence {:.2}",
                    vehicle.class,
                    vehicle.bbox.x,
                    vehicle.bbox.y,
                    vehicle.bbox.width,
                    vehicle.bbox.height,
                    vehicle.confidence
                );
                ValidationResult::Accepted(vehicle.bbox)
            }
        }
    }

    /// Area and centering rules, evaluated independently.
    ///
    /// When both fail, the centering message overwrites the area message,
    /// mirroring the overwrite-last-failure policy of the quality checks.
    fn check_framing(
        &self,
        bbox: &BoundingBox,
        image_width: u32,
        image_height: u32,
    ) -> Option<RejectionReason> {
        let mut warning = None;

        if bbox.area_ratio(image_width, image_height) < self.framing.min_area_ratio {
            warning = Some(RejectionReason::VehicleTooFar);
        }

        let (lower, upper) = self.framing.center_band;
        let center_x = bbox.center_x();
        let width = image_width as f32;
        let centered = center_x > lower * width && center_x < upper * width;
        if !centered {
            warning = Some(RejectionReason::VehicleNotCentered);
        }

        warning
    }
}
