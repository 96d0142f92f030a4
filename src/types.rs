//! Core data types shared across the capture pipeline.
//!
//! Bounding boxes and detections use source-image pixel coordinates.
//! Normalized frames are the fixed-canvas outputs handed to the spin viewer.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal center of the box.
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Fraction of the image covered by this box.
    pub fn area_ratio(&self, image_width: u32, image_height: u32) -> f32 {
        let image_area = (image_width as f32) * (image_height as f32);
        if image_area <= 0.0 {
            return 0.0;
        }
        self.area() / image_area
    }
}

/// The fixed set of object classes accepted as vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
}

impl VehicleClass {
    /// Parse a detector label into a vehicle class, if it matches the set.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "car" => Some(Self::Car),
            "truck" => Some(Self::Truck),
            "bus" => Some(Self::Bus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Bus => "bus",
        }
    }
}

/// One candidate object found in a frame by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: VehicleClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Why a frame was rejected. These are expected, user-recoverable outcomes,
/// not errors; the display string is the single warning surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    NotAValidImage,
    LowResolution,
    TooDark,
    Blurry,
    ModelNotReady,
    NoVehicleDetected,
    VehicleTooFar,
    VehicleNotCentered,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAValidImage => "not a valid image",
            Self::LowResolution => "low resolution",
            Self::TooDark => "too dark",
            Self::Blurry => "blurry",
            Self::ModelNotReady => "model not ready",
            Self::NoVehicleDetected => "no vehicle detected",
            Self::VehicleTooFar => "vehicle too far",
            Self::VehicleNotCentered => "vehicle not centered",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Terminal outcome of validating one frame. No partial states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationResult {
    Rejected(RejectionReason),
    Accepted(BoundingBox),
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Warning string for the worker protocol: empty means accepted.
    pub fn warning(&self) -> String {
        match self {
            Self::Accepted(_) => String::new(),
            Self::Rejected(reason) => reason.message().to_string(),
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Accepted(bbox) => Some(*bbox),
            Self::Rejected(_) => None,
        }
    }
}

/// One fixed-canvas output frame of the rotation sequence.
///
/// Owned exclusively by its session slot; superseded on re-capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFrame {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded canvas bytes.
    pub data: Vec<u8>,
}

impl NormalizedFrame {
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }
}

/// One configured capture angle: ordinal, label, and keyword hints used by
/// optional angle-consistency checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStep {
    pub index: usize,
    pub label: String,
    pub angle_hints: Vec<String>,
}

impl CaptureStep {
    pub fn new(index: usize, label: impl Into<String>, hints: &[&str]) -> Self {
        Self {
            index,
            label: label.into(),
            angle_hints: hints.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let bbox = BoundingBox::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(bbox.center_x(), 200.0);
        assert_eq!(bbox.area(), 20000.0);
        assert!((bbox.area_ratio(800, 600) - 20000.0 / 480000.0).abs() < 1e-6);
    }

    #[test]
    fn test_area_ratio_zero_image() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(bbox.area_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_vehicle_class_labels() {
        assert_eq!(VehicleClass::from_label("car"), Some(VehicleClass::Car));
        assert_eq!(VehicleClass::from_label("TRUCK"), Some(VehicleClass::Truck));
        assert_eq!(VehicleClass::from_label("bus"), Some(VehicleClass::Bus));
        assert_eq!(VehicleClass::from_label("bicycle"), None);
        assert_eq!(VehicleClass::from_label(""), None);
    }

    #[test]
    fn test_validation_result_warning_contract() {
        let accepted = ValidationResult::Accepted(BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(accepted.warning().is_empty());
        assert!(accepted.bounding_box().is_some());

        let rejected = ValidationResult::Rejected(RejectionReason::TooDark);
        assert_eq!(rejected.warning(), "too dark");
        assert!(rejected.bounding_box().is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let detection = Detection {
            class: VehicleClass::Car,
            confidence: 0.92,
            bbox: BoundingBox::new(10.0, 20.0, 300.0, 200.0),
        };
        let json = serde_json::to_string(&detection).unwrap();
        let back: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detection);
    }
}
