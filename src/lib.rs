//! Orbitshot: guided vehicle photo capture and validation pipeline
//!
//! This crate drives a multi-step vehicle photo capture flow: each uploaded
//! frame is validated off the caller's thread (quality heuristics, then
//! object detection), accepted frames are cropped and normalized onto a
//! fixed canvas, and the finished ordered sequence is handed to a
//! pseudo-360° spin viewer.
//!
//! # Features
//! - Cheap per-frame quality heuristics (resolution, brightness, blur proxy)
//! - Pluggable vehicle detection behind a trait seam
//! - Background validation worker with an index-correlated message protocol
//! - Aspect-preserving crop onto a fixed, padded canvas
//! - Capture session state machine gating progression on validated steps
//!
//! # Usage
//! ```rust,no_run
//! use orbitshot::{CapturePipeline, PipelineConfig};
//! use orbitshot::testing::stub_vehicle_loader;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = CapturePipeline::new(PipelineConfig::default(), stub_vehicle_loader())?;
//! pipeline.start().await?;
//! pipeline.upload(0, std::fs::read("front.jpg")?)?;
//! while let Some(event) = pipeline.next_event().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod cropper;
pub mod detector;
pub mod errors;
pub mod pipeline;
pub mod quality;
pub mod session;
pub mod types;
pub mod validator;
pub mod worker;

// Testing utilities - synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::{CanvasConfig, ConfigError, FramingConfig, PipelineConfig, QualityThresholds};
pub use cropper::FrameNormalizer;
pub use detector::{FixedDetector, ModelLifecycleState, ModelLoader, VehicleDetector};
pub use errors::{CropError, ModelError, SessionError};
pub use pipeline::{CapturePipeline, PipelineEvent};
pub use session::{
    CaptureSession, CropDispatch, SessionPhase, SessionSnapshot, SlotState, ValidateDispatch,
    ValidationOutcome,
};
pub use types::{
    BoundingBox, CaptureStep, Detection, NormalizedFrame, RejectionReason, ValidationResult,
    VehicleClass,
};
pub use validator::FrameValidator;
pub use worker::{spawn_worker, WorkerEvent, WorkerHandle, WorkerRequest};

/// Initialize logging for the capture pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "orbitshot=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
