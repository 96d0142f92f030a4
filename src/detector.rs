//! Vehicle detector adapter.
//!
//! Wraps whatever object-detection backend is in use behind an object-safe
//! trait so the pipeline is polymorphic over a real ML backend and the
//! fixed-output stub used in tests. The model is a process-wide dependency
//! loaded lazily, exactly once per worker, with a one-directional lifecycle.

use crate::errors::ModelError;
use crate::types::Detection;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One-time initialization state of the detection model.
///
/// Transitions are one-directional: `Loading -> Ready` or `Loading -> Error`.
/// A new worker instance is required to retry after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelLifecycleState {
    Loading,
    Ready,
    Error,
}

/// Object-detection backend seam.
///
/// Implementations receive a decoded image and return every candidate
/// detection; filtering to vehicle classes happens in the adapter.
pub trait VehicleDetector: Send + Sync {
    fn detect(&self, image: &RgbaImage) -> Result<Vec<Detection>, ModelError>;
}

/// One-shot fallible construction of a detector backend.
///
/// Invoked exactly once per worker on `Init`; the worker guards idempotency.
pub trait ModelLoader: Send + 'static {
    fn load(&mut self) -> Result<Box<dyn VehicleDetector>, ModelError>;
}

impl<F> ModelLoader for F
where
    F: FnMut() -> Result<Box<dyn VehicleDetector>, ModelError> + Send + 'static,
{
    fn load(&mut self) -> Result<Box<dyn VehicleDetector>, ModelError> {
        self()
    }
}

/// Pick the vehicle detection the pipeline should frame against: the
/// highest-confidence candidate whose class is in the vehicle set.
pub fn select_vehicle(detections: &[Detection]) -> Option<&Detection> {
    detections
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// Test/stub backend returning a fixed detection list for every frame.
///
/// Counts invocations so tests can assert the detector was (not) consulted.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    detections: Vec<Detection>,
    calls: Arc<AtomicUsize>,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A detector that never finds anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Shared call counter handle.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl VehicleDetector for FixedDetector {
    fn detect(&self, _image: &RgbaImage) -> Result<Vec<Detection>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}
