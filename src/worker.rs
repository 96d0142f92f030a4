//! Background validation worker.
//!
//! Hosts the detection model and per-frame validation off the caller's
//! thread. One worker per capture session: requests arrive over a channel,
//! are processed serially in arrival order, and every response carries the
//! originating step index so callers correlate by index, never by FIFO
//! position. Dropping the handle closes the channel and ends the worker;
//! in-flight work is abandoned and its result never observed.

use crate::config::{FramingConfig, QualityThresholds};
use crate::detector::{ModelLifecycleState, ModelLoader, VehicleDetector};
use crate::types::BoundingBox;
use crate::validator::FrameValidator;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Requests accepted by the worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Load the detection model exactly once; repeated `Init`s re-report the
    /// current lifecycle state without reloading.
    Init,
    /// Validate one raw file for the given step index.
    Validate { index: usize, bytes: Vec<u8> },
}

/// Responses emitted by the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    ModelReady,
    ModelError(String),
    /// Outcome for one `Validate` request. An empty `warning` together with
    /// a present `bounding_box` signals acceptance; anything else is a
    /// rejection. The original bytes ride along for the crop stage.
    ValidationResult {
        index: usize,
        warning: String,
        bounding_box: Option<BoundingBox>,
        bytes: Vec<u8>,
    },
}

/// Caller-side handle. Dropping it disposes the worker.
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerRequest>,
}

impl WorkerHandle {
    pub fn init(&self) {
        self.send(WorkerRequest::Init);
    }

    pub fn validate(&self, index: usize, bytes: Vec<u8>) {
        self.send(WorkerRequest::Validate { index, bytes });
    }

    fn send(&self, request: WorkerRequest) {
        if self.tx.send(request).is_err() {
            // Worker already ended; the session that owned it is gone.
            log::warn!("validation worker is no longer running, request dropped");
        }
    }
}

/// Spawn the background validation worker.
///
/// Returns the request handle and the event stream. CPU-bound decode and
/// inference run under `spawn_blocking` so the async runtime is not starved.
pub fn spawn_worker(
    quality: QualityThresholds,
    framing: FramingConfig,
    loader: impl ModelLoader,
) -> (WorkerHandle, mpsc::UnboundedReceiver<WorkerEvent>) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(worker_loop(quality, framing, Box::new(loader), req_rx, event_tx));

    (WorkerHandle { tx: req_tx }, event_rx)
}

async fn worker_loop(
    quality: QualityThresholds,
    framing: FramingConfig,
    mut loader: Box<dyn ModelLoader>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let validator = Arc::new(FrameValidator::new(quality, framing));
    let mut state = ModelLifecycleState::Loading;
    let mut detector: Option<Arc<dyn VehicleDetector>> = None;
    let mut load_error = String::new();

    while let Some(request) = requests.recv().await {
        match request {
            WorkerRequest::Init => {
                if state == ModelLifecycleState::Loading {
                    log::info!("loading detection model");
                    let mut boxed = loader;
                    let join = tokio::task::spawn_blocking(move || {
                        let outcome = boxed.load();
                        (outcome, boxed)
                    })
                    .await;
                    let outcome = match join {
                        Ok((outcome, boxed)) => {
                            loader = boxed;
                            outcome
                        }
                        Err(e) => {
                            log::error!("model load task panicked: {}", e);
                            break;
                        }
                    };
                    match outcome {
                        Ok(backend) => {
                            state = ModelLifecycleState::Ready;
                            detector = Some(Arc::from(backend));
                            log::info!("detection model ready");
                        }
                        Err(e) => {
                            state = ModelLifecycleState::Error;
                            load_error = e.to_string();
                            log::error!("detection model failed to load: {}", load_error);
                        }
                    }
                }

                let event = match state {
                    ModelLifecycleState::Ready => WorkerEvent::ModelReady,
                    _ => WorkerEvent::ModelError(load_error.clone()),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            WorkerRequest::Validate { index, bytes } => {
                log::debug!("validating frame for step {}", index);
                let validator = Arc::clone(&validator);
                let detector = detector.clone();
                let model_state = state;

                let join = tokio::task::spawn_blocking(move || {
                    let result =
                        validator.validate(&bytes, model_state, detector.as_deref());
                    (result, bytes)
                })
                .await;

                let (result, bytes) = match join {
                    Ok(output) => output,
                    Err(e) => {
                        log::error!("validation task for step {} panicked: {}", index, e);
                        continue;
                    }
                };

                let event = WorkerEvent::ValidationResult {
                    index,
                    warning: result.warning(),
                    bounding_box: result.bounding_box(),
                    bytes,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    }

    log::debug!("validation worker stopped");
}
