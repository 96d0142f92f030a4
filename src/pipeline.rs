//! Async capture pipeline.
//!
//! Owns the capture session, the background validation worker, and the frame
//! normalizer, and pumps worker events into session transitions. The UI
//! layer calls `upload`/`advance`/`open_viewer` and consumes `PipelineEvent`s;
//! it never blocks on validation or cropping. Dropping the pipeline disposes
//! the worker; any in-flight result is abandoned.

use crate::config::{ConfigError, PipelineConfig};
use crate::cropper::FrameNormalizer;
use crate::detector::{ModelLifecycleState, ModelLoader};
use crate::errors::{ModelError, SessionError};
use crate::session::{
    CaptureSession, SessionPhase, SessionSnapshot, ValidateDispatch, ValidationOutcome,
};
use crate::types::NormalizedFrame;
use crate::worker::{spawn_worker, WorkerEvent, WorkerHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notifications surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ModelReady,
    ModelFailed(String),
    StepRejected { index: usize, warning: String },
    StepCompleted { index: usize },
    StepProcessingFailed { index: usize },
}

pub struct CapturePipeline {
    session: CaptureSession,
    worker: WorkerHandle,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    normalizer: Arc<FrameNormalizer>,
    /// Latest dispatched slot version per step, for result correlation.
    inflight: HashMap<usize, u64>,
}

impl CapturePipeline {
    pub fn new(config: PipelineConfig, loader: impl ModelLoader) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let steps = config.capture_steps();
        let (worker, events) = spawn_worker(config.quality.clone(), config.framing.clone(), loader);
        Ok(Self {
            session: CaptureSession::new(steps),
            worker,
            events,
            normalizer: Arc::new(FrameNormalizer::new(config.canvas)),
            inflight: HashMap::new(),
        })
    }

    /// Kick off model loading and wait for the outcome.
    ///
    /// A load failure is fatal for the session; a fresh pipeline is required
    /// to retry.
    pub async fn start(&mut self) -> Result<(), ModelError> {
        self.worker.init();
        loop {
            match self.next_event().await {
                Some(PipelineEvent::ModelReady) => return Ok(()),
                Some(PipelineEvent::ModelFailed(reason)) => {
                    return Err(ModelError::LoadFailed(reason))
                }
                Some(_) => continue,
                None => {
                    return Err(ModelError::LoadFailed(
                        "worker ended before reporting model state".to_string(),
                    ))
                }
            }
        }
    }

    /// Submit a raw file for a capture step. Non-blocking: the outcome
    /// arrives later as a `PipelineEvent`.
    pub fn upload(&mut self, index: usize, bytes: Vec<u8>) -> Result<(), SessionError> {
        let dispatch = self.session.begin_upload(index, bytes)?;
        self.dispatch(dispatch);
        Ok(())
    }

    /// Re-run a step from its last uploaded bytes, the recovery action for
    /// `StepProcessingFailed`.
    pub fn retry(&mut self, index: usize) -> Result<(), SessionError> {
        let dispatch = self.session.retry_upload(index)?;
        self.dispatch(dispatch);
        Ok(())
    }

    fn dispatch(&mut self, dispatch: ValidateDispatch) {
        self.inflight.insert(dispatch.index, dispatch.version);
        self.worker.validate(dispatch.index, dispatch.bytes);
    }

    /// Pump the next worker event into the session. Returns `None` once the
    /// worker has ended. Crops run here, off the async thread, after an
    /// acceptance; stale results are absorbed silently.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        while let Some(event) = self.events.recv().await {
            match event {
                WorkerEvent::ModelReady => {
                    self.session.set_model_state(ModelLifecycleState::Ready);
                    return Some(PipelineEvent::ModelReady);
                }
                WorkerEvent::ModelError(reason) => {
                    self.session.set_model_state(ModelLifecycleState::Error);
                    return Some(PipelineEvent::ModelFailed(reason));
                }
                WorkerEvent::ValidationResult {
                    index,
                    warning,
                    bounding_box,
                    bytes,
                } => {
                    let version = self.inflight.get(&index).copied().unwrap_or(0);
                    let outcome = match self.session.apply_validation(
                        index,
                        version,
                        &warning,
                        bounding_box,
                        bytes,
                    ) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            log::error!("cannot apply validation result: {}", e);
                            continue;
                        }
                    };

                    match outcome {
                        ValidationOutcome::Accepted(crop) => {
                            let normalizer = Arc::clone(&self.normalizer);
                            let bbox = crop.bbox;
                            let bytes = crop.bytes;
                            let outcome = tokio::task::spawn_blocking(move || {
                                normalizer.normalize(&bytes, bbox)
                            })
                            .await;

                            match outcome {
                                Ok(Ok(frame)) => {
                                    if self
                                        .session
                                        .apply_crop_success(index, crop.version, frame)
                                        .is_ok()
                                    {
                                        return Some(PipelineEvent::StepCompleted { index });
                                    }
                                }
                                Ok(Err(e)) => {
                                    log::warn!("crop failed for step {}: {}", index, e);
                                    let _ = self.session.apply_crop_failure(index, crop.version);
                                    return Some(PipelineEvent::StepProcessingFailed { index });
                                }
                                Err(e) => {
                                    log::error!("crop task for step {} panicked: {}", index, e);
                                    let _ = self.session.apply_crop_failure(index, crop.version);
                                    return Some(PipelineEvent::StepProcessingFailed { index });
                                }
                            }
                        }
                        ValidationOutcome::Rejected { warning } => {
                            return Some(PipelineEvent::StepRejected { index, warning });
                        }
                        ValidationOutcome::Stale => {}
                    }
                }
            }
        }
        None
    }

    /// Whether the "Next" control is enabled.
    pub fn can_advance(&self) -> bool {
        self.session.can_advance()
    }

    pub fn advance(&mut self) -> Result<SessionPhase, SessionError> {
        self.session.advance()
    }

    /// Summary-phase user action: hand the ordered frames to the viewer.
    pub fn open_viewer(&mut self) -> Result<Vec<NormalizedFrame>, SessionError> {
        self.session.open_viewer()
    }

    pub fn frames(&self) -> Vec<NormalizedFrame> {
        self.session.frames()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Restart capture with the same worker and model.
    pub fn reset(&mut self) {
        self.inflight.clear();
        self.session.reset();
    }
}
