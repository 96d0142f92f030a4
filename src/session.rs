//! Capture session state machine.
//!
//! Drives the user through the configured capture angles. Each step owns one
//! mutable slot (raw upload, warning string, normalized output) that only
//! the session mutates, in response to upload and worker-result events.
//! Every dispatch carries a per-slot version; results with a stale version
//! are discarded rather than applied, so a superseded upload can never
//! clobber a newer one. The machine itself is synchronous and I/O-free; the
//! pipeline layer wires it to the worker and the cropper.

use crate::detector::ModelLifecycleState;
use crate::errors::SessionError;
use crate::types::{BoundingBox, CaptureStep, NormalizedFrame};
use serde::Serialize;

/// Per-slot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Empty,
    Validating,
    Rejected,
    /// Accepted by the validator, crop still in flight
    Processing,
    /// Crop failed after acceptance; explicit user-visible retry state
    ProcessingFailed,
    Complete,
}

/// Global session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    InProgress,
    Summary,
    Viewing,
}

/// Marker shown while a slot is being validated.
const VALIDATING_MARKER: &str = "validating";
const PROCESSING_FAILED_MARKER: &str = "could not process accepted image, please retry";

#[derive(Debug, Clone)]
struct StepSlot {
    state: SlotState,
    /// Empty = validated success; non-empty = rejection reason or marker
    warning: String,
    version: u64,
    raw: Option<Vec<u8>>,
    normalized: Option<NormalizedFrame>,
}

impl StepSlot {
    fn new() -> Self {
        Self {
            state: SlotState::Empty,
            warning: String::new(),
            version: 0,
            raw: None,
            normalized: None,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self.state, SlotState::Validating | SlotState::Processing)
    }
}

/// A validation request the caller should forward to the worker.
#[derive(Debug)]
pub struct ValidateDispatch {
    pub index: usize,
    pub version: u64,
    pub bytes: Vec<u8>,
}

/// A crop request the caller should run after an acceptance.
#[derive(Debug)]
pub struct CropDispatch {
    pub index: usize,
    pub version: u64,
    pub bytes: Vec<u8>,
    pub bbox: BoundingBox,
}

/// What applying a worker validation result did to the slot.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// Result did not match the slot's current version; nothing changed
    Stale,
    Rejected { warning: String },
    /// Frame accepted; caller should run the returned crop
    Accepted(CropDispatch),
}

/// Read-only view of one slot for UI consumption.
#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub index: usize,
    pub label: String,
    pub state: SlotState,
    pub warning: String,
    pub has_frame: bool,
}

/// Serializable session snapshot for an external persistence collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub current_step: usize,
    pub model_state: ModelLifecycleState,
    pub slots: Vec<SlotView>,
}

pub struct CaptureSession {
    steps: Vec<CaptureStep>,
    slots: Vec<StepSlot>,
    current: usize,
    phase: SessionPhase,
    model_state: ModelLifecycleState,
}

impl CaptureSession {
    pub fn new(steps: Vec<CaptureStep>) -> Self {
        assert!(!steps.is_empty(), "a capture session needs at least one step");
        let slots = steps.iter().map(|_| StepSlot::new()).collect();
        Self {
            steps,
            slots,
            current: 0,
            phase: SessionPhase::InProgress,
            model_state: ModelLifecycleState::Loading,
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn model_state(&self) -> ModelLifecycleState {
        self.model_state
    }

    pub fn steps(&self) -> &[CaptureStep] {
        &self.steps
    }

    /// Record the worker-reported model lifecycle. Transitions out of
    /// `Loading` are one-directional; later reports of the same state are
    /// no-ops.
    pub fn set_model_state(&mut self, state: ModelLifecycleState) {
        if self.model_state == ModelLifecycleState::Loading {
            self.model_state = state;
        }
    }

    /// Accept a raw upload for a step and produce the validation dispatch.
    ///
    /// Uploads are refused while the model is not ready, while the same slot
    /// still has a validation or crop in flight (reentrancy guard), and once
    /// the viewer is open.
    pub fn begin_upload(
        &mut self,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<ValidateDispatch, SessionError> {
        self.check_index(index)?;
        match self.model_state {
            ModelLifecycleState::Ready => {}
            ModelLifecycleState::Loading => return Err(SessionError::ModelNotReady),
            ModelLifecycleState::Error => return Err(SessionError::ModelFailed),
        }
        if self.phase == SessionPhase::Viewing {
            return Err(SessionError::NotInSummary);
        }

        let slot = &mut self.slots[index];
        if slot.is_busy() {
            return Err(SessionError::StepBusy(index));
        }

        slot.version += 1;
        slot.state = SlotState::Validating;
        slot.warning = VALIDATING_MARKER.to_string();
        slot.raw = Some(bytes.clone());
        slot.normalized = None;

        log::debug!(
            "step {} ({}) uploading, version {}",
            index,
            self.steps[index].label,
            slot.version
        );

        Ok(ValidateDispatch {
            index,
            version: slot.version,
            bytes,
        })
    }

    /// Apply a worker validation result.
    pub fn apply_validation(
        &mut self,
        index: usize,
        version: u64,
        warning: &str,
        bbox: Option<BoundingBox>,
        bytes: Vec<u8>,
    ) -> Result<ValidationOutcome, SessionError> {
        self.check_index(index)?;
        let slot = &mut self.slots[index];

        if slot.version != version || slot.state != SlotState::Validating {
            log::debug!(
                "discarding stale validation result for step {} (version {} vs {})",
                index,
                version,
                slot.version
            );
            return Ok(ValidationOutcome::Stale);
        }

        // Acceptance requires BOTH the empty warning and a bounding box.
        match (warning.is_empty(), bbox) {
            (true, Some(bbox)) => {
                slot.state = SlotState::Processing;
                slot.warning.clear();
                log::info!("step {} accepted, cropping", index);
                Ok(ValidationOutcome::Accepted(CropDispatch {
                    index,
                    version,
                    bytes,
                    bbox,
                }))
            }
            _ => {
                slot.state = SlotState::Rejected;
                slot.warning = warning.to_string();
                log::info!("step {} rejected: {}", index, slot.warning);
                Ok(ValidationOutcome::Rejected {
                    warning: slot.warning.clone(),
                })
            }
        }
    }

    /// Apply a successful crop result.
    pub fn apply_crop_success(
        &mut self,
        index: usize,
        version: u64,
        frame: NormalizedFrame,
    ) -> Result<(), SessionError> {
        self.check_index(index)?;
        let slot = &mut self.slots[index];

        if slot.version != version || slot.state != SlotState::Processing {
            log::debug!("discarding stale crop result for step {}", index);
            return Ok(());
        }

        slot.normalized = Some(frame);
        slot.warning.clear();
        slot.state = SlotState::Complete;
        log::info!("step {} complete", index);
        Ok(())
    }

    /// Apply a crop failure: the frame was accepted but unusable.
    pub fn apply_crop_failure(&mut self, index: usize, version: u64) -> Result<(), SessionError> {
        self.check_index(index)?;
        let slot = &mut self.slots[index];

        if slot.version != version || slot.state != SlotState::Processing {
            log::debug!("discarding stale crop failure for step {}", index);
            return Ok(());
        }

        slot.state = SlotState::ProcessingFailed;
        slot.warning = PROCESSING_FAILED_MARKER.to_string();
        log::warn!("step {} crop failed after acceptance", index);
        Ok(())
    }

    /// Whether the "Next" control is enabled: current slot must be Complete.
    pub fn can_advance(&self) -> bool {
        self.phase == SessionPhase::InProgress
            && self.slots[self.current].state == SlotState::Complete
    }

    /// Advance to the next step; past the last step the session moves to the
    /// summary phase.
    pub fn advance(&mut self) -> Result<SessionPhase, SessionError> {
        if !self.can_advance() {
            return Err(SessionError::StepNotComplete);
        }
        if self.current + 1 < self.steps.len() {
            self.current += 1;
        } else {
            self.phase = SessionPhase::Summary;
            log::info!("all steps attempted, session in summary");
        }
        Ok(self.phase)
    }

    /// Manual user action: open the viewer over the completed frames.
    ///
    /// Incomplete slots are skipped, not an error; the UI flags them as
    /// pending via `snapshot()`.
    pub fn open_viewer(&mut self) -> Result<Vec<NormalizedFrame>, SessionError> {
        if self.phase != SessionPhase::Summary {
            return Err(SessionError::NotInSummary);
        }
        self.phase = SessionPhase::Viewing;
        Ok(self.frames())
    }

    /// Ordered sequence of completed normalized frames.
    pub fn frames(&self) -> Vec<NormalizedFrame> {
        self.slots
            .iter()
            .filter_map(|slot| slot.normalized.clone())
            .collect()
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|s| s.state)
    }

    pub fn slot_warning(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.warning.as_str())
    }

    /// Re-dispatch the last uploaded bytes for a step, the recovery action
    /// after a processing failure. The same upload rules apply.
    pub fn retry_upload(&mut self, index: usize) -> Result<ValidateDispatch, SessionError> {
        self.check_index(index)?;
        let bytes = self.slots[index]
            .raw
            .clone()
            .ok_or(SessionError::NothingToRetry(index))?;
        self.begin_upload(index, bytes)
    }

    /// Steps without a completed frame, for summary-screen flags.
    pub fn pending_steps(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state != SlotState::Complete)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            current_step: self.current,
            model_state: self.model_state,
            slots: self
                .slots
                .iter()
                .enumerate()
                .map(|(index, slot)| SlotView {
                    index,
                    label: self.steps[index].label.clone(),
                    state: slot.state,
                    warning: slot.warning.clone(),
                    has_frame: slot.normalized.is_some(),
                })
                .collect(),
        }
    }

    /// Restart capture: discard every slot and return to the first step.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = StepSlot::new();
        }
        self.current = 0;
        self.phase = SessionPhase::InProgress;
        log::info!("session reset");
    }

    fn check_index(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.steps.len() {
            return Err(SessionError::StepOutOfRange {
                index,
                count: self.steps.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptureStep;

    fn steps(n: usize) -> Vec<CaptureStep> {
        (0..n)
            .map(|i| CaptureStep::new(i, format!("Angle {}", i), &[]))
            .collect()
    }

    fn ready_session(n: usize) -> CaptureSession {
        let mut session = CaptureSession::new(steps(n));
        session.set_model_state(ModelLifecycleState::Ready);
        session
    }

    fn frame() -> NormalizedFrame {
        NormalizedFrame {
            width: 800,
            height: 600,
            data: vec![0u8; 16],
        }
    }

    fn expect_crop(outcome: ValidationOutcome) -> CropDispatch {
        match outcome {
            ValidationOutcome::Accepted(crop) => crop,
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    fn accept_step(session: &mut CaptureSession, index: usize) {
        let dispatch = session.begin_upload(index, vec![1, 2, 3]).unwrap();
        let crop = expect_crop(
            session
                .apply_validation(
                    index,
                    dispatch.version,
                    "",
                    Some(BoundingBox::new(100.0, 100.0, 400.0, 300.0)),
                    dispatch.bytes,
                )
                .unwrap(),
        );
        session
            .apply_crop_success(index, crop.version, frame())
            .unwrap();
    }

    #[test]
    fn test_upload_blocked_while_model_loading() {
        let mut session = CaptureSession::new(steps(3));
        assert_eq!(
            session.begin_upload(0, vec![1]).unwrap_err(),
            SessionError::ModelNotReady
        );
    }

    #[test]
    fn test_upload_blocked_after_model_failure() {
        let mut session = CaptureSession::new(steps(3));
        session.set_model_state(ModelLifecycleState::Error);
        assert_eq!(
            session.begin_upload(0, vec![1]).unwrap_err(),
            SessionError::ModelFailed
        );
    }

    #[test]
    fn test_model_state_is_one_directional() {
        let mut session = CaptureSession::new(steps(1));
        session.set_model_state(ModelLifecycleState::Ready);
        session.set_model_state(ModelLifecycleState::Error);
        assert_eq!(session.model_state(), ModelLifecycleState::Ready);
    }

    #[test]
    fn test_reentrancy_guard_rejects_concurrent_upload() {
        let mut session = ready_session(3);
        session.begin_upload(0, vec![1]).unwrap();
        assert_eq!(
            session.begin_upload(0, vec![2]).unwrap_err(),
            SessionError::StepBusy(0)
        );
        // Other steps are unaffected
        assert!(session.begin_upload(1, vec![3]).is_ok());
    }

    #[test]
    fn test_rejection_allows_reupload() {
        let mut session = ready_session(2);
        let dispatch = session.begin_upload(0, vec![1]).unwrap();
        session
            .apply_validation(0, dispatch.version, "too dark", None, dispatch.bytes)
            .unwrap();
        assert_eq!(session.slot_state(0), Some(SlotState::Rejected));
        assert_eq!(session.slot_warning(0), Some("too dark"));
        assert!(!session.can_advance());

        // Recovery: re-upload the same step
        accept_step(&mut session, 0);
        assert_eq!(session.slot_state(0), Some(SlotState::Complete));
        assert!(session.can_advance());
    }

    #[test]
    fn test_stale_validation_discarded() {
        let mut session = ready_session(2);
        let first = session.begin_upload(0, vec![1]).unwrap();
        // Reject the first attempt, then start a second one
        session
            .apply_validation(0, first.version, "blurry", None, first.bytes)
            .unwrap();
        let second = session.begin_upload(0, vec![2]).unwrap();
        assert!(second.version > first.version);

        // A late result for the first attempt must be discarded
        let outcome = session
            .apply_validation(
                0,
                first.version,
                "",
                Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                vec![1],
            )
            .unwrap();
        assert!(matches!(outcome, ValidationOutcome::Stale));
        assert_eq!(session.slot_state(0), Some(SlotState::Validating));
    }

    #[test]
    fn test_result_correlated_by_index_not_order() {
        let mut session = ready_session(3);
        let d1 = session.begin_upload(1, vec![1]).unwrap();
        let d2 = session.begin_upload(2, vec![2]).unwrap();

        // Index 2's result arrives first; index 1's slot is untouched
        session
            .apply_validation(2, d2.version, "no vehicle detected", None, vec![2])
            .unwrap();
        assert_eq!(session.slot_state(1), Some(SlotState::Validating));
        assert_eq!(session.slot_state(2), Some(SlotState::Rejected));

        session
            .apply_validation(1, d1.version, "too dark", None, vec![1])
            .unwrap();
        assert_eq!(session.slot_state(1), Some(SlotState::Rejected));
        assert_eq!(session.slot_warning(1), Some("too dark"));
        assert_eq!(session.slot_warning(2), Some("no vehicle detected"));
    }

    #[test]
    fn test_empty_warning_without_bbox_is_rejection() {
        let mut session = ready_session(1);
        let d = session.begin_upload(0, vec![1]).unwrap();
        let outcome = session
            .apply_validation(0, d.version, "", None, vec![1])
            .unwrap();
        assert!(matches!(outcome, ValidationOutcome::Rejected { .. }));
        assert_eq!(session.slot_state(0), Some(SlotState::Rejected));
    }

    #[test]
    fn test_crop_failure_is_visible_retry_state() {
        let mut session = ready_session(1);
        let d = session.begin_upload(0, vec![1]).unwrap();
        let crop = expect_crop(
            session
                .apply_validation(
                    0,
                    d.version,
                    "",
                    Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)),
                    vec![1],
                )
                .unwrap(),
        );
        session.apply_crop_failure(0, crop.version).unwrap();

        assert_eq!(session.slot_state(0), Some(SlotState::ProcessingFailed));
        assert!(!session.slot_warning(0).unwrap().is_empty());
        assert!(!session.can_advance());

        // Distinct from a validation rejection, but re-upload still recovers
        accept_step(&mut session, 0);
        assert_eq!(session.slot_state(0), Some(SlotState::Complete));
    }

    #[test]
    fn test_retry_redispatches_last_upload() {
        let mut session = ready_session(1);
        let d = session.begin_upload(0, vec![7, 7, 7]).unwrap();
        let crop = expect_crop(
            session
                .apply_validation(
                    0,
                    d.version,
                    "",
                    Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)),
                    d.bytes,
                )
                .unwrap(),
        );
        session.apply_crop_failure(0, crop.version).unwrap();

        // The original file is retained; no fresh upload is required
        let retry = session.retry_upload(0).unwrap();
        assert_eq!(retry.bytes, vec![7, 7, 7]);
        assert!(retry.version > d.version);
        assert_eq!(session.slot_state(0), Some(SlotState::Validating));
    }

    #[test]
    fn test_retry_without_upload_is_an_error() {
        let mut session = ready_session(2);
        assert_eq!(
            session.retry_upload(0).unwrap_err(),
            SessionError::NothingToRetry(0)
        );
    }

    #[test]
    fn test_next_gated_on_complete_for_every_step() {
        let mut session = ready_session(4);
        for i in 0..4 {
            assert!(!session.can_advance(), "step {} should gate before upload", i);
            accept_step(&mut session, i);
            assert!(session.can_advance(), "step {} should enable next", i);
            let phase = session.advance().unwrap();
            if i < 3 {
                assert_eq!(phase, SessionPhase::InProgress);
                assert_eq!(session.current_step(), i + 1);
            } else {
                assert_eq!(phase, SessionPhase::Summary);
            }
        }
    }

    #[test]
    fn test_viewer_skips_pending_slots() {
        let mut session = ready_session(3);
        accept_step(&mut session, 0);
        session.advance().unwrap();
        accept_step(&mut session, 1);
        session.advance().unwrap();
        accept_step(&mut session, 2);
        session.advance().unwrap();
        assert_eq!(session.phase(), SessionPhase::Summary);

        let frames = session.open_viewer().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(session.phase(), SessionPhase::Viewing);
    }

    #[test]
    fn test_open_viewer_requires_summary() {
        let mut session = ready_session(2);
        assert_eq!(
            session.open_viewer().unwrap_err(),
            SessionError::NotInSummary
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = ready_session(2);
        accept_step(&mut session, 0);
        session.reset();
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.current_step(), 0);
        assert_eq!(session.slot_state(0), Some(SlotState::Empty));
        assert!(session.frames().is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut session = ready_session(2);
        accept_step(&mut session, 0);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.slots.len(), 2);
        assert!(snapshot.slots[0].has_frame);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("Complete"));
    }

    #[test]
    fn test_out_of_range_index() {
        let mut session = ready_session(2);
        assert!(matches!(
            session.begin_upload(5, vec![1]),
            Err(SessionError::StepOutOfRange { index: 5, count: 2 })
        ));
    }
}
