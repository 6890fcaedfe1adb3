#![forbid(unsafe_code)]

use accord_engines::consent_state::{ConsentStateMachine, TransitionError};
use accord_engines::mismatch::{MismatchConfig, MismatchRuntime};
use accord_kernel_contracts::consent::{
    ButtonChoice, ConsentStatus, SessionId, VerificationStatus, VerificationWrite,
};
use accord_kernel_contracts::media::VideoAssetId;
use accord_kernel_contracts::UnixTimeMs;
use accord_storage::repo::{ConsentSessionRepo, VideoAssetRepo};
use accord_storage::StorageError;

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// The pipeline has not stored a decision yet; the client should retry
    /// after it completes.
    AnalysisNotReady,
    Transition(TransitionError),
    Storage(StorageError),
}

impl From<TransitionError> for VerifyError {
    fn from(e: TransitionError) -> Self {
        VerifyError::Transition(e)
    }
}

impl From<StorageError> for VerifyError {
    fn from(e: StorageError) -> Self {
        VerifyError::Storage(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub verification_status: VerificationStatus,
    pub has_audio_mismatch: bool,
    pub consent_status: ConsentStatus,
}

#[derive(Debug, Clone)]
pub struct VerifyWiring {
    mismatch: MismatchRuntime,
    state_machine: ConsentStateMachine,
}

impl VerifyWiring {
    pub fn new(config: MismatchConfig) -> Self {
        Self {
            mismatch: MismatchRuntime::new(config),
            state_machine: ConsentStateMachine::new(),
        }
    }

    /// Reconcile the recipient's explicit button choice with the stored AI
    /// decision.
    ///
    /// A detected mismatch is recorded as audit metadata only; the status
    /// transition follows the human's choice unconditionally. The AI is
    /// advisory, the button is authoritative.
    pub fn verify<R>(
        &self,
        repo: &mut R,
        session_id: &SessionId,
        button_choice: ButtonChoice,
        video_asset_id: Option<VideoAssetId>,
        now: UnixTimeMs,
    ) -> Result<VerifyOutcome, VerifyError>
    where
        R: ConsentSessionRepo + VideoAssetRepo,
    {
        let session = repo.get_session_row(session_id)?.clone();
        let decision = session
            .ai_analysis_result
            .ok_or(VerifyError::AnalysisNotReady)?;

        let effective_video = video_asset_id.or_else(|| session.video_asset_id.clone());
        let transcription_confidence_pct = effective_video
            .as_ref()
            .and_then(|id| repo.get_video_row(id).ok())
            .and_then(|video| video.transcript.as_ref())
            .map(|t| t.confidence_pct)
            .unwrap_or(0);

        let has_audio_mismatch =
            self.mismatch
                .determine_mismatch(decision, button_choice, transcription_confidence_pct);

        // Compute the status write first so a refused transition leaves the
        // verification fields untouched too.
        let status_write = self.state_machine.transition(
            &session,
            button_choice.as_consent_status(),
            effective_video,
            now,
        )?;

        let verification_write = VerificationWrite::v1(button_choice, has_audio_mismatch, now);
        let verification_status = verification_write.verification_status;
        repo.set_verification(session_id, verification_write)?;
        repo.set_session_status(session_id, status_write)?;

        Ok(VerifyOutcome {
            verification_status,
            has_audio_mismatch,
            consent_status: button_choice.as_consent_status(),
        })
    }
}
